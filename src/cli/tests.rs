use super::*;
use clap::CommandFactory;
use std::fs;
use tempfile::TempDir;

#[test]
fn args_definition_is_consistent() {
    Args::command().debug_assert();
}

#[test]
fn flags_parse_into_args() {
    let args = Args::try_parse_from([
        "chat-mcp",
        "--config",
        "/tmp/config.toml",
        "--provider",
        "openrouter",
        "-m",
        "mistralai/devstral-2512:free",
        "-vv",
        "--log",
        "chat.log",
    ])
    .expect("parse args");

    assert_eq!(args.config, Some(PathBuf::from("/tmp/config.toml")));
    assert_eq!(args.provider.as_deref(), Some("openrouter"));
    assert_eq!(args.model.as_deref(), Some("mistralai/devstral-2512:free"));
    assert_eq!(args.verbose, 2);
    assert_eq!(args.log, Some(PathBuf::from("chat.log")));
    assert!(args.mcp_config.is_none());
}

#[test]
fn verbosity_maps_to_levels() {
    assert_eq!(verbosity_filter(0).to_string(), "warn");
    assert_eq!(verbosity_filter(1).to_string(), "info");
    assert_eq!(verbosity_filter(2).to_string(), "debug");
    assert_eq!(verbosity_filter(7).to_string(), "trace");
}

#[test]
fn command_line_overrides_configured_provider() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.toml");
    fs::write(
        &config_path,
        "[provider]\nid = \"openai\"\nmodel = \"gpt-4o\"\n",
    )
    .expect("write config");
    let mcp_json_path = temp_dir.path().join("mcp.json");
    fs::write(
        &mcp_json_path,
        r#"{"servers": {"fs": {"type": "stdio", "command": "fs-server"}}}"#,
    )
    .expect("write mcp.json");

    let args = Args::try_parse_from([
        "chat-mcp",
        "--config",
        config_path.to_str().expect("utf8 path"),
        "--mcp-config",
        mcp_json_path.to_str().expect("utf8 path"),
        "--model",
        "gpt-4.1",
    ])
    .expect("parse args");

    let config = load_config(&args).expect("load config");
    assert_eq!(config.provider.id.as_deref(), Some("openai"));
    assert_eq!(config.provider.model.as_deref(), Some("gpt-4.1"));
    assert_eq!(config.mcp_servers.len(), 1);
}
