use std::process::ExitCode;

fn main() -> ExitCode {
    match chat_mcp::cli::main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("❌ {err}");
            ExitCode::FAILURE
        }
    }
}
