use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    divwatch_cli::run_app().await
}
