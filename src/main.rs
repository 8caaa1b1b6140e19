use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match taskdriver::cli::run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
