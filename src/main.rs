use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match serverstarter_lib::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("ServerStarter failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
