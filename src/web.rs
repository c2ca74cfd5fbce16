use datalens::app;

/// Entry point for the web application.
///
/// Binds the analysis server on the address given by the `DATALENS_ADDR`
/// environment variable, defaulting to `127.0.0.1:3000`.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let addr = std::env::var("DATALENS_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
    app::run(&addr).await
}
