/// Tempo CLI
///
/// Parses, inspects, and interactively drives automation scripts without any
/// transport layer in front of the engine.
use tracing_subscriber::EnvFilter;

use tempo_core::cli;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli::run_cli().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
