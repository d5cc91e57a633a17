//! bearer-gate CLI binary entry point.

use bearer_gate::cli::{commands, Cli};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("BEARER_GATE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_args();
    if let Err(e) = commands::run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
