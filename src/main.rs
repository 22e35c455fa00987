//! cors-relay binary.

use clap::Parser;
use std::path::PathBuf;

use cors_relay::config::load_or_default;
use cors_relay::lifecycle;
use cors_relay::observability::init_logging;

#[derive(Parser)]
#[command(name = "cors-relay", version)]
#[command(about = "Forward HTTP requests to a fixed upstream and add permissive CORS headers", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_or_default(cli.config.as_deref())?;

    init_logging(&config.observability);

    tracing::info!("cors-relay v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    lifecycle::start(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
