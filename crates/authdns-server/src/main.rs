//! authdns
//!
//! Authoritative DNS server with JSON-backed zones, quorum-replicated
//! cluster propagation, and an HTTP management API.

use std::process;

use authdns_server::Config;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    info!("authdns starting");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("failed to load configuration: {err}");
            process::exit(1);
        }
    };

    if let Err(err) = authdns_server::run(config).await {
        error!("server error: {err}");
        process::exit(1);
    }
}
