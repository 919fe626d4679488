//! This file defines the pastizales binary entry point.

use pastizales::app;
use pastizales::cli;
use pastizales::metrics;
use pastizales::server;
use pastizales::tracing;

use std::process::exit;

/// Application entry point
#[tokio::main]
async fn main() {
    let args = cli::parse();
    tracing::init_tracing(&args);
    metrics::register_metrics();
    let service = match app::service(&args) {
        Ok(service) => service,
        Err(error) => {
            ::tracing::error!("{}", error);
            tracing::shutdown_tracing();
            exit(1)
        }
    };
    server::serve(&args, service).await;
    tracing::shutdown_tracing();
}
