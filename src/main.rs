//! This file defines the timeseries-reducer binary entry point.

use timeseries_reducer::app;
use timeseries_reducer::app_state::AppState;
use timeseries_reducer::cli;
use timeseries_reducer::metrics;
use timeseries_reducer::server;
use timeseries_reducer::tracing;

use std::process::exit;
use std::sync::Arc;

/// Application entry point
#[tokio::main]
async fn main() {
    let args = cli::parse();
    tracing::init_tracing(&args);
    ::tracing::debug!("{:?}", args);
    metrics::register_metrics();
    let state = match AppState::new(&args) {
        Ok(state) => Arc::new(state),
        Err(err) => {
            ::tracing::error!("failed to open series store: {}", err);
            exit(1)
        }
    };
    let service = app::service(state);
    let result = server::serve(&args, service).await;
    tracing::shutdown_tracing();
    if let Err(err) = result {
        ::tracing::error!("{}", err);
        let mut current = std::error::Error::source(&err);
        while let Some(source) = current {
            ::tracing::error!("Caused by: {}", source);
            current = source.source();
        }
        exit(1)
    }
}
