//! Web server

use crate::cli::CommandLineArgs;

use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use axum::ServiceExt;
use axum_server::{tls_rustls::RustlsConfig, Handle};
use expanduser::expanduser;
use thiserror::Error;
use tokio::signal;

/// Error starting or running the server
#[derive(Debug, Error)]
pub enum ServerError {
    /// Host and port do not form a socket address
    #[error("invalid listen address {0}")]
    ListenAddress(String, #[source] AddrParseError),

    /// TLS certificate or key file cannot be resolved
    #[error("TLS {kind} file {path} not found")]
    TlsFile {
        kind: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// TLS certificate or key cannot be loaded
    #[error("failed to load TLS certificate files")]
    TlsConfig(#[source] std::io::Error),

    /// Server stopped with an error
    #[error("server failed")]
    Serve(#[from] std::io::Error),
}

/// Returns the socket address to listen on.
fn listen_address(args: &CommandLineArgs) -> Result<SocketAddr, ServerError> {
    let addr = format!("{}:{}", args.host, args.port);
    addr.parse()
        .map_err(|source| ServerError::ListenAddress(addr, source))
}

/// Expand `~` in a TLS file path and return its absolute path.
fn tls_file(kind: &'static str, path: &str) -> Result<PathBuf, ServerError> {
    let tls_file_error = |source| ServerError::TlsFile {
        kind,
        path: path.to_string(),
        source,
    };
    expanduser(path)
        .map_err(tls_file_error)?
        .canonicalize()
        .map_err(tls_file_error)
}

/// Serve the time-series query service until a shutdown signal arrives
///
/// # Arguments
///
/// * `args`: Command line arguments
/// * `service`: The [crate::app::Service] to serve
pub async fn serve(args: &CommandLineArgs, service: crate::app::Service) -> Result<(), ServerError> {
    let addr = listen_address(args)?;

    // Catch ctrl+c and try to shutdown gracefully
    let handle = Handle::new();
    tokio::spawn(shutdown_signal(
        handle.clone(),
        args.graceful_shutdown_timeout,
    ));

    if args.https {
        let cert_file = tls_file("certificate", &args.cert_file)?;
        let key_file = tls_file("key", &args.key_file)?;
        let tls_config = RustlsConfig::from_pem_file(cert_file, key_file)
            .await
            .map_err(ServerError::TlsConfig)?;
        tracing::info!("listening on https://{}", addr);
        axum_server::bind_rustls(addr, tls_config)
            .handle(handle)
            .serve(service.into_make_service())
            .await?;
    } else {
        tracing::info!("listening on http://{}", addr);
        axum_server::bind(addr)
            .handle(handle)
            .serve(service.into_make_service())
            .await?;
    }
    Ok(())
}

/// Graceful shutdown handler
///
/// Installs signal handlers to catch Ctrl-C or SIGTERM and trigger a graceful shutdown. In-flight
/// queries get `timeout` seconds to complete.
async fn shutdown_signal(handle: Handle, timeout: u64) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("signal received, starting graceful shutdown");
    handle.graceful_shutdown(Some(Duration::from_secs(timeout)));
}
