//! Command Line Interface (CLI) arguments.

use clap::Parser;

/// Time-series reducer command line interface
#[derive(Clone, Debug, Parser)]
pub struct CommandLineArgs {
    /// The IP address on which the server should listen
    #[arg(long, default_value = "0.0.0.0", env = "TIMESERIES_REDUCER_HOST")]
    pub host: String,
    /// The port to which the server should bind
    #[arg(long, default_value_t = 8080, env = "TIMESERIES_REDUCER_PORT")]
    pub port: u16,
    /// Flag indicating whether HTTPS should be used
    #[arg(long, default_value_t = false, env = "TIMESERIES_REDUCER_HTTPS")]
    pub https: bool,
    /// Path to the certificate file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/timeseries-reducer/certs/cert.pem",
        env = "TIMESERIES_REDUCER_CERT_FILE"
    )]
    pub cert_file: String,
    /// Path to the key file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/timeseries-reducer/certs/key.pem",
        env = "TIMESERIES_REDUCER_KEY_FILE"
    )]
    pub key_file: String,
    /// Maximum time in seconds to wait for operations to complete upon receiving `ctrl+c` signal.
    #[arg(long, default_value_t = 60, env = "TIMESERIES_REDUCER_SHUTDOWN_TIMEOUT")]
    pub graceful_shutdown_timeout: u64,
    /// Whether to enable sending traces to Jaeger.
    #[arg(long, default_value_t = false, env = "TIMESERIES_REDUCER_ENABLE_JAEGER")]
    pub enable_jaeger: bool,
    /// Path to the series database. An empty in-memory store is served if not set.
    #[arg(long, env = "TIMESERIES_REDUCER_DB_PATH")]
    pub db_path: Option<String>,
    /// Maximum number of concurrent partition reads.
    #[arg(long, env = "TIMESERIES_REDUCER_STORAGE_CONNECTION_LIMIT")]
    pub storage_connection_limit: Option<usize>,
    /// Maximum number of concurrent downsampling tasks. Defaults to one less than the number of
    /// CPUs.
    #[arg(long, env = "TIMESERIES_REDUCER_THREAD_LIMIT")]
    pub thread_limit: Option<usize>,
    /// Deadline in milliseconds for each partition read attempt. 0 disables the deadline.
    #[arg(long, default_value_t = 5000, env = "TIMESERIES_REDUCER_READ_TIMEOUT_MS")]
    pub read_timeout_ms: u64,
    /// Number of retries of a partition read after a transient storage error.
    #[arg(long, default_value_t = 2, env = "TIMESERIES_REDUCER_READ_RETRIES")]
    pub read_retries: u32,
    /// Delay in milliseconds before the first retry. Doubled for each further retry.
    #[arg(long, default_value_t = 50, env = "TIMESERIES_REDUCER_RETRY_BACKOFF_MS")]
    pub retry_backoff_ms: u64,
}

/// Returns parsed command line arguments.
pub fn parse() -> CommandLineArgs {
    CommandLineArgs::parse()
}
