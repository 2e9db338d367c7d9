pub mod config;
pub mod error;
pub mod location;
pub mod persist;

pub use config::{
    Config, HttpConfig, NwsConfig, OpenMeteoConfig, ProvidersConfig, Tolerances, ValidationResult,
};
pub use error::{
    ConfigError, PersistenceError, ProviderError, ReqwestErrorExt, ResolutionError,
    RusqliteErrorExt, TrackerError,
};
pub use location::Location;

/// Initialize tracing/logging.
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies. Logs go to
/// stderr so stdout stays free for reports.
pub fn init_logging(default_level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
