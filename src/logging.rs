//! Tracing subscriber setup for the command-line driver.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Errors that may occur while initializing logging.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The default directive could not be parsed.
    #[error("Invalid log filter `{directive}`: {source}")]
    Filter {
        directive: String,
        source: tracing_subscriber::filter::ParseError,
    },
    /// Failed to set the global tracing subscriber.
    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(#[from] tracing_subscriber::util::TryInitError),
}

/// Installs a stderr fmt subscriber.
///
/// `RUST_LOG` takes precedence over `default_directive` when set.
pub fn init(default_directive: &str) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive).map_err(|source| LoggingError::Filter {
            directive: default_directive.to_string(),
            source,
        })?,
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init()?;
    Ok(())
}
