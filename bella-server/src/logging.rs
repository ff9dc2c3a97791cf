//! Tracing subscriber setup
//!
//! The subscriber is installed before configuration is read so config
//! loading itself is logged. The configured level is applied afterwards
//! unless `RUST_LOG` was set.

use bella_common::config::LoggingConfig;
use tracing_subscriber::{prelude::*, reload, EnvFilter, Registry};

/// Handle for applying the configured level once config is loaded
pub struct LogLevelHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    from_env: bool,
}

impl LogLevelHandle {
    /// Replace the startup filter with `config.level`; no-op when `RUST_LOG` is set
    ///
    /// Returns whether the filter was replaced.
    pub fn apply_config(&self, config: &LoggingConfig) -> Result<bool, reload::Error> {
        if self.from_env {
            return Ok(false);
        }
        self.handle.reload(EnvFilter::new(&config.level))?;
        Ok(true)
    }

    /// Current filter directives, lowercased
    pub fn current(&self) -> Option<String> {
        self.handle
            .with_current(|filter| filter.to_string().to_lowercase())
            .ok()
    }
}

/// Build a reloadable filter layer: `RUST_LOG` if set, otherwise INFO
fn reloadable_filter(
    env_filter: Option<EnvFilter>,
) -> (reload::Layer<EnvFilter, Registry>, LogLevelHandle) {
    let from_env = env_filter.is_some();
    let (layer, handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new("info")));
    (layer, LogLevelHandle { handle, from_env })
}

/// Install the global subscriber
pub fn init() -> LogLevelHandle {
    let (filter, handle) = reloadable_filter(EnvFilter::try_from_default_env().ok());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
    handle
}
