#![forbid(unsafe_code)]

//! Subscriber installation for binaries and test rigs.

use tracing_subscriber::EnvFilter;

use crate::error::{CoreError, Result};

/// Environment variable holding the filter directives.
pub const LOG_ENV: &str = "FVUE_LOG";

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install a human-readable fmt subscriber filtered by `FVUE_LOG`.
pub fn init_from_env() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .try_init()
        .map_err(|e| CoreError::Subscriber {
            message: e.to_string(),
        })
}

/// Install a JSON subscriber filtered by `FVUE_LOG`.
pub fn init_json_from_env() -> Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter())
        .try_init()
        .map_err(|e| CoreError::Subscriber {
            message: e.to_string(),
        })
}
