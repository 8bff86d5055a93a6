//! Configuration for the projector.
//!
//! Settings come from environment variables with sensible defaults:
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `FOLDSTORE_RETAIN_SNAPSHOTS` | `1` | snapshots kept per namespace when pruning |
//! | `FOLDSTORE_LOG` | `info` | `tracing` filter directive for binaries |
//!
//! # Example
//!
//! ```no_run
//! use foldstore_projections::config::ProjectorConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ProjectorConfig::from_env()?;
//! let policy = config.retention_policy()?;
//! assert!(policy.keep() >= 1);
//! # Ok(())
//! # }
//! ```

use crate::retention::RetentionPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable holding the number of snapshots to keep.
pub const RETAIN_SNAPSHOTS_VAR: &str = "FOLDSTORE_RETAIN_SNAPSHOTS";

/// Environment variable holding the log filter.
pub const LOG_FILTER_VAR: &str = "FOLDSTORE_LOG";

/// Configuration error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable was set but could not be parsed
    #[error("Failed to parse {var}: {reason}")]
    Parse {
        /// The offending variable
        var: String,
        /// The reason for failure
        reason: String,
    },

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

/// Projector configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectorConfig {
    /// Snapshots kept per namespace by the retention pruner (newest first)
    pub retain_snapshots: usize,
    /// Log filter directive (`tracing_subscriber::EnvFilter` syntax)
    pub log_filter: String,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            retain_snapshots: 1,
            log_filter: "info".to_string(),
        }
    }
}

impl ProjectorConfig {
    /// Load from process environment variables
    ///
    /// # Errors
    ///
    /// Returns error if a variable is malformed or the result fails validation
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load using an arbitrary variable lookup (unset variables keep their defaults)
    ///
    /// # Errors
    ///
    /// Returns error if a variable is malformed or the result fails validation
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(RETAIN_SNAPSHOTS_VAR) {
            config.retain_snapshots =
                raw.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::Parse {
                    var: RETAIN_SNAPSHOTS_VAR.to_string(),
                    reason: format!("'{raw}': {e}"),
                })?;
        }
        if let Some(filter) = lookup(LOG_FILTER_VAR) {
            config.log_filter = filter;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retain_snapshots == 0 {
            return Err(ConfigError::Validation(
                "retain_snapshots must be at least 1".to_string(),
            ));
        }
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::Validation(
                "log_filter cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Retention policy derived from this configuration
    ///
    /// # Errors
    ///
    /// Returns error if `retain_snapshots` is zero
    pub fn retention_policy(&self) -> Result<RetentionPolicy, ConfigError> {
        RetentionPolicy::keep_newest(self.retain_snapshots)
    }
}
