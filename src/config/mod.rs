//! Runtime configuration.
//!
//! Settings arrive through CLI flags or environment variables (the binary
//! loads a `.env` file first, if present). The factory consumes a validated
//! [`DbSettings`] and nothing else; there is no other configuration surface.

use crate::db::BackendKind;
use crate::{Error, Result};
use clap::Args;
use std::path::PathBuf;

/// Database access settings.
#[derive(Args, Debug, Clone)]
pub struct DbSettings {
    /// Backend kind tag: `embedded-file` or `networked-pool`.
    #[arg(
        long = "db-backend",
        env = "GEOQUERY_DB_BACKEND",
        default_value = BackendKind::EMBEDDED_FILE
    )]
    pub backend: String,

    /// Connection descriptor: a file path for the embedded backend, a
    /// PostgreSQL URL for the networked backend.
    #[arg(long = "db-url", env = "GEOQUERY_DB_URL")]
    pub url: String,

    /// Maximum number of pooled connections (networked backend only).
    #[arg(
        long = "db-pool-size",
        env = "GEOQUERY_DB_POOL_SIZE",
        default_value_t = default_pool_size()
    )]
    pub pool_size: usize,

    /// Path to the SpatiaLite loadable module (embedded backend only).
    #[arg(long = "spatialite-extension", env = "GEOQUERY_SPATIALITE_EXTENSION")]
    pub spatialite_extension: Option<PathBuf>,
}

/// Sizes the pool to the host's parallelism when no hint is given.
fn default_pool_size() -> usize {
    std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
}

impl DbSettings {
    /// Settings for an embedded file-backed database without a spatial
    /// extension.
    #[must_use]
    pub fn embedded(path: impl Into<String>) -> Self {
        Self {
            backend: BackendKind::EMBEDDED_FILE.to_string(),
            url: path.into(),
            pool_size: default_pool_size(),
            spatialite_extension: None,
        }
    }

    /// Settings for a networked pooled database.
    #[must_use]
    pub fn networked(url: impl Into<String>, pool_size: usize) -> Self {
        Self {
            backend: BackendKind::NETWORKED_POOL.to_string(),
            url: url.into(),
            pool_size,
            spatialite_extension: None,
        }
    }

    /// Checks settings invariants that clap cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a zero pool size or an empty
    /// connection descriptor.
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(Error::InvalidInput(
                "connection descriptor must not be empty".to_string(),
            ));
        }
        if self.pool_size == 0 {
            return Err(Error::InvalidInput(
                "pool size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
