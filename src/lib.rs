//! # geoquery
//!
//! Backend-agnostic access layer for geospatial databases.
//!
//! Geoquery lets an application issue the same scalar and row queries against
//! either a local embedded file-backed database (`SQLite` / GeoPackage,
//! optionally with the SpatiaLite extension) or a networked PostgreSQL
//! database (optionally with PostGIS), and discover at runtime whether the
//! spatial extension is active.
//!
//! ## Architecture
//!
//! - [`db::Database`]: the shared access contract (scalar helpers, row-set
//!   helper, action helper, capability probes, lifecycle close)
//! - [`db::SqliteDb`]: embedded adapter, one connection behind a lock
//! - [`db::PostgresDb`]: networked adapter, a deadpool connection pool
//! - [`db::connect`]: the factory selecting and validating an adapter
//!
//! ## Example
//!
//! ```rust,ignore
//! use geoquery::config::DbSettings;
//!
//! let settings = DbSettings::embedded("geodata/boundaries.gpkg");
//! let db = geoquery::db::connect(&settings)?;
//! let version = db.get_version()?;
//! if db.is_spatial() {
//!     println!("spatial extension: {}", db.get_spatial_version()?);
//! }
//! db.close();
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod db;
pub mod observability;

// Re-exports for convenience
pub use config::DbSettings;
pub use db::{BackendKind, Database, SqlValue, connect};

/// Error type for geoquery operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `Connection` | Backend cannot be opened/reached, or the initial liveness probe fails |
/// | `QueryExecution` | A statement fails at execution time |
/// | `NoRow` | A scalar query returns no row, or a SQL `NULL` |
/// | `UnsupportedBackend` | The factory is given an unknown backend tag |
/// | `Closed` | A query is attempted after `close()` |
/// | `InvalidInput` | Malformed settings (e.g. a zero pool size) |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The backend could not be opened or did not answer the initial probe.
    ///
    /// Fatal to adapter construction: no partially constructed adapter is
    /// ever returned. The surrounding application is expected to treat this
    /// as fatal at startup.
    #[error("cannot connect to {backend} backend: {cause}")]
    Connection {
        /// Backend kind tag the connection was attempted against.
        backend: &'static str,
        /// The underlying driver error.
        cause: String,
    },

    /// A statement failed at execution time.
    ///
    /// Carries the offending statement so callers can log actionable
    /// diagnostics without re-deriving context.
    #[error("query '{statement}' failed: {cause}")]
    QueryExecution {
        /// The SQL text that failed.
        statement: String,
        /// The underlying driver error.
        cause: String,
    },

    /// A scalar query returned no row, or the single value was SQL `NULL`.
    ///
    /// A distinguished, expected outcome: "no data" is kept apart from
    /// "empty data" (empty string, zero).
    #[error("query returned no row")]
    NoRow,

    /// The factory was given an unrecognised backend kind tag.
    #[error("unsupported database backend: {0:?}")]
    UnsupportedBackend(String),

    /// A query was attempted after the adapter was closed.
    #[error("database is closed")]
    Closed,

    /// Invalid settings were provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for geoquery operations.
pub type Result<T> = std::result::Result<T, Error>;
