//! Database access layer abstraction.
//!
//! This module provides a single polymorphic contract over two backends:
//!
//! - **Embedded**: a file-backed `SQLite` / GeoPackage database, optionally
//!   with the SpatiaLite extension ([`SqliteDb`])
//! - **Networked**: a pooled PostgreSQL database, optionally with PostGIS
//!   ([`PostgresDb`])
//!
//! Backend selection happens exactly once, in [`connect`]. Everything after
//! construction goes through the [`Database`] trait; no caller branches on
//! backend kind again, and no caller reaches the underlying handle directly.

pub mod postgres;
pub mod sqlite;

pub use postgres::PostgresDb;
pub use sqlite::SqliteDb;

use crate::config::DbSettings;
use crate::{Error, Result};
use bytes::BytesMut;
use std::fmt;
use std::str::FromStr;
use tokio_postgres::types::{IsNull, Type, to_sql_checked};

/// The shared access contract implemented by both backend adapters.
///
/// All operations may block on I/O for the duration of the call. Adapters
/// are safe to share across threads; the embedded adapter serialises access
/// to its single handle while the networked adapter delegates concurrency to
/// its pool.
///
/// After [`close`](Database::close), every query operation returns
/// [`Error::Closed`] and the capability probes return `false`.
pub trait Database: Send + Sync {
    /// Runs a mutating statement and returns the number of affected rows.
    fn exec_action_query(&self, sql: &str, params: &[SqlValue]) -> Result<u64>;

    /// Runs a statement expected to return exactly one row with one integer
    /// column.
    ///
    /// Returns [`Error::NoRow`] if the backend yields no row or a SQL `NULL`.
    fn get_query_int(&self, sql: &str, params: &[SqlValue]) -> Result<i64>;

    /// Runs a statement expected to return exactly one row with one boolean
    /// column.
    ///
    /// Returns [`Error::NoRow`] if the backend yields no row or a SQL `NULL`.
    fn get_query_bool(&self, sql: &str, params: &[SqlValue]) -> Result<bool>;

    /// Runs a statement expected to return exactly one row with one text
    /// column.
    ///
    /// Returns [`Error::NoRow`] if the backend yields no row or a SQL `NULL`,
    /// never an empty string: "no data" stays distinguishable from "empty
    /// data".
    fn get_query_string(&self, sql: &str, params: &[SqlValue]) -> Result<String>;

    /// Runs a statement returning zero or more single-column text rows.
    ///
    /// Zero matching rows yield an empty `Vec`, not an error.
    fn get_query_string_arr(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<String>>;

    /// Returns the backend engine's version string.
    fn get_version(&self) -> Result<String>;

    /// Returns the spatial extension's version string.
    ///
    /// Propagates probe failure: on a backend without the spatial extension
    /// this is an [`Error::QueryExecution`].
    fn get_spatial_version(&self) -> Result<String>;

    /// Probes whether the spatial extension is active.
    ///
    /// Never propagates an error: a probe failure and "capability absent"
    /// are the same actionable outcome for callers, which branch on the
    /// result rather than diagnose connectivity. Re-evaluated on every call
    /// so it reflects current backend state.
    fn is_spatial(&self) -> bool;

    /// Probes whether a table exists.
    ///
    /// The embedded backend has no schemas and ignores `schema`. Probe
    /// failures collapse to `false`, like [`is_spatial`](Database::is_spatial).
    fn table_exists(&self, schema: &str, table: &str) -> bool;

    /// Releases the backend handle.
    ///
    /// Best-effort: a close failure is logged, not propagated. Safe to call
    /// more than once; subsequent query operations return [`Error::Closed`].
    fn close(&self);
}

/// Recognised backend kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Local file-backed `SQLite` / GeoPackage database.
    EmbeddedFile,
    /// Networked PostgreSQL database behind a connection pool.
    NetworkedPool,
}

impl BackendKind {
    /// Tag selecting the embedded adapter.
    pub const EMBEDDED_FILE: &'static str = "embedded-file";
    /// Tag selecting the networked adapter.
    pub const NETWORKED_POOL: &'static str = "networked-pool";

    /// Returns the canonical tag for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EmbeddedFile => Self::EMBEDDED_FILE,
            Self::NetworkedPool => Self::NETWORKED_POOL,
        }
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(tag: &str) -> Result<Self> {
        match tag {
            Self::EMBEDDED_FILE => Ok(Self::EmbeddedFile),
            Self::NETWORKED_POOL => Ok(Self::NetworkedPool),
            other => Err(Error::UnsupportedBackend(other.to_string())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A positional SQL parameter accepted by both backends.
///
/// Statements carry an ordered sequence of these; each adapter binds them
/// through its own driver's parameter machinery.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL `NULL`.
    Null,
    /// 64-bit integer.
    Int(i64),
    /// Double-precision float.
    Real(f64),
    /// Text.
    Text(String),
    /// Boolean (stored as an integer by the embedded backend).
    Bool(bool),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl rusqlite::ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        use rusqlite::types::{ToSqlOutput, Value, ValueRef};
        Ok(match self {
            Self::Null => ToSqlOutput::Owned(Value::Null),
            Self::Int(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            Self::Real(v) => ToSqlOutput::Owned(Value::Real(*v)),
            Self::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            Self::Bool(v) => ToSqlOutput::Owned(Value::Integer(i64::from(*v))),
        })
    }
}

impl tokio_postgres::types::ToSql for SqlValue {
    // Integer and float parameters are narrowed to the column's wire type.
    // Narrowing is checked: a value that does not fit the column fails the
    // bind instead of wrapping.
    #[allow(clippy::cast_possible_truncation)]
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            Self::Null => Ok(IsNull::Yes),
            Self::Int(v) => {
                if *ty == Type::INT2 {
                    i16::try_from(*v)
                        .map_err(|_| format!("integer {v} out of range for int2"))?
                        .to_sql(ty, out)
                } else if *ty == Type::INT4 {
                    i32::try_from(*v)
                        .map_err(|_| format!("integer {v} out of range for int4"))?
                        .to_sql(ty, out)
                } else {
                    v.to_sql(ty, out)
                }
            },
            Self::Real(v) => {
                if *ty == Type::FLOAT4 {
                    let narrowed = *v as f32;
                    if v.is_finite() && narrowed.is_infinite() {
                        return Err(format!("value {v} out of range for float4").into());
                    }
                    narrowed.to_sql(ty, out)
                } else {
                    v.to_sql(ty, out)
                }
            },
            Self::Text(v) => v.to_sql(ty, out),
            Self::Bool(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // Per-variant dispatch happens in to_sql; the driver surfaces a type
        // mismatch as a query error rather than a panic.
        true
    }

    to_sql_checked!();
}

/// Maps a driver error to [`Error::QueryExecution`], keeping the statement
/// for diagnostics.
pub(crate) fn query_error(sql: &str, e: impl fmt::Display) -> Error {
    Error::QueryExecution {
        statement: sql.to_string(),
        cause: e.to_string(),
    }
}

/// Constructs and validates the adapter selected by `settings`.
///
/// This is the only place backend selection logic lives. The returned
/// adapter has already answered its engine-version liveness probe; no
/// partially constructed adapter is ever returned.
///
/// # Errors
///
/// - [`Error::UnsupportedBackend`] for an unrecognised backend tag
/// - [`Error::InvalidInput`] for invalid settings (e.g. a zero pool size)
/// - [`Error::Connection`] when the selected backend cannot be opened or
///   fails its initial probe
pub fn connect(settings: &DbSettings) -> Result<Box<dyn Database>> {
    settings.validate()?;
    let kind: BackendKind = settings.backend.parse()?;

    let db: Box<dyn Database> = match kind {
        BackendKind::EmbeddedFile => Box::new(SqliteDb::open(
            &settings.url,
            settings.spatialite_extension.as_deref(),
        )?),
        BackendKind::NetworkedPool => {
            Box::new(PostgresDb::connect(&settings.url, settings.pool_size)?)
        },
    };

    tracing::info!(backend = kind.as_str(), "database backend ready");
    Ok(db)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_tags_round_trip() {
        assert_eq!(
            "embedded-file".parse::<BackendKind>().ok(),
            Some(BackendKind::EmbeddedFile)
        );
        assert_eq!(
            "networked-pool".parse::<BackendKind>().ok(),
            Some(BackendKind::NetworkedPool)
        );
        assert_eq!(BackendKind::EmbeddedFile.to_string(), "embedded-file");
        assert_eq!(BackendKind::NetworkedPool.to_string(), "networked-pool");
    }

    #[test]
    fn test_unknown_backend_tag_is_rejected() {
        let err = "unknown".parse::<BackendKind>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedBackend(ref tag) if tag == "unknown"));
    }

    #[test]
    fn test_factory_rejects_unknown_tag() {
        let settings = DbSettings {
            backend: "unknown".to_string(),
            url: "whatever".to_string(),
            pool_size: 4,
            spatialite_extension: None,
        };
        let result = connect(&settings);
        assert!(matches!(result, Err(Error::UnsupportedBackend(_))));
    }

    #[test]
    fn test_factory_rejects_zero_pool_size() {
        let settings = DbSettings {
            backend: BackendKind::NETWORKED_POOL.to_string(),
            url: "postgresql://localhost/geoquery".to_string(),
            pool_size: 0,
            spatialite_extension: None,
        };
        let result = connect(&settings);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_factory_propagates_embedded_connection_failure() {
        let settings = DbSettings::embedded("/nonexistent/path/to/data.gpkg");
        let result = connect(&settings);
        assert!(
            matches!(result, Err(Error::Connection { backend, .. }) if backend == "embedded-file")
        );
    }

    #[test]
    fn test_sql_value_conversions() {
        assert_eq!(SqlValue::from(7_i64), SqlValue::Int(7));
        assert_eq!(SqlValue::from(7_i32), SqlValue::Int(7));
        assert_eq!(SqlValue::from(0.5), SqlValue::Real(0.5));
        assert_eq!(SqlValue::from(true), SqlValue::Bool(true));
        assert_eq!(SqlValue::from("lakes"), SqlValue::Text("lakes".to_string()));
        assert_eq!(SqlValue::from(None::<String>), SqlValue::Null);
        assert_eq!(
            SqlValue::from(Some("lakes".to_string())),
            SqlValue::Text("lakes".to_string())
        );
    }

    #[test]
    fn test_sql_value_int_narrowing_is_checked() {
        use tokio_postgres::types::ToSql;

        let mut out = BytesMut::new();

        // Fits: narrows cleanly to the column's wire type.
        assert!(SqlValue::Int(1_234).to_sql(&Type::INT2, &mut out).is_ok());
        assert!(SqlValue::Int(1_234).to_sql(&Type::INT4, &mut out).is_ok());

        // Does not fit: the bind must fail rather than wrap the value.
        assert!(SqlValue::Int(70_000).to_sql(&Type::INT2, &mut out).is_err());
        assert!(
            SqlValue::Int(i64::from(i32::MAX) + 1)
                .to_sql(&Type::INT4, &mut out)
                .is_err()
        );
        assert!(SqlValue::Int(70_000).to_sql(&Type::INT8, &mut out).is_ok());

        // Finite doubles beyond float4 range are rejected, not sent as inf.
        assert!(SqlValue::Real(1e300).to_sql(&Type::FLOAT4, &mut out).is_err());
        assert!(SqlValue::Real(0.5).to_sql(&Type::FLOAT4, &mut out).is_ok());
    }

    #[test]
    fn test_sql_value_binds_through_rusqlite() {
        use rusqlite::ToSql;
        let value = SqlValue::Bool(true);
        let out = value.to_sql().unwrap();
        assert_eq!(
            out,
            rusqlite::types::ToSqlOutput::Owned(rusqlite::types::Value::Integer(1))
        );
    }
}
