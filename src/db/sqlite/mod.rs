//! Embedded file-backed adapter (`SQLite` / GeoPackage, optional SpatiaLite).
//!
//! Holds exactly one connection for its lifetime. All statements execute
//! under a scoped lock acquisition; `SQLite`'s WAL mode provides the
//! engine-level single-writer/overlapping-reader semantics, while the lock
//! provides statement-level exclusivity on the shared handle (a `rusqlite`
//! connection cannot be borrowed by two threads at once).

mod connection;

use crate::db::{Database, SqlValue, query_error};
use crate::{Error, Result};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params_from_iter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const GET_SQLITE_VERSION: &str = "SELECT sqlite_version()";
const GET_SPATIALITE_VERSION: &str = "SELECT spatialite_version()";
const COUNT_GEOMETRY_COLUMNS_TABLE: &str =
    "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'gpkg_geometry_columns'";
const COUNT_TABLE_BY_NAME: &str =
    "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1";

/// Embedded adapter over a file-backed `SQLite` database.
///
/// The connection slot becomes `None` on [`close`](Database::close); every
/// later query observes the empty slot and returns [`Error::Closed`].
pub struct SqliteDb {
    conn: Mutex<Option<Connection>>,
    path: PathBuf,
}

impl SqliteDb {
    /// Opens the database file at `path` and validates the connection.
    ///
    /// The file must already exist: a GeoPackage is data, not something to
    /// create as an empty side effect of a typo in the path. When
    /// `spatial_extension` is given, the SpatiaLite module at that path is
    /// loaded into this connection only; a load failure is logged and
    /// downgraded, since spatial capability is optional and probed at
    /// runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the file is missing or unreadable,
    /// or if the engine does not answer the version probe.
    pub fn open(path: impl Into<PathBuf>, spatial_extension: Option<&Path>) -> Result<Self> {
        let path = path.into();
        let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_WRITE).map_err(
            |e| Error::Connection {
                backend: "embedded-file",
                cause: format!("opening {}: {e}", path.display()),
            },
        )?;

        connection::configure_connection(&conn);

        if let Some(extension) = spatial_extension {
            match connection::load_spatial_extension(&conn, extension) {
                Ok(()) => {
                    tracing::info!(extension = %extension.display(), "spatial extension loaded");
                },
                Err(e) => {
                    tracing::warn!(error = %e, "spatial extension unavailable, continuing without");
                },
            }
        }

        // Liveness probe: a file that opens but cannot answer a trivial
        // query (e.g. not a database at all) must fail construction.
        let version: String = conn
            .query_row(GET_SQLITE_VERSION, [], |row| row.get(0))
            .map_err(|e| Error::Connection {
                backend: "embedded-file",
                cause: format!("version probe failed: {e}"),
            })?;
        tracing::info!(path = %path.display(), version, "connected to sqlite database");

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            path,
        })
    }

    /// Path of the underlying database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs `f` against the live connection under a scoped lock acquisition.
    ///
    /// The guard is released on every exit path, including panics inside
    /// `f` (the next caller recovers the poisoned lock).
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = connection::acquire_lock(&self.conn);
        let conn = guard.as_ref().ok_or(Error::Closed)?;
        f(conn)
    }

    /// One row, one column, with SQL `NULL` and the zero-row case both
    /// mapped to [`Error::NoRow`].
    fn scalar<T: rusqlite::types::FromSql>(&self, sql: &str, params: &[SqlValue]) -> Result<T> {
        self.with_conn(|conn| {
            let value: Option<Option<T>> = conn
                .query_row(sql, params_from_iter(params), |row| row.get(0))
                .optional()
                .map_err(|e| query_error(sql, e))?;
            value.flatten().ok_or(Error::NoRow)
        })
    }
}

impl Database for SqliteDb {
    fn exec_action_query(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        self.with_conn(|conn| {
            let affected = conn
                .execute(sql, params_from_iter(params))
                .map_err(|e| query_error(sql, e))?;
            Ok(affected as u64)
        })
    }

    fn get_query_int(&self, sql: &str, params: &[SqlValue]) -> Result<i64> {
        self.scalar(sql, params)
    }

    fn get_query_bool(&self, sql: &str, params: &[SqlValue]) -> Result<bool> {
        self.scalar(sql, params)
    }

    fn get_query_string(&self, sql: &str, params: &[SqlValue]) -> Result<String> {
        self.scalar(sql, params)
    }

    fn get_query_string_arr(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql).map_err(|e| query_error(sql, e))?;
            let rows = stmt
                .query_map(params_from_iter(params), |row| row.get::<_, String>(0))
                .map_err(|e| query_error(sql, e))?;

            let mut result = Vec::new();
            for row in rows {
                result.push(row.map_err(|e| query_error(sql, e))?);
            }
            Ok(result)
        })
    }

    fn get_version(&self) -> Result<String> {
        self.get_query_string(GET_SQLITE_VERSION, &[])
    }

    fn get_spatial_version(&self) -> Result<String> {
        self.get_query_string(GET_SPATIALITE_VERSION, &[])
    }

    fn is_spatial(&self) -> bool {
        // A GeoPackage advertises geometry support through its metadata
        // table; re-checked on every call so runtime extension loading is
        // picked up.
        match self.get_query_int(COUNT_GEOMETRY_COLUMNS_TABLE, &[]) {
            Ok(count) => count > 0,
            Err(e) => {
                tracing::warn!(error = %e, "spatial capability probe failed");
                false
            },
        }
    }

    fn table_exists(&self, _schema: &str, table: &str) -> bool {
        match self.get_query_int(COUNT_TABLE_BY_NAME, &[SqlValue::from(table)]) {
            Ok(count) => count > 0,
            Err(e) => {
                tracing::warn!(table, error = %e, "table existence probe failed");
                false
            },
        }
    }

    fn close(&self) {
        let mut guard = connection::acquire_lock(&self.conn);
        if let Some(conn) = guard.take() {
            if let Err((_conn, e)) = conn.close() {
                tracing::error!(path = %self.path.display(), error = %e, "closing sqlite connection failed");
            } else {
                tracing::debug!(path = %self.path.display(), "sqlite connection closed");
            }
        }
    }
}
