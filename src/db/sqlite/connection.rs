//! Shared connection handling for the embedded backend.
//!
//! Provides scoped lock acquisition with poison recovery, pragma
//! configuration, and SpatiaLite extension loading.

use crate::{Error, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Acquires the connection lock, recovering from poison.
///
/// If the lock is poisoned (a panic in a previous critical section), we
/// recover the inner value and log a warning. The connection state is still
/// valid; failing every later query over a past panic would cascade one
/// failure into many.
pub(super) fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("sqlite connection lock was poisoned, recovering");
            metrics::counter!("geoquery_sqlite_lock_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Configures a `SQLite` connection for concurrent access.
///
/// - **WAL mode**: lets engine-level readers overlap a single writer
/// - **NORMAL synchronous**: balances durability with performance
/// - **`busy_timeout`**: waits up to 5 seconds on lock contention instead of
///   failing with `SQLITE_BUSY`
pub(super) fn configure_connection(conn: &Connection) {
    // A pragma that does not apply (e.g. WAL on an in-memory database)
    // degrades concurrency but not correctness, so failures are logged and
    // the connection is kept.
    for (pragma, value) in [
        ("journal_mode", "WAL"),
        ("synchronous", "NORMAL"),
        ("busy_timeout", "5000"),
    ] {
        if let Err(e) = conn.pragma_update(None, pragma, value) {
            tracing::warn!(pragma, value, error = %e, "pragma not applied");
        }
    }
}

/// Loads a SpatiaLite loadable module into the connection.
///
/// Extension loading is re-disabled when the guard drops, so a later
/// `load_extension()` SQL call from untrusted input stays rejected.
///
/// # Errors
///
/// Returns [`Error::Connection`] if the module at `path` cannot be loaded.
#[allow(unsafe_code)] // rusqlite marks extension loading unsafe: the module runs native code
pub(super) fn load_spatial_extension(conn: &Connection, path: &Path) -> Result<()> {
    let load = || -> rusqlite::Result<()> {
        unsafe {
            let _guard = rusqlite::LoadExtensionGuard::new(conn)?;
            conn.load_extension(path, None::<&str>)
        }
    };
    load().map_err(|e| Error::Connection {
        backend: "embedded-file",
        cause: format!("loading spatial extension {}: {e}", path.display()),
    })
}
