//! Tracing initialisation.
//!
//! The core never writes to a console directly; everything goes through
//! `tracing` and whatever subscriber the host process installs. The binary
//! installs this one.

use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

static INIT: OnceLock<()> = OnceLock::new();

/// Installs a stderr fmt subscriber with an environment-driven filter.
///
/// `RUST_LOG` wins when set; otherwise `verbose` lowers the crate's default
/// level from `info` to `debug`. Safe to call more than once; later calls
/// are no-ops.
pub fn init_tracing(verbose: bool) {
    INIT.get_or_init(|| {
        let default_directives = if verbose {
            "geoquery=debug,info"
        } else {
            "geoquery=info,warn"
        };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directives));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    });
}
