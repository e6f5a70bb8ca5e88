//! Binary entry point for geoquery.
//!
//! A thin CLI over the database access layer: construct the configured
//! adapter through the factory, run one operation, close the adapter.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// CLI output goes to stdout by design.
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

use clap::{Parser, Subcommand};
use geoquery::config::DbSettings;
use geoquery::db::{BackendKind, Database};
use geoquery::observability;
use serde::Serialize;
use std::process::ExitCode;

/// Geoquery - query geospatial databases through one backend-agnostic contract.
#[derive(Parser)]
#[command(name = "geoquery")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    db: DbSettings,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Report backend version and spatial capability as JSON.
    Status,

    /// Run a single-column SELECT and print one value per line.
    Query {
        /// The statement to run.
        sql: String,
    },

    /// Run a mutating statement and print the affected-row count.
    Exec {
        /// The statement to run.
        sql: String,
    },
}

/// JSON shape of the `status` command output.
#[derive(Serialize)]
struct StatusReport {
    backend: String,
    version: String,
    spatial: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    spatial_version: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    geometry_tables: Vec<String>,
}

/// Statement listing the tables carrying a geometry column, per backend
/// catalog.
const fn geometry_tables_sql(kind: BackendKind) -> &'static str {
    match kind {
        BackendKind::EmbeddedFile => "SELECT table_name FROM gpkg_geometry_columns",
        BackendKind::NetworkedPool => "SELECT DISTINCT f_table_name FROM geometry_columns",
    }
}

fn main() -> ExitCode {
    // .env is a convenience for local runs; absence is not an error.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    observability::init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("geoquery: {e}");
            ExitCode::FAILURE
        },
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let kind: BackendKind = cli.db.backend.parse()?;
    let db = geoquery::db::connect(&cli.db)?;

    let result = match &cli.command {
        Commands::Status => cmd_status(db.as_ref(), kind),
        Commands::Query { sql } => cmd_query(db.as_ref(), sql),
        Commands::Exec { sql } => cmd_exec(db.as_ref(), sql),
    };

    // Shutdown path: the handle is released here regardless of the
    // command's outcome.
    db.close();
    result
}

fn cmd_status(db: &dyn Database, kind: BackendKind) -> anyhow::Result<()> {
    let version = db.get_version()?;
    let spatial = db.is_spatial();
    let (spatial_version, geometry_tables) = if spatial {
        let spatial_version = match db.get_spatial_version() {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(error = %e, "spatial version probe failed");
                None
            },
        };
        let geometry_tables = db.get_query_string_arr(geometry_tables_sql(kind), &[])?;
        (spatial_version, geometry_tables)
    } else {
        (None, Vec::new())
    };

    let report = StatusReport {
        backend: kind.to_string(),
        version,
        spatial,
        spatial_version,
        geometry_tables,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_query(db: &dyn Database, sql: &str) -> anyhow::Result<()> {
    for value in db.get_query_string_arr(sql, &[])? {
        println!("{value}");
    }
    Ok(())
}

fn cmd_exec(db: &dyn Database, sql: &str) -> anyhow::Result<()> {
    let affected = db.exec_action_query(sql, &[])?;
    println!("{affected}");
    Ok(())
}
