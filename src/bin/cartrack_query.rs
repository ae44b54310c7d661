//! Print tracking records stored by `cartrack`.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cartrack_rs::report::{format_records, format_tables};
use cartrack_rs::storage::DEFAULT_DATABASE;
use cartrack_rs::{SqliteStore, TrackingStore};

/// Query a tracking database
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long, default_value = DEFAULT_DATABASE)]
    database: PathBuf,

    /// Only show records of this object
    #[arg(long)]
    object_id: Option<u64>,

    /// List the tables in the database instead
    #[arg(long)]
    tables: bool,
}

fn run(args: Args) -> Result<()> {
    let store = SqliteStore::open_read_only(&args.database)
        .with_context(|| format!("failed to open {}", args.database.display()))?;

    let output = if args.tables {
        format_tables(&store.list_tables()?)
    } else {
        let records = match args.object_id {
            Some(id) => store.fetch_for_object(id)?,
            None => store.fetch_all()?,
        };
        format_records(&records)
    };
    print!("{output}");

    store.close()?;
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
