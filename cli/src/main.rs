use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use ilog_kernel::invariants::verify;
use ilog_kernel::replay::replay;
use ilog_kernel::{Index, IndexedLog, LogConfig};

/// Indexed log CLI
#[derive(Parser, Debug)]
#[command(name = "ilog")]
#[command(about = "Inspect and edit an indexed append-only log", long_about = None)]
struct Cli {
    /// Log directory (created if absent)
    #[arg(long)]
    path: PathBuf,

    /// Path to log config JSON
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Append each argument as one entry
    Append {
        #[arg(required = true)]
        records: Vec<String>,
    },
    /// Print the entry at an index
    Get {
        #[arg(allow_negative_numbers = true)]
        index: Index,
    },
    /// Remove entries from an index to the end
    Truncate {
        #[arg(allow_negative_numbers = true)]
        from: Index,
    },
    /// Print the tail index (-1 when empty)
    LastIndex,
    /// Print entries in order
    Dump {
        #[arg(long, default_value_t = 0)]
        from: Index,
    },
    /// Check stored entries against the last-index marker
    Verify,
}

#[derive(Debug, Serialize)]
struct Entry {
    index: Index,
    data: String,
}

impl Entry {
    fn new(index: Index, data: &[u8]) -> Self {
        Self {
            index,
            data: String::from_utf8_lossy(data).into_owned(),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = if let Some(path) = &cli.config {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        LogConfig::from_json(&data)?
    } else {
        LogConfig::default_config()
    };

    let log = IndexedLog::open_with_config(&cli.path, &config)
        .with_context(|| format!("opening log at {}", cli.path.display()))?;

    let output = match cli.command {
        Command::Append { records } => {
            let mut indices = Vec::with_capacity(records.len());
            for record in &records {
                indices.push(log.append(record.as_bytes())?);
            }
            serde_json::json!({ "appended": indices, "last_index": log.last_index() })
        }
        Command::Get { index } => serde_json::to_value(Entry::new(index, &log.get(index)?))?,
        Command::Truncate { from } => {
            log.truncate_to_end(from)?;
            serde_json::json!({ "last_index": log.last_index() })
        }
        Command::LastIndex => serde_json::json!({ "last_index": log.last_index() }),
        Command::Dump { from } => {
            let entries = replay(&log, from)
                .map(|entry| entry.map(|(index, data)| Entry::new(index, &data)))
                .collect::<Result<Vec<_>, _>>()?;
            serde_json::to_value(entries)?
        }
        Command::Verify => serde_json::to_value(verify(&log)?)?,
    };

    log.close();

    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
