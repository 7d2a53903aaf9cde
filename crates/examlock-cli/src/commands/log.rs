use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Subcommand;
use examlock_core::ViolationLogEntry;

use super::{open_durable, CliResult};

#[derive(Subcommand)]
pub enum LogAction {
    /// List recorded violations
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write the log to a JSON file
    Export {
        /// Destination file
        path: PathBuf,
    },
    /// Delete the log
    Clear,
}

pub fn run(action: LogAction) -> CliResult {
    let mut persistence = open_durable()?;
    match action {
        LogAction::Show { json } => {
            let entries = persistence.violation_log();
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("no violations recorded");
            } else {
                for entry in &entries {
                    println!("{}", format_entry(entry));
                }
            }
        }
        LogAction::Export { path } => {
            let count = persistence.export_violation_log(&path)?;
            println!("exported {count} entries to {}", path.display());
        }
        LogAction::Clear => {
            persistence.clear_violation_log()?;
            println!("violation log cleared");
        }
    }
    Ok(())
}

fn format_entry(entry: &ViolationLogEntry) -> String {
    let when = DateTime::<Utc>::from_timestamp_millis(entry.timestamp)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| entry.timestamp.to_string());
    format!(
        "{when}  #{:<3} session {}  +{}s  {}",
        entry.violation_count,
        entry.session_id,
        entry.session_duration_ms / 1000,
        entry.location
    )
}
