use clap::Subcommand;
use examlock_core::{ExamLockConfig, SettingsStore};

use super::{settings_file, CliResult};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g. "mode", "maxViolations")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
    /// Show all config values
    Show,
    /// Reset config to defaults
    Reset,
}

pub fn run(action: ConfigAction) -> CliResult {
    let settings = settings_file()?;
    match action {
        ConfigAction::Get { key } => {
            let config = settings.load_or_default();
            match config.get(&key) {
                Some(value) => println!("{value}"),
                None => {
                    eprintln!("unknown key: {key}");
                    std::process::exit(1);
                }
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = settings.load_or_default();
            config.set(&key, &value)?;
            settings.save(&config)?;
            println!("ok");
        }
        ConfigAction::Show => {
            let config = settings.load_or_default();
            let json = serde_json::to_string_pretty(&config)?;
            println!("{json}");
        }
        ConfigAction::Reset => {
            settings.save(&ExamLockConfig::default())?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}
