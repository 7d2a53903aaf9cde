pub mod clear;
pub mod config;
pub mod log;
pub mod simulate;
pub mod status;

use examlock_core::{FileSettings, MemoryStore, Persistence, SqliteStore};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Persistence over the on-disk durable tier. The session tier is empty:
/// outside `simulate` there is no page, so nothing lives there.
pub fn open_durable() -> examlock_core::error::Result<Persistence<MemoryStore, SqliteStore>> {
    let durable = SqliteStore::open_default()?;
    Ok(Persistence::new(MemoryStore::new(), durable))
}

/// The settings file under the data directory.
pub fn settings_file() -> examlock_core::error::Result<FileSettings> {
    Ok(FileSettings::default_location()?)
}
