//! Two-tier persistence with reload reconciliation.
//!
//! The session tier alone would let a reload (or a closed and reopened tab)
//! wipe an active penalty. Whenever the page unloads while violated, the
//! session record is shadowed into the durable tier with `reloadAttempted`
//! set; the next load reconciles from that shadow before any signal is
//! handled.
//!
//! ## Reconciliation
//!
//! ```text
//! 1. durable reloadAttempted       -> copy count/timestamp, violated = true
//! 2. durable delay end in future   -> resume countdown at that end
//! 3. durable delay end elapsed     -> discard from both tiers
//! 4. remove reloadAttempted
//! ```

mod records;

pub use records::{
    keys, DurableRecord, Reconciliation, SessionRecord, ViolationLogEntry,
};

use records::{parse_bool, parse_i64, parse_timestamp, parse_u32};

use std::path::Path;

use crate::error::{Result as CoreResult, StorageError};
use crate::storage::KvStore;

/// Typed access to the session tier `S` and the durable tier `D`.
#[derive(Debug)]
pub struct Persistence<S, D> {
    session: S,
    durable: D,
}

impl<S: KvStore, D: KvStore> Persistence<S, D> {
    pub fn new(session: S, durable: D) -> Self {
        Self { session, durable }
    }

    pub fn session_tier(&self) -> &S {
        &self.session
    }

    pub fn durable_tier(&self) -> &D {
        &self.durable
    }

    /// Hand the tiers back, e.g. to rebuild a session after a reload.
    pub fn into_tiers(self) -> (S, D) {
        (self.session, self.durable)
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Read both records. Unreadable or malformed values read as absent.
    pub fn load(&self) -> (SessionRecord, DurableRecord) {
        (self.load_session(), self.load_durable())
    }

    fn load_session(&self) -> SessionRecord {
        let store = &self.session;
        SessionRecord {
            violated: parse_bool(read(store, keys::VIOLATED)).unwrap_or(false),
            violation_count: parse_u32(read(store, keys::VIOLATION_COUNT)).unwrap_or(0),
            last_violation_timestamp: parse_timestamp(read(store, keys::LAST_TIMESTAMP)),
            delay_penalty_end_epoch_ms: parse_i64(read(store, keys::DELAY_END_EPOCH_MS)),
        }
    }

    fn load_durable(&self) -> DurableRecord {
        let store = &self.durable;
        DurableRecord {
            violated: parse_bool(read(store, keys::VIOLATED)).unwrap_or(false),
            violation_count: parse_u32(read(store, keys::VIOLATION_COUNT)).unwrap_or(0),
            last_violation_timestamp: parse_timestamp(read(store, keys::LAST_TIMESTAMP)),
            delay_penalty_end_epoch_ms: parse_i64(read(store, keys::DELAY_END_EPOCH_MS)),
            reload_attempted: parse_bool(read(store, keys::RELOAD_ATTEMPTED)).unwrap_or(false),
        }
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Write the session record.
    ///
    /// Every key is attempted even if an earlier one fails; the first error
    /// is returned.
    ///
    /// # Errors
    /// Returns the first write failure.
    pub fn save_session(&mut self, record: &SessionRecord) -> Result<(), StorageError> {
        let store = &mut self.session;
        let results = [
            store.set(keys::VIOLATED, &record.violated.to_string()),
            store.set(keys::VIOLATION_COUNT, &record.violation_count.to_string()),
            write_opt(store, keys::LAST_TIMESTAMP, record.last_violation_timestamp.as_deref()),
            write_opt(
                store,
                keys::DELAY_END_EPOCH_MS,
                record.delay_penalty_end_epoch_ms.map(|ms| ms.to_string()).as_deref(),
            ),
        ];
        first_error(results)
    }

    /// Write the durable record.
    ///
    /// # Errors
    /// Returns the first write failure.
    pub fn save_durable(&mut self, record: &DurableRecord) -> Result<(), StorageError> {
        let store = &mut self.durable;
        let results = [
            store.set(keys::VIOLATED, &record.violated.to_string()),
            store.set(keys::VIOLATION_COUNT, &record.violation_count.to_string()),
            write_opt(store, keys::LAST_TIMESTAMP, record.last_violation_timestamp.as_deref()),
            write_opt(
                store,
                keys::DELAY_END_EPOCH_MS,
                record.delay_penalty_end_epoch_ms.map(|ms| ms.to_string()).as_deref(),
            ),
            write_opt(
                store,
                keys::RELOAD_ATTEMPTED,
                record.reload_attempted.then_some("true"),
            ),
        ];
        first_error(results)
    }

    /// Remove the delay end time from both tiers.
    ///
    /// # Errors
    /// Returns the first removal failure.
    pub fn clear_delay_end(&mut self) -> Result<(), StorageError> {
        first_error([
            self.session.remove(keys::DELAY_END_EPOCH_MS),
            self.durable.remove(keys::DELAY_END_EPOCH_MS),
        ])
    }

    /// Remove the durable record, keeping the violation log.
    ///
    /// # Errors
    /// Returns the first removal failure.
    pub fn clear_durable_record(&mut self) -> Result<(), StorageError> {
        first_error(keys::DURABLE_KEYS.map(|key| self.durable.remove(key)))
    }

    /// Wipe both tiers, violation log included.
    ///
    /// # Errors
    /// Returns the first removal failure.
    pub fn clear_all(&mut self) -> Result<(), StorageError> {
        let session = first_error(keys::SESSION_KEYS.map(|key| self.session.remove(key)));
        let durable = self.clear_durable_record();
        let log = self.clear_violation_log();
        first_error([session, durable, log])
    }

    /// Shadow the session into the durable tier before unload, only if
    /// violated. A clean session writes nothing.
    ///
    /// # Errors
    /// Returns the first write failure.
    pub fn snapshot_for_unload(&mut self, record: &SessionRecord) -> Result<bool, StorageError> {
        if !record.violated {
            return Ok(false);
        }
        self.save_durable(&DurableRecord::shadow_of(record, true))?;
        Ok(true)
    }

    // ── Reconciliation ───────────────────────────────────────────────

    /// Run the load-time reconciliation and write the result back to the
    /// session tier. Never fails: write errors are logged.
    pub fn reconcile(&mut self, now_ms: i64) -> Reconciliation {
        let (mut session, durable) = self.load();
        let mut outcome = Reconciliation::default();

        if durable.reload_attempted && durable.violation_count == 0 {
            tracing::debug!("reload shadow has no readable count, ignoring it");
        } else if durable.reload_attempted {
            outcome.bypass_detected = true;
            session.violation_count = session.violation_count.max(durable.violation_count);
            if durable.last_violation_timestamp.is_some() {
                session.last_violation_timestamp = durable.last_violation_timestamp.clone();
            }
            session.violated = true;
        }

        match durable.delay_penalty_end_epoch_ms {
            Some(end) if end > now_ms => {
                session.delay_penalty_end_epoch_ms = Some(end);
            }
            Some(_) => {
                outcome.discarded_expired_delay = true;
                session.delay_penalty_end_epoch_ms = None;
            }
            None => {}
        }

        // The session tier may itself have survived the reload.
        if matches!(session.delay_penalty_end_epoch_ms, Some(end) if end <= now_ms) {
            outcome.discarded_expired_delay = true;
            session.delay_penalty_end_epoch_ms = None;
        }

        // A penalty owed for zero violations can only come from unreadable
        // values.
        if session.violation_count == 0
            && (session.violated || session.delay_penalty_end_epoch_ms.is_some())
        {
            tracing::debug!("penalty state without a readable count, treating as clean");
            session = SessionRecord::default();
            outcome.discarded_expired_delay = false;
            let session_tier = first_error(keys::SESSION_KEYS.map(|key| self.session.remove(key)));
            if let Err(e) = first_error([session_tier, self.clear_durable_record()]) {
                tracing::warn!(error = %e, "failed to drop unreadable penalty state");
            }
        }

        if outcome.discarded_expired_delay {
            if let Err(e) = self.clear_delay_end() {
                tracing::warn!(error = %e, "failed to discard expired delay penalty");
            }
        }

        if let Err(e) = self.durable.remove(keys::RELOAD_ATTEMPTED) {
            tracing::warn!(error = %e, "failed to clear reloadAttempted flag");
        }

        if !session.is_clean() {
            if let Err(e) = self.save_session(&session) {
                tracing::warn!(error = %e, "failed to write reconciled session record");
            }
        }

        outcome.resumed_delay_end = session.delay_penalty_end_epoch_ms;
        outcome.session = session;
        outcome
    }

    // ── Violation log ────────────────────────────────────────────────

    /// Append one entry to the violation log.
    ///
    /// # Errors
    /// Returns an error if the log cannot be serialized or written.
    pub fn append_violation(&mut self, entry: ViolationLogEntry) -> Result<(), StorageError> {
        let mut log = match read(&self.durable, keys::VIOLATION_LOG) {
            None => Vec::new(),
            Some(raw) => match serde_json::from_str::<Vec<ViolationLogEntry>>(&raw) {
                Ok(log) => log,
                Err(e) => {
                    tracing::warn!(error = %e, "violation log is corrupt, moving it aside");
                    self.durable.set(keys::VIOLATION_LOG_BACKUP, &raw)?;
                    Vec::new()
                }
            },
        };
        log.push(entry);
        let json = serde_json::to_string(&log)
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
        self.durable.set(keys::VIOLATION_LOG, &json)
    }

    /// The violation log, oldest first. A corrupt log reads as empty.
    pub fn violation_log(&self) -> Vec<ViolationLogEntry> {
        let Some(raw) = read(&self.durable, keys::VIOLATION_LOG) else {
            return Vec::new();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "violation log is corrupt, treating as empty");
            Vec::new()
        })
    }

    /// Write the violation log to `path` as a pretty-printed JSON array.
    /// Returns the number of entries written.
    ///
    /// # Errors
    /// Returns an error if the log cannot be serialized or the file cannot
    /// be written.
    pub fn export_violation_log(&self, path: &Path) -> CoreResult<usize> {
        let log = self.violation_log();
        std::fs::write(path, serde_json::to_string_pretty(&log)?)?;
        Ok(log.len())
    }

    /// # Errors
    /// Returns an error if the removal fails.
    pub fn clear_violation_log(&mut self) -> Result<(), StorageError> {
        first_error([
            self.durable.remove(keys::VIOLATION_LOG),
            self.durable.remove(keys::VIOLATION_LOG_BACKUP),
        ])
    }
}

fn read<K: KvStore>(store: &K, key: &str) -> Option<String> {
    match store.get(key) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(key, error = %e, "storage read failed, treating as absent");
            None
        }
    }
}

fn write_opt<K: KvStore>(store: &mut K, key: &str, value: Option<&str>) -> Result<(), StorageError> {
    match value {
        Some(v) => store.set(key, v),
        None => store.remove(key),
    }
}

fn first_error<const N: usize>(results: [Result<(), StorageError>; N]) -> Result<(), StorageError> {
    results.into_iter().collect()
}
