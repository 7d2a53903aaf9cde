use chrono::DateTime;
use serde::{Deserialize, Serialize};

/// Storage keys shared by both tiers.
pub mod keys {
    pub const VIOLATED: &str = "violated";
    pub const VIOLATION_COUNT: &str = "violationCount";
    pub const LAST_TIMESTAMP: &str = "lastTimestamp";
    pub const DELAY_END_EPOCH_MS: &str = "delayEndEpochMs";
    /// Durable tier only.
    pub const RELOAD_ATTEMPTED: &str = "reloadAttempted";
    /// Durable tier only. JSON array of log entries.
    pub const VIOLATION_LOG: &str = "violationLog";
    /// Durable tier only. Last unreadable log, kept aside before rewriting.
    pub const VIOLATION_LOG_BACKUP: &str = "violationLogBackup";

    pub const SESSION_KEYS: [&str; 4] = [VIOLATED, VIOLATION_COUNT, LAST_TIMESTAMP, DELAY_END_EPOCH_MS];
    pub const DURABLE_KEYS: [&str; 5] = [
        VIOLATED,
        VIOLATION_COUNT,
        LAST_TIMESTAMP,
        DELAY_END_EPOCH_MS,
        RELOAD_ATTEMPTED,
    ];
}

/// Tab-scoped penalty state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// A penalty is currently owed or active.
    pub violated: bool,
    pub violation_count: u32,
    /// RFC 3339, UTC.
    pub last_violation_timestamp: Option<String>,
    pub delay_penalty_end_epoch_ms: Option<i64>,
}

impl SessionRecord {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// Reload-survival shadow of the session record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurableRecord {
    pub violated: bool,
    pub violation_count: u32,
    pub last_violation_timestamp: Option<String>,
    pub delay_penalty_end_epoch_ms: Option<i64>,
    /// Set right before unload, consumed by the next load.
    pub reload_attempted: bool,
}

impl DurableRecord {
    pub fn shadow_of(session: &SessionRecord, reload_attempted: bool) -> Self {
        Self {
            violated: session.violated,
            violation_count: session.violation_count,
            last_violation_timestamp: session.last_violation_timestamp.clone(),
            delay_penalty_end_epoch_ms: session.delay_penalty_end_epoch_ms,
            reload_attempted,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One line of the append-only violation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationLogEntry {
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub location: String,
    pub violation_count: u32,
    pub session_duration_ms: u64,
    pub session_id: String,
}

/// Outcome of the load-time reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub session: SessionRecord,
    /// The previous page unloaded while violated.
    pub bypass_detected: bool,
    /// A countdown that should resume, ending at this exact time.
    pub resumed_delay_end: Option<i64>,
    /// A stored countdown had already run out while the page was gone.
    pub discarded_expired_delay: bool,
}

// Stored values are strings. Anything that does not parse reads as absent.

pub(crate) fn parse_bool(raw: Option<String>) -> Option<bool> {
    match raw?.as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

pub(crate) fn parse_u32(raw: Option<String>) -> Option<u32> {
    raw?.trim().parse().ok()
}

pub(crate) fn parse_i64(raw: Option<String>) -> Option<i64> {
    raw?.trim().parse().ok()
}

pub(crate) fn parse_timestamp(raw: Option<String>) -> Option<String> {
    let raw = raw?;
    DateTime::parse_from_rfc3339(&raw).ok().map(|_| raw)
}
