//! The exam session: one per monitored page load.
//!
//! Owned by the host and driven entirely through `&mut self`, so signals
//! and timer callbacks run to completion one at a time, storage writes
//! included.

use serde::{Deserialize, Serialize};

use crate::events::Event;
use crate::host::{Host, TimerId};
use crate::monitor::{Observation, Signal, ViolationMonitor};
use crate::penalty::{PenaltyEngine, PenaltyState};
use crate::persistence::{Persistence, SessionRecord, ViolationLogEntry};
use crate::storage::{ExamLockConfig, KvStore, Mode, SettingsStore};

/// Host-facing result of one signal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalResponse {
    pub observation: Observation,
    pub events: Vec<Event>,
}

pub struct ExamSession<S, D> {
    id: String,
    monitor: ViolationMonitor,
    engine: PenaltyEngine<S, D>,
    started_at_ms: i64,
}

impl<S: KvStore, D: KvStore> ExamSession<S, D> {
    /// Start monitoring a page load with settings read from `settings`.
    ///
    /// Returns the session and the events produced by reconciliation, which
    /// may re-enter a penalty before any signal arrives.
    pub fn load(
        settings: &dyn SettingsStore,
        session_tier: S,
        durable_tier: D,
        host: &mut dyn Host,
    ) -> (Self, Vec<Event>) {
        Self::with_config(settings.load_or_default(), session_tier, durable_tier, host)
    }

    pub fn with_config(
        config: ExamLockConfig,
        session_tier: S,
        durable_tier: D,
        host: &mut dyn Host,
    ) -> (Self, Vec<Event>) {
        let config = config.normalized();
        let id = new_session_id();
        let mut monitor = ViolationMonitor::new();
        monitor.start(&config);

        let persistence = Persistence::new(session_tier, durable_tier);
        let mut engine = PenaltyEngine::new(config, persistence, id.clone());
        let events = engine.restore(host);

        tracing::info!(session_id = %id, state = ?engine.state(), "exam session started");
        let session = Self {
            id,
            monitor,
            engine,
            started_at_ms: host.now_ms(),
        };
        (session, events)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &ExamLockConfig {
        self.engine.config()
    }

    pub fn state(&self) -> PenaltyState {
        self.engine.state()
    }

    pub fn record(&self) -> &SessionRecord {
        self.engine.record()
    }

    pub fn violation_count(&self) -> u32 {
        self.engine.record().violation_count
    }

    pub fn remaining_ms(&self, now_ms: i64) -> Option<u64> {
        self.engine.remaining_ms(now_ms)
    }

    pub fn violation_log(&self) -> Vec<ViolationLogEntry> {
        self.engine.persistence().violation_log()
    }

    pub fn persistence(&self) -> &Persistence<S, D> {
        self.engine.persistence()
    }

    /// Tear the session down and hand back its storage tiers.
    pub fn into_tiers(self) -> (S, D) {
        self.engine.into_persistence().into_tiers()
    }

    // ── Host callbacks ───────────────────────────────────────────────

    /// Classify a page signal and apply any resulting violation.
    pub fn handle_signal(&mut self, signal: &Signal, host: &mut dyn Host) -> SignalResponse {
        let mut observation = self.monitor.observe(signal, self.engine.is_detecting());
        let mut events = Vec::new();

        if *signal == Signal::FormSubmit
            && self.monitor.is_running()
            && self.engine.state() == PenaltyState::HardLock
            && self.engine.config().mode == Mode::Overlay
        {
            observation.prevent_default = true;
            events.push(self.engine.hard_lock_event());
        }

        if observation.violation {
            events.extend(self.engine.on_violation(host));
            self.log_violation(host);
        }

        SignalResponse {
            observation,
            events,
        }
    }

    pub fn on_timer(&mut self, id: TimerId, host: &mut dyn Host) -> Vec<Event> {
        self.engine.on_timer(id, host)
    }

    /// Synchronous unload hook: only the durable snapshot.
    pub fn before_unload(&mut self) {
        self.engine.before_unload();
    }

    /// Wipe both tiers and reset to `Clear` in this tab.
    pub fn clear(&mut self, host: &mut dyn Host) -> Vec<Event> {
        self.engine.clear(host)
    }

    pub fn stop(&mut self) {
        self.monitor.stop();
    }

    fn log_violation(&mut self, host: &mut dyn Host) {
        let now = host.now_ms();
        let entry = ViolationLogEntry {
            timestamp: now,
            location: host.location(),
            violation_count: self.engine.record().violation_count,
            session_duration_ms: u64::try_from(now - self.started_at_ms).unwrap_or(0),
            session_id: self.id.clone(),
        };
        if let Err(e) = self.engine.persistence_mut().append_violation(entry) {
            tracing::warn!(error = %e, "violation log write failed");
        }
    }
}

/// Short, human-readable identifier shown on the lock surface.
fn new_session_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(9);
    id.to_ascii_uppercase()
}
