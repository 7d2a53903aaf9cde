//! Penalty state machine.
//!
//! Like a wall-clock timer, the countdown never decrements an internal
//! counter: every tick recomputes the remaining time from the stored end
//! time, so delayed ticks and countdowns recreated after a reload show the
//! right value.
//!
//! ## State Transitions
//!
//! ```text
//! Clear -> Violated -> DelayPenalty -> (Clear | HardLock | PendingSubmit)
//!                   -> HardLock        (overlay mode, no delay penalty)
//!                   -> PendingSubmit   (submit mode, no delay penalty)
//! ```
//!
//! `HardLock` and `PendingSubmit` are terminal until the clear operation.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::submission::SubmissionAction;
use crate::events::Event;
use crate::host::{Host, TimerId, TimerKind};
use crate::persistence::{DurableRecord, Persistence, SessionRecord};
use crate::storage::{ExamLockConfig, KvStore, Mode};

/// Countdown tick period.
pub const TICK_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyState {
    Clear,
    /// Transient: a violation was counted and the penalty is being chosen.
    Violated,
    DelayPenalty,
    HardLock,
    PendingSubmit,
}

impl PenaltyState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PenaltyState::HardLock | PenaltyState::PendingSubmit)
    }
}

#[derive(Debug, Clone, Copy)]
struct Countdown {
    timer: TimerId,
    end_epoch_ms: i64,
}

pub struct PenaltyEngine<S, D> {
    config: ExamLockConfig,
    state: PenaltyState,
    record: SessionRecord,
    countdown: Option<Countdown>,
    submission: SubmissionAction,
    persistence: Persistence<S, D>,
    session_id: String,
}

impl<S: KvStore, D: KvStore> PenaltyEngine<S, D> {
    /// Create an engine in `Clear`. Call [`restore`](Self::restore) before
    /// handing it any signal.
    pub fn new(config: ExamLockConfig, persistence: Persistence<S, D>, session_id: String) -> Self {
        Self {
            config,
            state: PenaltyState::Clear,
            record: SessionRecord::default(),
            countdown: None,
            submission: SubmissionAction::new(),
            persistence,
            session_id,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> PenaltyState {
        self.state
    }

    pub fn record(&self) -> &SessionRecord {
        &self.record
    }

    pub fn config(&self) -> &ExamLockConfig {
        &self.config
    }

    /// False once terminal: further signals are not counted.
    pub fn is_detecting(&self) -> bool {
        !self.state.is_terminal()
    }

    /// Remaining delay penalty, if one is running.
    pub fn remaining_ms(&self, now_ms: i64) -> Option<u64> {
        self.countdown
            .map(|c| u64::try_from(c.end_epoch_ms - now_ms).unwrap_or(0))
    }

    pub fn persistence(&self) -> &Persistence<S, D> {
        &self.persistence
    }

    pub fn persistence_mut(&mut self) -> &mut Persistence<S, D> {
        &mut self.persistence
    }

    pub fn into_persistence(self) -> Persistence<S, D> {
        self.persistence
    }

    /// The hard-lock surface as currently shown.
    pub fn hard_lock_event(&self) -> Event {
        Event::EnteredHardLock {
            violation_count: self.record.violation_count,
            last_timestamp: self.record.last_violation_timestamp.clone(),
            session_id: self.session_id.clone(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Reconcile storage and re-enter whatever state survived the reload.
    pub fn restore(&mut self, host: &mut dyn Host) -> Vec<Event> {
        let outcome = self.persistence.reconcile(host.now_ms());
        self.record = outcome.session;
        let mut events = Vec::new();

        if outcome.bypass_detected {
            tracing::warn!(
                violation_count = self.record.violation_count,
                "page reloaded while violated"
            );
        }

        if outcome.discarded_expired_delay {
            self.serve_delay_penalty();
        }

        if let Some(end) = self.record.delay_penalty_end_epoch_ms {
            if !self.record.violated {
                self.record.violated = true;
                self.persist_session();
            }
            self.show_delay_penalty(end, host, &mut events);
        } else if !self.record.violated {
            self.state = PenaltyState::Clear;
        } else if self.config.delay_penalty_enabled {
            self.decide_after_delay(host, &mut events, false);
        } else {
            self.enter_terminal(host, &mut events, false);
        }
        events
    }

    /// Count one violation and apply the penalty.
    pub fn on_violation(&mut self, host: &mut dyn Host) -> Vec<Event> {
        if self.state.is_terminal() {
            return Vec::new();
        }
        let now = host.now_ms();
        let was_violated = self.record.violated;
        let had_delay_end = self.record.delay_penalty_end_epoch_ms.is_some();
        let delay_ms = self.config.delay_penalty_ms();
        let timed = self.config.delay_penalty_enabled && delay_ms > 0;

        self.record.violation_count = self.record.violation_count.saturating_add(1);
        self.record.last_violation_timestamp = Some(format_timestamp(now));
        self.record.violated = true;
        self.record.delay_penalty_end_epoch_ms = timed.then(|| now + delay_ms);

        self.persist_session();
        if was_violated {
            let shadow = DurableRecord::shadow_of(&self.record, false);
            if let Err(e) = self.persistence.save_durable(&shadow) {
                tracing::warn!(error = %e, "durable mirror write failed");
            }
        }
        if had_delay_end && !timed {
            if let Err(e) = self.persistence.clear_delay_end() {
                tracing::warn!(error = %e, "failed to clear delay end");
            }
        }

        tracing::info!(
            violation_count = self.record.violation_count,
            "violation counted"
        );

        let mut events = Vec::new();
        if let Some(end) = self.record.delay_penalty_end_epoch_ms {
            self.show_delay_penalty(end, host, &mut events);
            return events;
        }

        self.leave_delay_penalty(host, &mut events);
        self.state = PenaltyState::Violated;
        if self.config.delay_penalty_enabled {
            // Zero-length delay penalty: served the moment it is imposed.
            self.decide_after_delay(host, &mut events, true);
        } else {
            self.enter_terminal(host, &mut events, true);
        }
        events
    }

    /// Dispatch a timer callback. Ticks from timers this engine no longer
    /// owns are ignored.
    pub fn on_timer(&mut self, id: TimerId, host: &mut dyn Host) -> Vec<Event> {
        let mut events = Vec::new();
        let current = self.countdown;
        match current {
            Some(countdown) if countdown.timer == id => {
                let remaining = countdown.end_epoch_ms - host.now_ms();
                if remaining > 0 {
                    events.push(Event::CountdownTick {
                        remaining_ms: remaining as u64,
                    });
                } else {
                    events.push(Event::CountdownTick { remaining_ms: 0 });
                    self.complete_countdown(host, &mut events);
                }
            }
            _ if self.submission.owns(id) => {
                events.push(self.submission.fire(host));
            }
            _ => {
                tracing::debug!(timer = id.0, "ignoring stale timer");
            }
        }
        events
    }

    /// Shadow the session into durable storage. The only work done at
    /// unload.
    pub fn before_unload(&mut self) {
        match self.persistence.snapshot_for_unload(&self.record) {
            Ok(true) => tracing::debug!("session shadowed for reload"),
            Ok(false) => {}
            Err(e) => tracing::warn!(error = %e, "unload snapshot failed"),
        }
    }

    /// Wipe both tiers and return to `Clear`.
    pub fn clear(&mut self, host: &mut dyn Host) -> Vec<Event> {
        let mut events = Vec::new();
        self.leave_delay_penalty(host, &mut events);
        if self.state == PenaltyState::HardLock {
            events.push(Event::HardLockLifted);
        }
        self.submission.cancel(host);
        if let Err(e) = self.persistence.clear_all() {
            tracing::warn!(error = %e, "clear could not wipe storage");
        }
        self.record = SessionRecord::default();
        self.state = PenaltyState::Clear;
        events.push(Event::EnteredClear);
        tracing::info!("penalty state cleared");
        events
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn persist_session(&mut self) {
        if let Err(e) = self.persistence.save_session(&self.record) {
            tracing::warn!(error = %e, "session write failed, continuing in memory");
        }
    }

    /// (Re)arm the countdown ending at `end`. Any previous countdown is
    /// cancelled, never stacked.
    fn show_delay_penalty(&mut self, end: i64, host: &mut dyn Host, events: &mut Vec<Event>) {
        debug_assert!(
            !self.state.is_terminal(),
            "delay penalty entered from terminal state {:?}",
            self.state
        );
        self.cancel_countdown(host);
        let timer = host.schedule(TimerKind::Repeating { period_ms: TICK_MS });
        self.countdown = Some(Countdown {
            timer,
            end_epoch_ms: end,
        });
        self.state = PenaltyState::DelayPenalty;
        events.push(Event::EnteredDelayPenalty {
            end_epoch_ms: end,
            violation_count: self.record.violation_count,
            last_timestamp: self.record.last_violation_timestamp.clone(),
        });
        events.push(Event::CountdownTick {
            remaining_ms: u64::try_from(end - host.now_ms()).unwrap_or(0),
        });
    }

    /// Tear down a running delay penalty without serving it.
    fn leave_delay_penalty(&mut self, host: &mut dyn Host, events: &mut Vec<Event>) {
        if self.cancel_countdown(host) {
            events.push(Event::DelayPenaltyEnded);
        }
        if self.record.delay_penalty_end_epoch_ms.take().is_some() {
            self.persist_session();
            if let Err(e) = self.persistence.clear_delay_end() {
                tracing::warn!(error = %e, "failed to clear delay end");
            }
        }
    }

    fn cancel_countdown(&mut self, host: &mut dyn Host) -> bool {
        match self.countdown.take() {
            Some(countdown) => {
                host.cancel(countdown.timer);
                true
            }
            None => false,
        }
    }

    fn complete_countdown(&mut self, host: &mut dyn Host, events: &mut Vec<Event>) {
        self.cancel_countdown(host);
        events.push(Event::DelayPenaltyEnded);
        self.serve_delay_penalty();
        self.state = PenaltyState::Violated;
        self.decide_after_delay(host, events, true);
    }

    /// Forget a served delay penalty in both tiers.
    fn serve_delay_penalty(&mut self) {
        self.record.delay_penalty_end_epoch_ms = None;
        if let Err(e) = self
            .persistence
            .clear_delay_end()
            .and_then(|()| self.persistence.clear_durable_record())
        {
            tracing::warn!(error = %e, "failed to clear served delay penalty");
        }
    }

    /// Escalate if the threshold is reached, otherwise resume the exam.
    fn decide_after_delay(&mut self, host: &mut dyn Host, events: &mut Vec<Event>, fresh: bool) {
        if self.record.violation_count >= self.config.max_violations {
            self.enter_terminal(host, events, fresh);
        } else {
            self.record.violated = false;
            self.persist_session();
            self.state = PenaltyState::Clear;
            events.push(Event::EnteredClear);
            tracing::info!(
                violation_count = self.record.violation_count,
                max_violations = self.config.max_violations,
                "delay penalty served"
            );
        }
    }

    /// `fresh` is false when re-entering after a reload: the submission is
    /// not fired a second time.
    fn enter_terminal(&mut self, host: &mut dyn Host, events: &mut Vec<Event>, fresh: bool) {
        match self.config.mode {
            Mode::Overlay => {
                self.state = PenaltyState::HardLock;
                events.push(self.hard_lock_event());
                tracing::info!(
                    violation_count = self.record.violation_count,
                    "hard lock"
                );
            }
            Mode::Submit => {
                self.state = PenaltyState::PendingSubmit;
                if fresh {
                    events.extend(self.submission.begin(host));
                }
            }
        }
    }
}

fn format_timestamp(epoch_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(epoch_ms)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}
