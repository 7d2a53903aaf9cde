//! Deterministic page host.
//!
//! A manual clock plus a timer queue. Time only moves when the caller says
//! so, which makes countdowns, reloads and late ticks reproducible. Used by
//! the CLI simulator and by tests.

use std::collections::BTreeMap;

use crate::events::{Event, Presenter};
use crate::host::{system_now_ms, Host, SubmitTarget, TimerId, TimerKind};
use crate::session::ExamSession;
use crate::storage::KvStore;

#[derive(Debug, Clone, Copy)]
struct ScheduledTimer {
    due_ms: i64,
    kind: TimerKind,
}

#[derive(Debug, Clone)]
pub struct VirtualHost {
    now_ms: i64,
    next_id: u64,
    timers: BTreeMap<TimerId, ScheduledTimer>,
    targets: Vec<SubmitTarget>,
    submitted: Vec<SubmitTarget>,
    location: String,
}

impl VirtualHost {
    /// A page whose clock reads `now_ms` and which has every submit target.
    pub fn new(now_ms: i64) -> Self {
        Self {
            now_ms,
            next_id: 1,
            timers: BTreeMap::new(),
            targets: SubmitTarget::ORDER.to_vec(),
            submitted: Vec::new(),
            location: "about:blank".to_string(),
        }
    }

    /// A page whose clock starts at the current wall-clock time.
    pub fn starting_now() -> Self {
        Self::new(system_now_ms())
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Restrict which submit targets the page has.
    pub fn with_submit_targets(mut self, targets: &[SubmitTarget]) -> Self {
        self.targets = targets.to_vec();
        self
    }

    pub fn set_now(&mut self, now_ms: i64) {
        self.now_ms = now_ms;
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Targets activated so far, in order.
    pub fn submitted(&self) -> &[SubmitTarget] {
        &self.submitted
    }

    /// Drop every timer, as a page unload does.
    pub fn unload(&mut self) {
        self.timers.clear();
    }

    /// Pop the earliest timer due at or before `until_ms`, moving the clock
    /// to its due time. Repeating timers are re-queued.
    pub fn next_due(&mut self, until_ms: i64) -> Option<TimerId> {
        let (&id, &timer) = self
            .timers
            .iter()
            .filter(|(_, t)| t.due_ms <= until_ms)
            .min_by_key(|(id, t)| (t.due_ms, **id))?;
        self.now_ms = self.now_ms.max(timer.due_ms);
        match timer.kind {
            TimerKind::Repeating { period_ms } => {
                let period = i64::try_from(period_ms.max(1)).unwrap_or(i64::MAX);
                if let Some(t) = self.timers.get_mut(&id) {
                    t.due_ms = timer.due_ms.saturating_add(period);
                }
            }
            TimerKind::Once { .. } => {
                self.timers.remove(&id);
            }
        }
        Some(id)
    }

    /// Let `ms` of virtual time pass, delivering every timer that comes due
    /// to `session` and every resulting event to `presenter`.
    pub fn advance<S: KvStore, D: KvStore>(
        &mut self,
        ms: u64,
        session: &mut ExamSession<S, D>,
        presenter: &mut dyn Presenter,
    ) {
        let until = self
            .now_ms
            .saturating_add(i64::try_from(ms).unwrap_or(i64::MAX));
        while let Some(id) = self.next_due(until) {
            for event in session.on_timer(id, self) {
                presenter.present(&event);
            }
        }
        self.now_ms = until;
    }
}

impl Host for VirtualHost {
    fn now_ms(&self) -> i64 {
        self.now_ms
    }

    fn schedule(&mut self, kind: TimerKind) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let delay = match kind {
            TimerKind::Repeating { period_ms } => period_ms,
            TimerKind::Once { delay_ms } => delay_ms,
        };
        let due_ms = self
            .now_ms
            .saturating_add(i64::try_from(delay).unwrap_or(i64::MAX));
        self.timers.insert(id, ScheduledTimer { due_ms, kind });
        id
    }

    fn cancel(&mut self, id: TimerId) {
        self.timers.remove(&id);
    }

    fn try_submit(&mut self, target: SubmitTarget) -> bool {
        if self.targets.contains(&target) {
            self.submitted.push(target);
            true
        } else {
            false
        }
    }

    fn location(&self) -> String {
        self.location.clone()
    }
}

/// Forward every event in `events` to `presenter`.
pub fn present_all(presenter: &mut dyn Presenter, events: &[Event]) {
    for event in events {
        presenter.present(event);
    }
}
