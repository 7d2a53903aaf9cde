//! The page host as seen by the core.
//!
//! The core never touches a clock, a timer or the document directly. The
//! embedding runtime implements [`Host`] and hands it to every
//! [`ExamSession`](crate::ExamSession) call, which keeps the session free of
//! ambient state and lets tests drive time by hand.

use serde::{Deserialize, Serialize};

/// Opaque handle to a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerId(pub u64);

/// What kind of timer to schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimerKind {
    /// Fire every `period_ms` until cancelled.
    Repeating { period_ms: u64 },
    /// Fire once after `delay_ms`.
    Once { delay_ms: u64 },
}

/// Candidates for the submission action, tried in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitTarget {
    /// The page's own submit control.
    DesignatedControl,
    /// A recognized third-party form provider's submit control.
    ThirdPartyControl,
    /// Any form present on the page.
    AnyForm,
}

impl SubmitTarget {
    pub const ORDER: [SubmitTarget; 3] = [
        SubmitTarget::DesignatedControl,
        SubmitTarget::ThirdPartyControl,
        SubmitTarget::AnyForm,
    ];
}

/// Services the hosting page provides to the core.
pub trait Host {
    /// Wall-clock time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;

    /// Schedule a timer. The host later calls
    /// [`ExamSession::on_timer`](crate::ExamSession::on_timer) with the id.
    fn schedule(&mut self, kind: TimerKind) -> TimerId;

    /// Cancel a timer. Cancelling an unknown or already-fired id is a no-op.
    fn cancel(&mut self, id: TimerId);

    /// Activate the given submit target. Returns `false` if the page has none.
    fn try_submit(&mut self, target: SubmitTarget) -> bool;

    /// Identifier of the monitored page, recorded in the violation log.
    fn location(&self) -> String;
}

/// Current wall-clock time in epoch milliseconds.
pub fn system_now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
