//! Best-effort auto-submission.
//!
//! A warning is shown for [`SUBMIT_WARNING_MS`], then the page's submit
//! targets are tried in [`SubmitTarget::ORDER`]. Nothing found is not an
//! error: the terminal state is already recorded.

use crate::events::Event;
use crate::host::{Host, SubmitTarget, TimerId, TimerKind};

/// How long the warning is shown before submitting.
pub const SUBMIT_WARNING_MS: u64 = 2_000;

#[derive(Debug, Clone, Default)]
pub struct SubmissionAction {
    timer: Option<TimerId>,
    started: bool,
}

impl SubmissionAction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the warning period. Returns `None` if this action already
    /// started; it fires at most once.
    pub fn begin(&mut self, host: &mut dyn Host) -> Option<Event> {
        if self.started {
            return None;
        }
        self.started = true;
        self.timer = Some(host.schedule(TimerKind::Once {
            delay_ms: SUBMIT_WARNING_MS,
        }));
        tracing::info!("auto-submission scheduled");
        Some(Event::SubmissionStarting)
    }

    pub fn owns(&self, id: TimerId) -> bool {
        self.timer == Some(id)
    }

    #[cfg(test)]
    fn is_pending(&self) -> bool {
        self.timer.is_some()
    }

    /// Submit now. Called when the warning timer fires.
    pub fn fire(&mut self, host: &mut dyn Host) -> Event {
        self.timer = None;
        let target = SubmitTarget::ORDER
            .into_iter()
            .find(|&target| host.try_submit(target));
        match target {
            Some(target) => tracing::info!(?target, "exam submitted"),
            None => tracing::debug!("no submit target on page"),
        }
        Event::SubmissionFinished { target }
    }

    /// Cancel a pending submission and allow a future one.
    pub fn cancel(&mut self, host: &mut dyn Host) {
        if let Some(id) = self.timer.take() {
            host.cancel(id);
        }
        self.started = false;
    }
}
