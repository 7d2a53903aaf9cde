use serde::{Deserialize, Serialize};

use crate::host::SubmitTarget;

/// Every presentation-relevant state change produces an Event.
///
/// The presentation layer renders from these and never decides anything.
/// A surface is always torn down (`DelayPenaltyEnded`, `HardLockLifted`)
/// before a competing surface is entered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    EnteredClear,
    EnteredDelayPenalty {
        end_epoch_ms: i64,
        violation_count: u32,
        last_timestamp: Option<String>,
    },
    /// Remaining time recomputed from the stored end time.
    CountdownTick {
        remaining_ms: u64,
    },
    DelayPenaltyEnded,
    EnteredHardLock {
        violation_count: u32,
        last_timestamp: Option<String>,
        session_id: String,
    },
    HardLockLifted,
    /// Shown for a fixed warning period before the page is submitted.
    SubmissionStarting,
    /// `target` is `None` when the page had nothing to submit.
    SubmissionFinished {
        target: Option<SubmitTarget>,
    },
}

/// Receives events for rendering.
pub trait Presenter {
    fn present(&mut self, event: &Event);
}

/// Presenter that keeps every event, for tests and the simulator.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    pub events: Vec<Event>,
}

impl Presenter for RecordingPresenter {
    fn present(&mut self, event: &Event) {
        self.events.push(event.clone());
    }
}
