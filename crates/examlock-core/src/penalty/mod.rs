mod engine;
mod submission;

pub use engine::{PenaltyEngine, PenaltyState, TICK_MS};
pub use submission::{SubmissionAction, SUBMIT_WARNING_MS};
