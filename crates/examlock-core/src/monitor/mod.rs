//! Violation monitor.
//!
//! Classifies page signals. It holds no penalty state of its own: the
//! session tells it whether the state machine is still detecting.

mod keys;

pub use keys::{KeyCombo, ParseKeyComboError};

use serde::{Deserialize, Serialize};

use crate::storage::ExamLockConfig;

/// A raw signal delivered by the page host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum Signal {
    VisibilityChange { hidden: bool },
    WindowBlur,
    KeyDown(KeyCombo),
    /// A form on the page is about to submit.
    FormSubmit,
}

/// What the host should do with a signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Count one violation.
    pub violation: bool,
    /// Suppress the browser's default handling.
    pub prevent_default: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ViolationMonitor {
    running: bool,
}

impl ViolationMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe. Does nothing when monitoring is disabled.
    pub fn start(&mut self, config: &ExamLockConfig) {
        self.running = config.enabled;
        if !self.running {
            tracing::info!("monitoring disabled, not subscribing");
        }
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Classify `signal`. `detecting` is false once the state machine is
    /// terminal; matched shortcuts are still prevented then.
    ///
    /// Form submissions are never violations; whether they are blocked is
    /// decided by the session.
    pub fn observe(&self, signal: &Signal, detecting: bool) -> Observation {
        if !self.running {
            return Observation::default();
        }
        match signal {
            Signal::VisibilityChange { hidden: true } | Signal::WindowBlur => Observation {
                violation: detecting,
                prevent_default: false,
            },
            Signal::VisibilityChange { hidden: false } | Signal::FormSubmit => {
                Observation::default()
            }
            Signal::KeyDown(combo) => {
                if combo.is_circumvention() {
                    Observation {
                        violation: detecting,
                        prevent_default: true,
                    }
                } else {
                    Observation::default()
                }
            }
        }
    }
}
