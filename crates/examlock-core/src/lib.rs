//! # Exam Lock Core Library
//!
//! Core logic for an exam-integrity monitor: it watches a single page for
//! signs that the test-taker left or obscured it and enforces a
//! configurable penalty.
//!
//! ## Architecture
//!
//! - **Violation Monitor**: classifies visibility, focus and keyboard
//!   signals
//! - **Penalty Engine**: a wall-clock-based state machine (clear, delay
//!   penalty, hard lock, pending submit). The host delivers timer ticks
//! - **Persistence**: session and durable key-value tiers with load-time
//!   reconciliation, so a reload cannot erase a penalty
//! - **Settings**: TOML-backed typed configuration with per-field defaults
//!
//! ## Key Components
//!
//! - [`ExamSession`]: the session object a page host owns
//! - [`Host`]: clock, timers and submit targets provided by the page
//! - [`Event`]: everything the presentation layer renders from

pub mod error;
pub mod events;
pub mod host;
pub mod monitor;
pub mod penalty;
pub mod persistence;
pub mod session;
pub mod sim;
pub mod storage;

pub use error::{ConfigError, CoreError, StorageError};
pub use events::{Event, Presenter, RecordingPresenter};
pub use host::{Host, SubmitTarget, TimerId, TimerKind};
pub use monitor::{KeyCombo, Observation, Signal, ViolationMonitor};
pub use penalty::{PenaltyEngine, PenaltyState};
pub use persistence::{DurableRecord, Persistence, SessionRecord, ViolationLogEntry};
pub use session::{ExamSession, SignalResponse};
pub use sim::VirtualHost;
pub use storage::{
    ExamLockConfig, FileSettings, KvStore, MemoryStore, Mode, SettingsStore, SqliteStore,
    StaticSettings,
};
