//! Shared page harness for integration tests.

#![allow(dead_code)]

use examlock_core::{
    Event, ExamLockConfig, ExamSession, KvStore, MemoryStore, Observation, Presenter,
    RecordingPresenter, Signal, StorageError, VirtualHost,
};

pub const T0: i64 = 1_800_000_000_000;

/// One monitored page: host, session and everything presented so far.
pub struct Page<S: KvStore, D: KvStore> {
    pub host: VirtualHost,
    pub session: ExamSession<S, D>,
    pub presenter: RecordingPresenter,
}

impl Page<MemoryStore, MemoryStore> {
    pub fn fresh(config: ExamLockConfig) -> Self {
        Page::open(config, MemoryStore::new(), MemoryStore::new(), VirtualHost::new(T0))
    }
}

impl<S: KvStore, D: KvStore> Page<S, D> {
    pub fn open(config: ExamLockConfig, session_tier: S, durable_tier: D, mut host: VirtualHost) -> Self {
        let (session, events) = ExamSession::with_config(config, session_tier, durable_tier, &mut host);
        let mut presenter = RecordingPresenter::default();
        for event in &events {
            presenter.present(event);
        }
        Self {
            host,
            session,
            presenter,
        }
    }

    pub fn signal(&mut self, signal: Signal) -> Observation {
        let response = self.session.handle_signal(&signal, &mut self.host);
        for event in &response.events {
            self.presenter.present(event);
        }
        response.observation
    }

    pub fn violate(&mut self) {
        self.signal(Signal::WindowBlur);
    }

    pub fn wait_secs(&mut self, secs: u64) {
        self.host
            .advance(secs * 1000, &mut self.session, &mut self.presenter);
    }

    pub fn clear(&mut self) {
        let events = self.session.clear(&mut self.host);
        for event in &events {
            self.presenter.present(event);
        }
    }

    /// Unload and load the page again in the same tab: both tiers survive.
    pub fn reload(self) -> Self {
        let Page {
            mut host,
            mut session,
            ..
        } = self;
        let config = session.config().clone();
        session.before_unload();
        host.unload();
        let (session_tier, durable_tier) = session.into_tiers();
        Page::open(config, session_tier, durable_tier, host)
    }

    pub fn events(&self) -> &[Event] {
        &self.presenter.events
    }

    pub fn count<F: Fn(&Event) -> bool>(&self, pred: F) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.presenter.events)
    }
}

impl<D: KvStore> Page<MemoryStore, D> {
    /// Unload and reopen in a new tab: the session tier is gone.
    pub fn reopen(self) -> Self {
        let Page {
            mut host,
            mut session,
            ..
        } = self;
        let config = session.config().clone();
        session.before_unload();
        host.unload();
        let (_, durable_tier) = session.into_tiers();
        Page::open(config, MemoryStore::new(), durable_tier, host)
    }
}

/// A tier whose writes always fail.
#[derive(Debug, Default)]
pub struct FailingStore;

impl KvStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    fn set(&mut self, key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::WriteRejected {
            key: key.to_string(),
            message: "quota exceeded".into(),
        })
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        Err(StorageError::WriteRejected {
            key: key.to_string(),
            message: "storage disabled".into(),
        })
    }
}

pub fn delay_config(seconds: u32, max_violations: u32) -> ExamLockConfig {
    ExamLockConfig {
        delay_penalty_enabled: true,
        delay_penalty_seconds: seconds,
        max_violations,
        ..ExamLockConfig::default()
    }
}

pub fn is_hard_lock(e: &Event) -> bool {
    matches!(e, Event::EnteredHardLock { .. })
}

pub fn is_delay(e: &Event) -> bool {
    matches!(e, Event::EnteredDelayPenalty { .. })
}
