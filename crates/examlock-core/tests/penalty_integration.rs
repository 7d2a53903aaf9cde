//! Integration tests for the penalty state machine.

mod common;

use common::{delay_config, is_delay, is_hard_lock, FailingStore, Page, T0};
use examlock_core::{
    Event, ExamLockConfig, KeyCombo, MemoryStore, Mode, PenaltyState, Signal, SubmitTarget,
    VirtualHost,
};

#[test]
fn escalation_after_second_served_penalty() {
    let mut page = Page::fresh(ExamLockConfig {
        mode: Mode::Overlay,
        ..delay_config(30, 2)
    });

    page.violate();
    assert_eq!(page.session.state(), PenaltyState::DelayPenalty);

    page.wait_secs(30);
    assert_eq!(page.session.state(), PenaltyState::Clear);
    assert_eq!(page.session.violation_count(), 1);

    page.violate();
    assert_eq!(page.session.state(), PenaltyState::DelayPenalty);

    page.wait_secs(30);
    assert_eq!(page.session.state(), PenaltyState::HardLock);
    assert_eq!(page.session.violation_count(), 2);

    let tail: Vec<_> = page.events().iter().rev().take(3).rev().cloned().collect();
    assert_eq!(tail[0], Event::CountdownTick { remaining_ms: 0 });
    assert_eq!(tail[1], Event::DelayPenaltyEnded);
    assert!(is_hard_lock(&tail[2]));
}

#[test]
fn countdown_ticks_once_per_second_and_decrease() {
    let mut page = Page::fresh(delay_config(5, 3));
    page.violate();
    page.wait_secs(5);

    let ticks: Vec<u64> = page
        .events()
        .iter()
        .filter_map(|e| match e {
            Event::CountdownTick { remaining_ms } => Some(*remaining_ms),
            _ => None,
        })
        .collect();
    assert_eq!(ticks, vec![5_000, 4_000, 3_000, 2_000, 1_000, 0]);
    assert_eq!(page.events().last(), Some(&Event::EnteredClear));
    assert_eq!(page.host.pending_timers(), 0);
}

#[test]
fn served_penalty_clears_stored_end_time() {
    let mut page = Page::fresh(delay_config(3, 3));
    page.violate();
    page.violate();
    assert!(page.session.persistence().load().1.delay_penalty_end_epoch_ms.is_some());

    page.wait_secs(3);
    let (session, durable) = page.session.persistence().load();
    assert_eq!(session.delay_penalty_end_epoch_ms, None);
    assert!(durable.is_empty());
    assert_eq!(session.violation_count, 2);
}

#[test]
fn violation_during_delay_rearms_from_now() {
    let mut page = Page::fresh(delay_config(10, 5));
    page.violate();
    page.wait_secs(6);
    page.violate();
    assert_eq!(
        page.session.record().delay_penalty_end_epoch_ms,
        Some(T0 + 16_000)
    );
    assert_eq!(page.host.pending_timers(), 1);

    // Old end time passes: still penalized.
    page.wait_secs(5);
    assert_eq!(page.session.state(), PenaltyState::DelayPenalty);
    page.wait_secs(5);
    assert_eq!(page.session.state(), PenaltyState::Clear);
    assert_eq!(page.count(is_delay), 2);
}

#[test]
fn submit_mode_single_violation_submits_once() {
    let mut page = Page::fresh(ExamLockConfig {
        mode: Mode::Submit,
        delay_penalty_enabled: false,
        ..ExamLockConfig::default()
    });

    page.violate();
    page.signal(Signal::VisibilityChange { hidden: true });
    page.signal(Signal::KeyDown(KeyCombo::new("F12")));
    page.wait_secs(5);

    assert_eq!(page.session.state(), PenaltyState::PendingSubmit);
    assert_eq!(page.count(|e| *e == Event::SubmissionStarting), 1);
    assert_eq!(page.count(is_hard_lock), 0);
    assert_eq!(
        page.events().last(),
        Some(&Event::SubmissionFinished {
            target: Some(SubmitTarget::DesignatedControl)
        })
    );
    assert_eq!(page.host.submitted(), &[SubmitTarget::DesignatedControl]);
    assert_eq!(page.session.violation_count(), 1);
}

#[test]
fn submission_waits_for_warning() {
    let mut page = Page::fresh(ExamLockConfig {
        mode: Mode::Submit,
        delay_penalty_enabled: false,
        ..ExamLockConfig::default()
    });
    page.violate();
    page.wait_secs(1);
    assert!(page.host.submitted().is_empty());
    page.wait_secs(1);
    assert_eq!(page.host.submitted().len(), 1);
}

#[test]
fn submit_mode_escalates_after_delay_penalties() {
    let mut page = Page::fresh(ExamLockConfig {
        mode: Mode::Submit,
        ..delay_config(2, 1)
    });
    page.violate();
    page.wait_secs(2);
    assert_eq!(page.session.state(), PenaltyState::PendingSubmit);
    page.wait_secs(2);
    assert_eq!(page.count(|e| *e == Event::SubmissionStarting), 1);
    assert_eq!(page.host.submitted().len(), 1);
}

#[test]
fn page_without_submit_target_still_terminal() {
    let host = VirtualHost::new(T0).with_submit_targets(&[]);
    let mut page = Page::open(
        ExamLockConfig {
            mode: Mode::Submit,
            delay_penalty_enabled: false,
            ..ExamLockConfig::default()
        },
        MemoryStore::new(),
        MemoryStore::new(),
        host,
    );
    page.violate();
    page.wait_secs(3);
    assert_eq!(page.session.state(), PenaltyState::PendingSubmit);
    assert_eq!(
        page.events().last(),
        Some(&Event::SubmissionFinished { target: None })
    );
    page.violate();
    assert_eq!(page.session.violation_count(), 1);
}

#[test]
fn disabled_monitoring_counts_nothing() {
    let mut page = Page::fresh(ExamLockConfig {
        enabled: false,
        ..ExamLockConfig::default()
    });
    page.violate();
    let obs = page.signal(Signal::KeyDown("alt+tab".parse().unwrap()));
    assert!(!obs.prevent_default);
    assert_eq!(page.session.violation_count(), 0);
    assert_eq!(page.session.state(), PenaltyState::Clear);
    assert!(page.events().is_empty());
}

#[test]
fn hard_lock_prevents_shortcuts_without_counting() {
    let mut page = Page::fresh(ExamLockConfig {
        delay_penalty_enabled: false,
        ..ExamLockConfig::default()
    });
    page.violate();
    let obs = page.signal(Signal::KeyDown("ctrl+u".parse().unwrap()));
    assert!(obs.prevent_default);
    assert!(!obs.violation);
    assert_eq!(page.session.violation_count(), 1);
}

#[test]
fn clear_twice_equals_clear_once() {
    let mut page = Page::fresh(ExamLockConfig {
        delay_penalty_enabled: false,
        ..ExamLockConfig::default()
    });
    page.violate();
    page = page.reload();
    assert_eq!(page.session.state(), PenaltyState::HardLock);

    page.clear();
    let once = page.session.persistence().load();
    let log_once = page.session.violation_log();
    page.clear();

    assert_eq!(page.session.state(), PenaltyState::Clear);
    assert_eq!(page.session.persistence().load(), once);
    assert!(once.0.is_clean());
    assert!(once.1.is_empty());
    assert!(log_once.is_empty());
    assert!(page.session.persistence().session_tier().is_empty());
    assert!(page.session.persistence().durable_tier().is_empty());
}

#[test]
fn clear_lifts_hard_lock_and_resumes_detection() {
    let mut page = Page::fresh(ExamLockConfig {
        delay_penalty_enabled: false,
        ..ExamLockConfig::default()
    });
    page.violate();
    page.take_events();
    page.clear();
    assert_eq!(
        page.events(),
        &[Event::HardLockLifted, Event::EnteredClear]
    );
    page.violate();
    assert_eq!(page.session.violation_count(), 1);
}

#[test]
fn failing_storage_never_blocks_transitions() {
    let mut page = Page::open(
        delay_config(2, 2),
        FailingStore,
        FailingStore,
        VirtualHost::new(T0),
    );
    page.violate();
    assert_eq!(page.session.state(), PenaltyState::DelayPenalty);
    page.violate();
    page.wait_secs(2);
    assert_eq!(page.session.state(), PenaltyState::HardLock);
    assert_eq!(page.session.violation_count(), 2);
    page.clear();
    assert_eq!(page.session.state(), PenaltyState::Clear);
}

#[test]
fn stale_tick_cannot_resurrect_penalty() {
    let mut page = Page::fresh(delay_config(3, 5));
    page.violate();
    let stale = page.host.next_due(i64::MAX).expect("countdown scheduled");
    page.session.on_timer(stale, &mut page.host);
    page.wait_secs(5);
    assert_eq!(page.session.state(), PenaltyState::Clear);

    assert!(page.session.on_timer(stale, &mut page.host).is_empty());
    assert_eq!(page.session.state(), PenaltyState::Clear);
}
