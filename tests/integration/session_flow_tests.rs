//! End-to-end measurement sessions through AppService → FSM → ports.
//!
//! Every test runs on fake time (see `mock_hw`), so the default protocol
//! timings (800 ms greeting, 3 s countdown, 750 samples at 25 Hz, 10 s
//! hold) are exercised as they are on the device.

use pulseox::app::commands::{ControlCommand, ControlReply};
use pulseox::app::events::AppEvent;
use pulseox::classify::{Classification, Verdict};
use pulseox::config::{STAGE_COUNT, SystemConfig};
use pulseox::fsm::StateId;
use pulseox::sensors::Estimate;
use pulseox::session::{AbortReason, SessionPhase, StageReading};

use crate::mock_hw::{Rig, estimate};

fn status(rig: &mut Rig) -> pulseox::session::StatusSnapshot {
    match rig.app.handle_command(ControlCommand::Status) {
        ControlReply::Status(s) => s,
        other => panic!("expected a status reply, got {other:?}"),
    }
}

fn cancelled_reasons(rig: &Rig) -> Vec<AbortReason> {
    rig.events()
        .into_iter()
        .filter_map(|e| match e {
            AppEvent::SessionCancelled(r) => Some(r),
            _ => None,
        })
        .collect()
}

fn assert_reset_after_abort(rig: &mut Rig) {
    let s = status(rig);
    assert_eq!(rig.app.state(), StateId::Idle);
    assert!(!s.running);
    assert_eq!(s.status, "idle");
    assert_eq!((s.hr_valid, s.spo2_valid), (0, 0));
    assert_eq!((s.heart_rate, s.spo2), (0, 0));
    assert_eq!(s.name, None);
    assert!(
        rig.app
            .session()
            .stage_readings()
            .iter()
            .all(StageReading::is_absent)
    );
    assert!(!rig.app.session().is_cancel_requested());
}

// ── Happy path ────────────────────────────────────────────────

#[test]
fn full_session_produces_normal_result() {
    let mut rig = Rig::started();
    assert_eq!(rig.app.state(), StateId::Idle);

    rig.begin(Some("Ana"));
    rig.run_until_state(StateId::ResultHold);

    let s = status(&mut rig);
    assert_eq!((s.heart_rate, s.spo2), (72, 98));
    assert_eq!((s.hr_valid, s.spo2_valid), (5, 5));
    assert_eq!(s.total_samples as usize, STAGE_COUNT);
    assert!(!s.running);
    assert_eq!(s.status, "Normal");
    assert_eq!(s.name.as_deref(), Some("Ana"));

    assert_eq!(rig.windows(), vec![100, 125, 150, 175, 200]);
    assert!(rig.events().contains(&AppEvent::SessionCompleted {
        heart_rate: Some(72),
        spo2: Some(98),
        verdict: Verdict::Classified(Classification::Normal),
    }));
}

#[test]
fn protocol_walks_every_state_in_order() {
    let mut rig = Rig::started();
    rig.begin(None);
    rig.run_until_state(StateId::ResultHold);

    let path: Vec<StateId> = rig
        .events()
        .into_iter()
        .filter_map(|e| match e {
            AppEvent::StateChanged { to, .. } => Some(to),
            _ => None,
        })
        .collect();
    assert_eq!(
        path,
        vec![
            StateId::AwaitingFinger,
            StateId::Greeting,
            StateId::Countdown,
            StateId::Sampling,
            StateId::Averaging,
            StateId::ResultHold,
        ]
    );
}

#[test]
fn countdown_shows_each_second() {
    let mut rig = Rig::started();
    rig.begin(None);
    rig.run_until_state(StateId::Sampling);

    let countdown: Vec<String> = rig
        .screens()
        .into_iter()
        .filter(|s| s.starts_with("Countdown"))
        .collect();
    assert_eq!(countdown.len(), 3);
    assert!(countdown[0].starts_with("Countdown(3)"));
    assert!(countdown[2].starts_with("Countdown(1)"));
}

#[test]
fn result_hold_returns_to_idle_and_keeps_result() {
    let mut rig = Rig::started();
    rig.begin(Some("Ana"));
    rig.run_until_state(StateId::ResultHold);
    let entered = rig.now();

    rig.run_until_state(StateId::Idle);
    assert!(rig.now() - entered >= u64::from(SystemConfig::default().result_hold_ms));

    let s = status(&mut rig);
    assert_eq!(s.status, "Normal");
    assert_eq!(s.name, None);
    assert_eq!(s.message.as_str(), "Done");
}

#[test]
fn implausible_values_are_dropped_per_metric() {
    let mut rig = Rig::started();
    rig.estimator.script.extend([
        estimate(72, 98),
        estimate(300, 97),
        estimate(74, 70),
        Estimate::INVALID,
        estimate(76, 96),
    ]);
    rig.begin(None);
    rig.run_until_state(StateId::ResultHold);

    let s = status(&mut rig);
    assert_eq!((s.hr_valid, s.spo2_valid), (3, 3));
    assert_eq!((s.heart_rate, s.spo2), (74, 97));

    let readings = rig.app.session().stage_readings();
    assert_eq!(readings[1].heart_rate, None);
    assert_eq!(readings[1].spo2, Some(97));
    assert_eq!(readings[2].spo2, None);
    assert!(readings[3].is_absent());
}

#[test]
fn low_saturation_is_a_warning() {
    let mut rig = Rig::started();
    rig.estimator.fallback = estimate(72, 92);
    rig.begin(None);
    rig.run_until_state(StateId::ResultHold);
    assert_eq!(status(&mut rig).status, "Warning");
}

#[test]
fn no_valid_data_averages_to_zero() {
    let mut rig = Rig::started();
    rig.estimator.fallback = Estimate::INVALID;
    rig.begin(None);
    rig.run_until_state(StateId::ResultHold);

    let s = status(&mut rig);
    assert_eq!((s.heart_rate, s.spo2), (0, 0));
    assert_eq!((s.hr_valid, s.spo2_valid), (0, 0));
}

#[test]
fn no_valid_data_is_reported_as_no_reading() {
    let mut rig = Rig::started();
    rig.estimator.fallback = Estimate::INVALID;
    rig.begin(None);
    rig.run_until_state(StateId::ResultHold);

    let s = status(&mut rig);
    assert_eq!(s.status, "No reading");
    assert_eq!(rig.app.session().status_text(), "No reading");
    assert!(rig.events().contains(&AppEvent::SessionCompleted {
        heart_rate: None,
        spo2: None,
        verdict: Verdict::NoReading,
    }));
    let last = rig.screens().pop().unwrap_or_default();
    assert!(last.contains("verdict: NoReading"), "{last}");
    assert!(!last.contains("Critical"), "{last}");
}

#[test]
fn one_missing_category_is_a_partial_reading() {
    let mut rig = Rig::started();
    rig.estimator.fallback = Estimate {
        spo2_valid: false,
        ..estimate(72, 98)
    };
    rig.begin(None);
    rig.run_until_state(StateId::ResultHold);

    let s = status(&mut rig);
    assert_eq!((s.heart_rate, s.spo2), (72, 0));
    assert_eq!(s.status, "Partial reading");
    assert!(rig.events().contains(&AppEvent::SessionCompleted {
        heart_rate: Some(72),
        spo2: None,
        verdict: Verdict::Partial,
    }));
}

// ── Cancellation ──────────────────────────────────────────────

#[test]
fn cancel_while_waiting_for_finger() {
    let mut rig = Rig::started();
    rig.sensor.finger.set(false);
    rig.begin(Some("Ana"));
    rig.run_until_state(StateId::AwaitingFinger);
    for _ in 0..5 {
        rig.tick();
    }
    assert_eq!(rig.app.state(), StateId::AwaitingFinger);

    rig.send(ControlCommand::Cancel);
    rig.run_until_state(StateId::Idle);
    assert_reset_after_abort(&mut rig);
    assert_eq!(cancelled_reasons(&rig), vec![AbortReason::Cancelled]);
}

#[test]
fn cancel_during_greeting() {
    let mut rig = Rig::started();
    rig.begin(None);
    rig.send_at(300, ControlCommand::Cancel);
    rig.run_until(50, |r| !cancelled_reasons(r).is_empty());

    assert_reset_after_abort(&mut rig);
    assert!(rig.now() < 1_000, "greeting must be cut short");
    assert!(rig.windows().is_empty());
}

#[test]
fn cancel_during_countdown() {
    let mut rig = Rig::started();
    rig.begin(None);
    rig.send_at(2_000, ControlCommand::Cancel);
    rig.run_until(50, |r| !cancelled_reasons(r).is_empty());

    assert_reset_after_abort(&mut rig);
    assert!(rig.now() < 2_100);
    assert!(rig.windows().is_empty());
}

#[test]
fn cancel_mid_sampling_discards_partial_run() {
    let mut rig = Rig::started();
    rig.begin(Some("Ana"));
    // Stage 0 ends near 6.6 s; stage 1 is running at 8 s.
    rig.send_at(8_000, ControlCommand::Cancel);
    rig.run_until(50, |r| !cancelled_reasons(r).is_empty());

    assert_eq!(rig.windows().len(), 1, "only stage 0 reached the estimator");
    assert_reset_after_abort(&mut rig);
    assert_eq!(rig.app.session().status_text(), "Cancelled");
}

#[test]
fn cancel_during_result_hold_keeps_result() {
    let mut rig = Rig::started();
    rig.begin(None);
    rig.run_until_state(StateId::ResultHold);
    let entered = rig.now();

    rig.send(ControlCommand::Cancel);
    rig.tick();
    assert_eq!(rig.app.state(), StateId::Idle);
    assert!(rig.now() - entered < 100);

    let s = status(&mut rig);
    assert_eq!(s.status, "Normal");
    assert_eq!((s.hr_valid, s.spo2_valid), (5, 5));
    assert!(!rig.app.session().is_cancel_requested());
    assert!(cancelled_reasons(&rig).is_empty());
}

#[test]
fn cancel_while_idle_is_harmless() {
    let mut rig = Rig::started();
    rig.send(ControlCommand::Cancel);
    rig.tick();
    rig.tick();
    assert_eq!(rig.app.state(), StateId::Idle);
    assert!(!rig.app.session().is_cancel_requested());

    rig.begin(None);
    rig.run_until_state(StateId::Greeting);
}

// ── Faults during a run ───────────────────────────────────────

#[test]
fn finger_lost_mid_stage_aborts() {
    let mut rig = Rig::started();
    rig.begin(None);
    rig.run_until(200, |r| r.app.session().phase() == SessionPhase::Sampling(1));

    rig.sensor.finger.set(false);
    rig.run_until_state(StateId::Idle);

    assert_eq!(cancelled_reasons(&rig), vec![AbortReason::FingerLost]);
    assert_reset_after_abort(&mut rig);
    assert_eq!(rig.app.session().status_text(), "Finger removed");
    let last = rig.screens().pop().unwrap_or_default();
    assert!(last.starts_with(r#"Idle("Finger removed")"#), "{last}");
}

#[test]
fn stalled_sensor_aborts_after_timeout() {
    let mut rig = Rig::started();
    rig.begin(None);
    rig.run_until_state(StateId::Sampling);

    rig.sensor.stalled.set(true);
    let stalled_at = rig.now();
    rig.run_until_state(StateId::Idle);

    assert_eq!(cancelled_reasons(&rig), vec![AbortReason::SensorStalled]);
    let waited = rig.now() - stalled_at;
    let timeout = u64::from(SystemConfig::default().sample_timeout_ms);
    assert!(waited >= timeout && waited < timeout + 100, "waited {waited} ms");
    assert_eq!(rig.app.session().status_text(), "Sensor timeout");
}

#[test]
fn bus_errors_only_delay_sampling() {
    let mut rig = Rig::started();
    rig.begin(None);
    rig.run_until_state(StateId::Sampling);
    rig.sensor.bus_errors.set(20);

    rig.run_until_state(StateId::ResultHold);
    assert_eq!(rig.windows(), vec![100, 125, 150, 175, 200]);
    assert!(cancelled_reasons(&rig).is_empty());
}

#[test]
fn missing_sensor_parks_in_fault_but_answers_status() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.sensor.present = false;
    assert_eq!(rig.start(), StateId::SensorFault);

    rig.begin(Some("Ana"));
    for _ in 0..10 {
        rig.tick();
    }
    assert_eq!(rig.app.state(), StateId::SensorFault);
    assert_eq!(rig.pending_requests(), 0);

    let s = status(&mut rig);
    assert!(s.sensor_fault);
    assert!(!s.running);
    assert_eq!(s.status, "idle");
    assert_eq!(s.message.as_str(), "Sensor error");
    assert!(rig.events().contains(&AppEvent::SensorFault));
}

// ── Begin semantics ───────────────────────────────────────────

#[test]
fn begin_while_running_changes_nothing() {
    let mut rig = Rig::started();
    rig.begin(Some("Ana"));
    rig.run_until(200, |r| r.app.session().phase() == SessionPhase::Sampling(2));

    rig.begin(Some("Bob"));
    rig.tick();
    assert_eq!(rig.pending_requests(), 0);
    assert_eq!(rig.app.session().subject_label(), Some("Ana"));
    assert_eq!(rig.app.session().phase(), SessionPhase::Sampling(3));
    assert_eq!(rig.app.session().valid_hr_count(), 3);

    let started = rig
        .events()
        .iter()
        .filter(|e| **e == AppEvent::SessionStarted)
        .count();
    assert_eq!(started, 1);
}

#[test]
fn begin_during_result_hold_starts_next_session() {
    let mut rig = Rig::started();
    rig.begin(Some("Ana"));
    rig.run_until_state(StateId::ResultHold);
    let entered = rig.now();

    rig.begin(Some("Bob"));
    rig.tick();
    assert_eq!(rig.app.state(), StateId::Idle);
    assert!(rig.now() - entered < 100);
    assert_eq!(rig.app.session().subject_label(), Some("Bob"));
    assert!(status(&mut rig).running);

    rig.run_until_state(StateId::AwaitingFinger);
    assert_eq!(rig.app.session().valid_hr_count(), 0);
}

#[test]
fn blank_label_counts_as_none() {
    let mut rig = Rig::started();
    rig.begin(Some("   "));
    rig.run_until_state(StateId::AwaitingFinger);
    assert_eq!(rig.app.session().subject_label(), None);
}

// ── Responsiveness ────────────────────────────────────────────

#[test]
fn status_is_served_within_one_tick_throughout_a_session() {
    let mut rig = Rig::started();
    rig.begin(None);
    let asked: Vec<u64> = (250..40_000).step_by(250).collect();
    for &at in &asked {
        rig.send_at(at, ControlCommand::Status);
    }
    rig.run_until(400, |r| r.pending_requests() == 0);

    let replies = rig.control.replies.borrow().clone();
    // First reply is the begin acknowledgement.
    let served: Vec<u64> = replies.iter().skip(1).map(|(t, _)| *t).collect();
    assert_eq!(served.len(), asked.len());
    let tick = u64::from(SystemConfig::default().scheduler_tick_ms);
    for (at, served) in asked.iter().zip(&served) {
        assert!(
            served - at <= tick,
            "status asked at {at} ms answered at {served} ms"
        );
    }

    let measuring = replies
        .iter()
        .filter(|(_, r)| matches!(r, ControlReply::Status(s) if s.running && s.status == "measuring"))
        .count();
    assert!(measuring > 50);
    assert!(rig.app.scheduler_stats().services > 50);
}
