//! Concrete state handler functions and table builder.
//!
//! Each state is defined by plain `fn` pointers: no closures, no dynamic
//! dispatch, no heap.  Waits inside a handler go through the cooperative
//! scheduler, so the control surface stays serviced throughout.
//!
//! ```text
//!  IDLE ──[begin]──▶ AWAITING_FINGER ──[IR ≥ threshold]──▶ GREETING
//!    ▲                                                        │ 800 ms
//!    │                                                        ▼
//!    │                                                    COUNTDOWN
//!    │                                                        │ 3 × 1 s
//!    │                                                        ▼
//!    │                                            ┌──▶ SAMPLING(i) ──┐
//!    │                                            └──── i < S-1 ─────┘
//!    │                                                        │ i = S-1
//!    │                                                        ▼
//!    └──────────[hold elapsed]──── RESULT_HOLD ◀──────── AVERAGING
//!
//!  Any running state ──[cancel / finger lost / stall]──▶ CANCELLED ──▶ IDLE
//!  Boot ──[probe failed]──▶ SENSOR_FAULT (terminal)
//! ```

use log::{debug, error, info, warn};

use super::context::FsmContext;
use super::{StateDescriptor, StateId};
use crate::app::events::AppEvent;
use crate::app::ports::Screen;
use crate::classify::verdict;
use crate::config::STAGE_COUNT;
use crate::scheduler::{Step, Suspended, dwell, suspend_until};
use crate::sensors::finger_present;
use crate::session::AbortReason;
use crate::stage::{average, collect_window, filter_estimate};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0: Idle
        StateDescriptor {
            id: StateId::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
            transient: false,
        },
        // Index 1: AwaitingFinger
        StateDescriptor {
            id: StateId::AwaitingFinger,
            name: "AwaitingFinger",
            on_enter: Some(awaiting_finger_enter),
            on_exit: None,
            on_update: awaiting_finger_update,
            transient: false,
        },
        // Index 2: Greeting
        StateDescriptor {
            id: StateId::Greeting,
            name: "Greeting",
            on_enter: Some(greeting_enter),
            on_exit: None,
            on_update: greeting_update,
            transient: false,
        },
        // Index 3: Countdown
        StateDescriptor {
            id: StateId::Countdown,
            name: "Countdown",
            on_enter: None,
            on_exit: None,
            on_update: countdown_update,
            transient: false,
        },
        // Index 4: Sampling
        StateDescriptor {
            id: StateId::Sampling,
            name: "Sampling",
            on_enter: Some(sampling_enter),
            on_exit: None,
            on_update: sampling_update,
            transient: false,
        },
        // Index 5: Averaging
        StateDescriptor {
            id: StateId::Averaging,
            name: "Averaging",
            on_enter: None,
            on_exit: None,
            on_update: averaging_update,
            transient: false,
        },
        // Index 6: ResultHold
        StateDescriptor {
            id: StateId::ResultHold,
            name: "ResultHold",
            on_enter: Some(result_hold_enter),
            on_exit: Some(result_hold_exit),
            on_update: result_hold_update,
            transient: false,
        },
        // Index 7: Cancelled
        StateDescriptor {
            id: StateId::Cancelled,
            name: "Cancelled",
            on_enter: Some(cancelled_enter),
            on_exit: None,
            on_update: cancelled_update,
            transient: true,
        },
        // Index 8: SensorFault
        StateDescriptor {
            id: StateId::SensorFault,
            name: "SensorFault",
            on_enter: Some(sensor_fault_enter),
            on_exit: None,
            on_update: sensor_fault_update,
            transient: false,
        },
    ]
}

/// Record why the run is being abandoned and head for `Cancelled`.
fn abandon(ctx: &mut FsmContext<'_, '_>, reason: AbortReason) -> Option<StateId> {
    ctx.session.set_abort_reason(reason);
    Some(StateId::Cancelled)
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE state
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut FsmContext<'_, '_>) {
    match (ctx.session.abort_reason(), ctx.session.is_completed()) {
        (Some(reason), _) => ctx.session.set_status(format_args!("{}", reason.as_str())),
        (None, true) => ctx.session.set_status(format_args!("Done")),
        (None, false) => ctx.session.set_status(format_args!("Ready")),
    }
    ctx.present(|s| Screen::Idle(s.status_text()));
}

fn idle_update(ctx: &mut FsmContext<'_, '_>) -> Option<StateId> {
    if ctx.session.take_start_request() {
        info!(
            "IDLE: session starting (label={:?})",
            ctx.session.subject_label()
        );
        ctx.emit(AppEvent::SessionStarted);
        return Some(StateId::AwaitingFinger);
    }

    if ctx.session.take_cancel_request() {
        debug!("IDLE: dropping stale cancel request");
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  AWAITING_FINGER: polled every tick, no debounce
// ═══════════════════════════════════════════════════════════════════════════

fn awaiting_finger_enter(ctx: &mut FsmContext<'_, '_>) {
    ctx.session.set_status(format_args!("Place finger"));
    ctx.present(|s| Screen::AwaitingFinger(s.subject_label()));
}

fn awaiting_finger_update(ctx: &mut FsmContext<'_, '_>) -> Option<StateId> {
    if ctx.session.is_cancel_requested() {
        return abandon(ctx, AbortReason::Cancelled);
    }

    let ir = match ctx.io.sensor.ir_level() {
        Ok(ir) => ir,
        Err(e) => {
            warn!("AWAITING_FINGER: IR read failed: {e}");
            return None;
        }
    };
    if finger_present(ir, ctx.config.finger_ir_threshold) {
        info!("AWAITING_FINGER: finger detected (ir={ir})");
        return Some(StateId::Greeting);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  GREETING: fixed cooperative dwell
// ═══════════════════════════════════════════════════════════════════════════

fn greeting_enter(ctx: &mut FsmContext<'_, '_>) {
    ctx.session.set_status(format_args!("Hello"));
    ctx.present(|s| Screen::Greeting(s.subject_label()));
}

fn greeting_update(ctx: &mut FsmContext<'_, '_>) -> Option<StateId> {
    let ms = ctx.config.greeting_ms;
    match dwell(ctx, ms) {
        Ok(()) => Some(StateId::Countdown),
        Err(_) => abandon(ctx, AbortReason::Cancelled),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  COUNTDOWN: one-second steps, finger not re-checked
// ═══════════════════════════════════════════════════════════════════════════

fn countdown_update(ctx: &mut FsmContext<'_, '_>) -> Option<StateId> {
    for remaining in (1..=ctx.config.countdown_secs).rev() {
        ctx.session.set_status(format_args!("Starting in {remaining}"));
        ctx.present(|_| Screen::Countdown(remaining));
        if dwell(ctx, 1_000).is_err() {
            return abandon(ctx, AbortReason::Cancelled);
        }
    }
    ctx.session.set_stage(0);
    Some(StateId::Sampling)
}

// ═══════════════════════════════════════════════════════════════════════════
//  SAMPLING: one stage per tick, stays here until the last stage
// ═══════════════════════════════════════════════════════════════════════════

fn sampling_enter(ctx: &mut FsmContext<'_, '_>) {
    info!(
        "SAMPLING: {} stages, windows {:?}",
        STAGE_COUNT, ctx.config.stage_windows
    );
}

fn sampling_update(ctx: &mut FsmContext<'_, '_>) -> Option<StateId> {
    let stage = ctx.session.stage();
    let window = ctx.config.stage_window(stage);

    ctx.session
        .set_status(format_args!("Stage {}/{}", stage + 1, STAGE_COUNT));
    ctx.present(|s| Screen::Sampling {
        stage,
        total: STAGE_COUNT,
        last: s.last_stage_reading(),
    });

    let threshold = ctx.config.finger_ir_threshold;
    let timeout = ctx.config.sample_timeout_ms;
    let samples = match collect_window(ctx, window, threshold, timeout) {
        Ok(w) => w,
        Err(reason) => {
            warn!("SAMPLING: stage {stage} aborted: {}", reason.as_str());
            return abandon(ctx, reason);
        }
    };

    let estimate = ctx.io.estimator.estimate(&samples.ir, &samples.red);
    let reading = filter_estimate(&estimate);
    ctx.session.record_stage(stage, reading);
    info!(
        "SAMPLING: stage {} done ({} samples) hr={:?} spo2={:?}",
        stage,
        samples.len(),
        reading.heart_rate,
        reading.spo2
    );
    ctx.emit(AppEvent::StageCompleted { stage, reading });

    if stage + 1 < STAGE_COUNT {
        ctx.session.set_stage(stage + 1);
        None
    } else {
        Some(StateId::Averaging)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  AVERAGING
// ═══════════════════════════════════════════════════════════════════════════

fn averaging_update(ctx: &mut FsmContext<'_, '_>) -> Option<StateId> {
    let averages = average(ctx.session.stage_readings());
    ctx.session.finish(averages);
    info!(
        "AVERAGING: hr={:.1} ({} valid) spo2={:.1} ({} valid)",
        averages.heart_rate,
        ctx.session.valid_hr_count(),
        averages.spo2,
        ctx.session.valid_spo2_count()
    );
    Some(StateId::ResultHold)
}

// ═══════════════════════════════════════════════════════════════════════════
//  RESULT_HOLD: result on screen, ends early on cancel or a new begin
// ═══════════════════════════════════════════════════════════════════════════

fn result_hold_enter(ctx: &mut FsmContext<'_, '_>) {
    let heart_rate = ctx.session.measured_heart_rate();
    let spo2 = ctx.session.measured_spo2();
    let verdict = verdict(heart_rate, spo2);

    ctx.session.set_status(format_args!("{verdict}"));
    ctx.present(|_| Screen::Result {
        heart_rate,
        spo2,
        verdict,
    });
    ctx.emit(AppEvent::SessionCompleted {
        heart_rate,
        spo2,
        verdict,
    });
}

fn result_hold_exit(ctx: &mut FsmContext<'_, '_>) {
    // A begin accepted during the hold already carries the next label.
    if !ctx.session.is_start_pending() {
        ctx.session.clear_label();
    }
}

fn result_hold_update(ctx: &mut FsmContext<'_, '_>) -> Option<StateId> {
    let hold = ctx.config.result_hold_ms;
    let ended = suspend_until(ctx, Some(hold), |c| {
        if c.session.is_start_pending() {
            Step::Ready(())
        } else {
            Step::Pending
        }
    });
    match ended {
        Suspended::TimedOut => {}
        Suspended::Done(()) => debug!("RESULT_HOLD: new session requested"),
        Suspended::Cancelled => {
            debug!("RESULT_HOLD: cancelled, result kept");
            ctx.session.take_cancel_request();
        }
    }
    Some(StateId::Idle)
}

// ═══════════════════════════════════════════════════════════════════════════
//  CANCELLED: transient, wipes the session
// ═══════════════════════════════════════════════════════════════════════════

fn cancelled_enter(ctx: &mut FsmContext<'_, '_>) {
    let reason = ctx.session.abort_reason().unwrap_or(AbortReason::Cancelled);
    ctx.session.abort(reason);
    ctx.session.set_status(format_args!("{}", reason.as_str()));
    warn!("CANCELLED: {}", reason.as_str());
    ctx.emit(AppEvent::SessionCancelled(reason));
}

fn cancelled_update(_ctx: &mut FsmContext<'_, '_>) -> Option<StateId> {
    Some(StateId::Idle)
}

// ═══════════════════════════════════════════════════════════════════════════
//  SENSOR_FAULT: terminal
// ═══════════════════════════════════════════════════════════════════════════

fn sensor_fault_enter(ctx: &mut FsmContext<'_, '_>) {
    ctx.session.mark_sensor_fault();
    ctx.session.set_status(format_args!("Sensor error"));
    error!("SENSOR_FAULT: optical sensor not available, measurements disabled");
    ctx.emit(AppEvent::SensorFault);
}

fn sensor_fault_update(ctx: &mut FsmContext<'_, '_>) -> Option<StateId> {
    ctx.present(|_| Screen::SensorFault);
    ctx.session.take_cancel_request();
    None
}
