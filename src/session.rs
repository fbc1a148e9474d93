//! The measurement session: the one piece of shared mutable state.
//!
//! Exactly one [`MeasurementSession`] exists for the life of the process.
//! The application service owns it and lends it to the state machine
//! (sole writer while a run is active) and to the control surface, which
//! only ever sees the narrow capability in
//! [`ControlSurface`](crate::app::control::ControlSurface): begin, cancel,
//! snapshot.  Everything here is single-threaded; no locks.

use core::fmt::Write;

use heapless::String;
use serde::Serialize;

use crate::classify::status_label;
use crate::config::STAGE_COUNT;
use crate::fsm::StateId;

/// Longest subject label kept, in bytes.
pub const LABEL_CAP: usize = 32;

/// Longest status text, in bytes.
pub const STATUS_CAP: usize = 32;

pub type SubjectLabel = String<LABEL_CAP>;
pub type StatusText = String<STATUS_CAP>;

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

/// Filtered result of one sampling stage.  `None` marks a metric the
/// plausibility filter rejected (the "absent" sentinel, 0 on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StageReading {
    pub heart_rate: Option<u16>,
    pub spo2: Option<u8>,
}

impl StageReading {
    pub const ABSENT: Self = Self {
        heart_rate: None,
        spo2: None,
    };

    pub fn is_absent(&self) -> bool {
        self.heart_rate.is_none() && self.spo2.is_none()
    }
}

/// Session averages.  Zero means "no valid data" for that category.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Averages {
    pub heart_rate: f32,
    pub spo2: f32,
}

impl Averages {
    /// Heart rate rounded to the nearest bpm, as published.
    pub fn heart_rate_bpm(&self) -> u16 {
        self.heart_rate.round() as u16
    }

    /// Saturation rounded to the nearest percent, as published.
    pub fn spo2_percent(&self) -> u16 {
        self.spo2.round() as u16
    }
}

/// Displays a metric, or `--` when the category has no value.
#[derive(Debug, Clone, Copy)]
pub struct MetricText<T>(pub Option<T>);

impl<T: core::fmt::Display> core::fmt::Display for MetricText<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.0 {
            Some(v) => core::fmt::Display::fmt(v, f),
            None => f.write_str("--"),
        }
    }
}

/// Why a session was abandoned before producing a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The control surface asked for it.
    Cancelled,
    /// IR intensity dropped below the finger threshold mid-stage.
    FingerLost,
    /// The sensor stopped delivering samples.
    SensorStalled,
}

impl AbortReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cancelled => "Cancelled",
            Self::FingerLost => "Finger removed",
            Self::SensorStalled => "Sensor timeout",
        }
    }
}

/// State of the session with the stage index folded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    AwaitingFinger,
    Greeting,
    Countdown,
    Sampling(u8),
    Averaging,
    ResultHold,
    Cancelled,
    SensorFault,
}

// ---------------------------------------------------------------------------
// Status snapshot (wire format of the status endpoint)
// ---------------------------------------------------------------------------

/// Point-in-time view of the session served by the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub heart_rate: u16,
    pub spo2: u16,
    pub hr_valid: u8,
    pub spo2_valid: u8,
    pub total_samples: u8,
    pub running: bool,
    pub status: &'static str,
    pub phase: &'static str,
    pub stage: u8,
    pub name: Option<SubjectLabel>,
    pub message: StatusText,
    pub sensor_fault: bool,
}

// ---------------------------------------------------------------------------
// MeasurementSession
// ---------------------------------------------------------------------------

pub struct MeasurementSession {
    state: StateId,
    stage: u8,
    subject_label: Option<SubjectLabel>,
    stage_readings: [StageReading; STAGE_COUNT],
    valid_hr_count: u8,
    valid_spo2_count: u8,
    averages: Averages,
    cancel_requested: bool,
    start_requested: bool,
    completed: bool,
    sensor_fault: bool,
    abort_reason: Option<AbortReason>,
    status_text: StatusText,
}

impl Default for MeasurementSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MeasurementSession {
    pub fn new() -> Self {
        let mut status_text = StatusText::new();
        let _ = status_text.push_str("Ready");
        Self {
            state: StateId::Idle,
            stage: 0,
            subject_label: None,
            stage_readings: [StageReading::ABSENT; STAGE_COUNT],
            valid_hr_count: 0,
            valid_spo2_count: 0,
            averages: Averages::default(),
            cancel_requested: false,
            start_requested: false,
            completed: false,
            sensor_fault: false,
            abort_reason: None,
            status_text,
        }
    }

    // ── Control-surface capability ────────────────────────────

    /// Start a new session unless one is already running.  Returns whether
    /// a session was actually started.
    pub fn begin(&mut self, label: Option<&str>) -> bool {
        if self.is_active() || self.sensor_fault {
            return false;
        }
        self.reset_run();
        self.subject_label = label.and_then(make_label);
        self.start_requested = true;
        true
    }

    /// Ask the state machine to abandon the running session at its next
    /// check point.  Harmless when idle.
    pub fn request_cancel(&mut self) {
        self.cancel_requested = true;
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let active = self.is_active();
        StatusSnapshot {
            heart_rate: self.averages.heart_rate_bpm(),
            spo2: self.averages.spo2_percent(),
            hr_valid: self.valid_hr_count,
            spo2_valid: self.valid_spo2_count,
            total_samples: STAGE_COUNT as u8,
            running: active,
            status: status_label(
                self.measured_heart_rate(),
                self.measured_spo2(),
                active,
                self.completed,
            )
            .as_str(),
            phase: self.state.name(),
            stage: self.stage,
            name: self.subject_label.clone(),
            message: self.status_text.clone(),
            sensor_fault: self.sensor_fault,
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// A session is active from the accepted begin until its result is on
    /// screen (or it was abandoned and the machine is back in Idle).
    pub fn is_active(&self) -> bool {
        self.start_requested
            || !matches!(
                self.state,
                StateId::Idle | StateId::ResultHold | StateId::SensorFault
            )
    }

    pub fn is_start_pending(&self) -> bool {
        self.start_requested
    }

    pub fn state(&self) -> StateId {
        self.state
    }

    pub fn phase(&self) -> SessionPhase {
        match self.state {
            StateId::Idle => SessionPhase::Idle,
            StateId::AwaitingFinger => SessionPhase::AwaitingFinger,
            StateId::Greeting => SessionPhase::Greeting,
            StateId::Countdown => SessionPhase::Countdown,
            StateId::Sampling => SessionPhase::Sampling(self.stage),
            StateId::Averaging => SessionPhase::Averaging,
            StateId::ResultHold => SessionPhase::ResultHold,
            StateId::Cancelled => SessionPhase::Cancelled,
            StateId::SensorFault => SessionPhase::SensorFault,
        }
    }

    pub fn stage(&self) -> usize {
        self.stage as usize
    }

    pub fn subject_label(&self) -> Option<&str> {
        self.subject_label.as_deref()
    }

    pub fn stage_readings(&self) -> &[StageReading; STAGE_COUNT] {
        &self.stage_readings
    }

    /// Averaged heart rate, `None` when no stage produced a valid one.
    pub fn measured_heart_rate(&self) -> Option<u16> {
        (self.valid_hr_count > 0).then(|| self.averages.heart_rate_bpm())
    }

    /// Averaged saturation, `None` when no stage produced a valid one.
    pub fn measured_spo2(&self) -> Option<u16> {
        (self.valid_spo2_count > 0).then(|| self.averages.spo2_percent())
    }

    pub fn valid_hr_count(&self) -> u8 {
        self.valid_hr_count
    }

    pub fn valid_spo2_count(&self) -> u8 {
        self.valid_spo2_count
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn is_sensor_fault(&self) -> bool {
        self.sensor_fault
    }

    pub fn abort_reason(&self) -> Option<AbortReason> {
        self.abort_reason
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Reading of the stage before the current one, if any has finished.
    pub fn last_stage_reading(&self) -> Option<StageReading> {
        self.stage
            .checked_sub(1)
            .map(|i| self.stage_readings[i as usize])
    }

    // ── State-machine mutators ────────────────────────────────

    pub(crate) fn set_state(&mut self, state: StateId) {
        self.state = state;
    }

    pub(crate) fn set_stage(&mut self, stage: usize) {
        self.stage = stage as u8;
    }

    pub(crate) fn take_start_request(&mut self) -> bool {
        core::mem::take(&mut self.start_requested)
    }

    pub(crate) fn take_cancel_request(&mut self) -> bool {
        core::mem::take(&mut self.cancel_requested)
    }

    /// Store a filtered stage result and count the metrics it carries.
    pub(crate) fn record_stage(&mut self, index: usize, reading: StageReading) {
        self.stage_readings[index] = reading;
        if reading.heart_rate.is_some() {
            self.valid_hr_count += 1;
        }
        if reading.spo2.is_some() {
            self.valid_spo2_count += 1;
        }
    }

    pub(crate) fn finish(&mut self, averages: Averages) {
        self.averages = averages;
        self.completed = true;
    }

    pub(crate) fn clear_label(&mut self) {
        self.subject_label = None;
    }

    pub(crate) fn set_abort_reason(&mut self, reason: AbortReason) {
        self.abort_reason = Some(reason);
    }

    /// Throw away everything the abandoned run produced.
    pub(crate) fn abort(&mut self, reason: AbortReason) {
        self.reset_run();
        self.subject_label = None;
        self.start_requested = false;
        self.abort_reason = Some(reason);
    }

    pub(crate) fn mark_sensor_fault(&mut self) {
        self.sensor_fault = true;
        self.start_requested = false;
    }

    pub(crate) fn set_status(&mut self, args: core::fmt::Arguments<'_>) {
        self.status_text.clear();
        // Overlong text is cut at the capacity; the display shows a prefix.
        let _ = self.status_text.write_fmt(args);
    }

    // ── Internal ──────────────────────────────────────────────

    fn reset_run(&mut self) {
        self.stage = 0;
        self.stage_readings = [StageReading::ABSENT; STAGE_COUNT];
        self.valid_hr_count = 0;
        self.valid_spo2_count = 0;
        self.averages = Averages::default();
        self.cancel_requested = false;
        self.completed = false;
        self.abort_reason = None;
    }
}

/// Trim and cap a subject label at [`LABEL_CAP`] bytes on a char boundary.
/// Blank labels count as "no label".
pub fn make_label(raw: &str) -> Option<SubjectLabel> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut label = SubjectLabel::new();
    for ch in trimmed.chars() {
        if label.push(ch).is_err() {
            break;
        }
    }
    Some(label)
}
