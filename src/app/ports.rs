//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (optical sensor, estimator, display, clock, HTTP
//! server, event sinks) implement these traits.  The
//! [`AppService`](super::service::AppService) receives them bundled in
//! [`Ports`], so the domain core never touches hardware directly.

use crate::classify::Verdict;
use crate::error::SensorError;
use crate::session::StageReading;
use crate::sensors::{Estimate, RawSample};

use super::commands::{ControlCommand, ControlReply};
use super::events::AppEvent;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// The optical front end.
pub trait SensorPort {
    /// Check the sensor is present and configure it for measurement.
    fn probe(&mut self) -> Result<(), SensorError>;

    /// Next paired sample if one is ready.  Never blocks.
    fn poll_sample(&mut self) -> Result<Option<RawSample>, SensorError>;

    /// Current IR intensity, for finger-presence checks between stages.
    fn ir_level(&mut self) -> Result<u32, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Estimator port
// ───────────────────────────────────────────────────────────────

/// Opaque heart-rate / saturation algorithm.  Called once per stage with
/// the full window; `ir` and `red` have equal length.
pub trait Estimator {
    fn estimate(&mut self, ir: &[u32], red: &[u32]) -> Estimate;
}

// ───────────────────────────────────────────────────────────────
// Presenter port (domain → display)
// ───────────────────────────────────────────────────────────────

/// What the local display should show.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Screen<'a> {
    /// Carries the last outcome ("Ready", "Done", an abort reason).
    Idle(&'a str),
    AwaitingFinger(Option<&'a str>),
    Greeting(Option<&'a str>),
    Countdown(u8),
    Sampling {
        stage: usize,
        total: usize,
        last: Option<StageReading>,
    },
    /// `None` for a category with no valid stage.
    Result {
        heart_rate: Option<u16>,
        spo2: Option<u16>,
        verdict: Verdict,
    },
    SensorFault,
}

pub trait Presenter {
    fn present(&mut self, screen: &Screen<'_>, status: &str);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

pub trait ClockPort {
    /// Monotonic milliseconds since boot.
    fn now_ms(&self) -> u64;

    /// Hand the CPU to the rest of the system for `ms` milliseconds.
    /// Implementations feed the task watchdog here.
    fn yield_for(&mut self, ms: u32);
}

// ───────────────────────────────────────────────────────────────
// Control port (driving adapter: network → domain)
// ───────────────────────────────────────────────────────────────

/// Transport for the control/status surface.
pub trait ControlPort {
    /// Serve at most one pending request through `handler`.  Returns
    /// whether a request was served.  Never blocks waiting for a client.
    fn serve_one(&mut self, handler: &mut dyn FnMut(ControlCommand) -> ControlReply) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`]s through this port.
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Port bundle
// ───────────────────────────────────────────────────────────────

/// Every adapter the service drives, borrowed for one call.
pub struct Ports<'a> {
    pub sensor: &'a mut dyn SensorPort,
    pub estimator: &'a mut dyn Estimator,
    pub presenter: &'a mut dyn Presenter,
    pub clock: &'a mut dyn ClockPort,
    pub control: &'a mut dyn ControlPort,
    pub events: &'a mut dyn EventSink,
}
