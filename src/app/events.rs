//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) and the state machine
//! emit these through the [`EventSink`](super::ports::EventSink) port.
//! Adapters on the other side decide what to do with them.

use crate::classify::Verdict;
use crate::fsm::StateId;
use crate::session::{AbortReason, StageReading};

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The application service has started (carries initial state).
    Started(StateId),

    /// The FSM transitioned between states.
    StateChanged { from: StateId, to: StateId },

    /// A begin request was picked up by the state machine.
    SessionStarted,

    /// One sampling stage finished.
    StageCompleted { stage: usize, reading: StageReading },

    /// All stages ran and the averages are in.
    /// A metric is `None` when no stage produced a valid value for it.
    SessionCompleted {
        heart_rate: Option<u16>,
        spo2: Option<u16>,
        verdict: Verdict,
    },

    /// The session was abandoned.
    SessionCancelled(AbortReason),

    /// The optical sensor did not answer at boot.
    SensorFault,
}
