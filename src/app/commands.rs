//! Inbound commands to the application core.
//!
//! The HTTP binding decodes requests into these; the
//! [`ControlSurface`](super::control::ControlSurface) executes them.

use crate::session::{StatusSnapshot, SubjectLabel};

/// Requests the outside world can make of the measurement session.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    /// Start a session, optionally labelled with the subject's name.
    Begin { label: Option<SubjectLabel> },

    /// Abandon the running session at its next check point.
    Cancel,

    /// Read-only status query.
    Status,
}

/// Reply to a [`ControlCommand`].
#[derive(Debug, Clone, PartialEq)]
pub enum ControlReply {
    Ack,
    Status(StatusSnapshot),
}
