//! Control/status surface handler.
//!
//! Transport-agnostic: the HTTP adapter decodes a request into a
//! [`ControlCommand`], and this handler runs it against the session.  It
//! only sees the session through [`SessionControl`], so it can start,
//! cancel and observe, never drive a stage.

use log::{debug, info};

use crate::session::{MeasurementSession, StatusSnapshot};

use super::commands::{ControlCommand, ControlReply};

/// The slice of session behaviour the control surface may use.
pub trait SessionControl {
    /// Returns whether a session actually started.
    fn begin(&mut self, label: Option<&str>) -> bool;
    fn request_cancel(&mut self);
    fn snapshot(&self) -> StatusSnapshot;
}

impl SessionControl for MeasurementSession {
    fn begin(&mut self, label: Option<&str>) -> bool {
        MeasurementSession::begin(self, label)
    }

    fn request_cancel(&mut self) {
        MeasurementSession::request_cancel(self);
    }

    fn snapshot(&self) -> StatusSnapshot {
        MeasurementSession::snapshot(self)
    }
}

pub struct ControlSurface<'a, S: SessionControl + ?Sized = MeasurementSession> {
    session: &'a mut S,
}

impl<'a, S: SessionControl + ?Sized> ControlSurface<'a, S> {
    pub fn new(session: &'a mut S) -> Self {
        Self { session }
    }

    pub fn handle(&mut self, cmd: ControlCommand) -> ControlReply {
        match cmd {
            ControlCommand::Begin { label } => {
                if self.session.begin(label.as_deref()) {
                    info!("control: begin accepted (label={:?})", label.as_deref());
                } else {
                    debug!("control: begin ignored, session busy or sensor faulted");
                }
                ControlReply::Ack
            }
            ControlCommand::Cancel => {
                info!("control: cancel requested");
                self.session.request_cancel();
                ControlReply::Ack
            }
            ControlCommand::Status => ControlReply::Status(self.session.snapshot()),
        }
    }
}
