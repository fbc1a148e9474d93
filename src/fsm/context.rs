//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the single struct that state handlers read from and
//! write to: the measurement session, configuration, the cooperative
//! scheduler and the adapters.  Think of it as the "blackboard" in a
//! blackboard architecture.  It is rebuilt for every service call and
//! only borrows what it holds.

use log::warn;

use crate::app::commands::ControlCommand;
use crate::app::control::ControlSurface;
use crate::app::events::AppEvent;
use crate::app::ports::{Ports, Screen};
use crate::config::SystemConfig;
use crate::scheduler::{Cooperate, CooperativeScheduler};
use crate::sensors::RawSample;
use crate::session::MeasurementSession;
use crate::stage::Acquire;

/// The shared context passed to every state handler function.
pub struct FsmContext<'a, 'p> {
    // -- Domain --
    pub session: &'a mut MeasurementSession,
    pub config: &'a SystemConfig,
    pub sched: &'a mut CooperativeScheduler,

    // -- Adapters --
    pub io: &'a mut Ports<'p>,
}

impl<'a, 'p> FsmContext<'a, 'p> {
    pub fn new(
        session: &'a mut MeasurementSession,
        config: &'a SystemConfig,
        sched: &'a mut CooperativeScheduler,
        io: &'a mut Ports<'p>,
    ) -> Self {
        Self {
            session,
            config,
            sched,
            io,
        }
    }

    /// Show a screen built from the session, with the current status text.
    pub fn present<F>(&mut self, build: F)
    where
        F: for<'s> FnOnce(&'s MeasurementSession) -> Screen<'s>,
    {
        let session = &*self.session;
        let screen = build(session);
        self.io.presenter.present(&screen, session.status_text());
    }

    pub fn emit(&mut self, event: AppEvent) {
        self.io.events.emit(&event);
    }
}

impl Cooperate for FsmContext<'_, '_> {
    fn service_pending(&mut self) -> bool {
        let session = &mut *self.session;
        self.io
            .control
            .serve_one(&mut |cmd: ControlCommand| ControlSurface::new(&mut *session).handle(cmd))
    }

    fn cancel_requested(&self) -> bool {
        self.session.is_cancel_requested()
    }

    fn now_ms(&self) -> u64 {
        self.io.clock.now_ms()
    }

    fn yield_for(&mut self, ms: u32) {
        self.io.clock.yield_for(ms);
    }

    fn scheduler(&mut self) -> &mut CooperativeScheduler {
        &mut *self.sched
    }
}

impl Acquire for FsmContext<'_, '_> {
    fn poll_sample(&mut self) -> Option<RawSample> {
        match self.io.sensor.poll_sample() {
            Ok(sample) => sample,
            Err(e) => {
                warn!("sensor poll failed: {e}");
                None
            }
        }
    }
}
