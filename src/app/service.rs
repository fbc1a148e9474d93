//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the FSM, the measurement session and the
//! cooperative scheduler.  It exposes a clean, hardware-agnostic API.
//! All I/O flows through the [`Ports`] bundle injected at call sites,
//! making the entire service testable with mock adapters.
//!
//! ```text
//!  SensorPort ───▶ ┌──────────────────────────┐ ──▶ Presenter
//!  Estimator  ◀──▶ │        AppService        │ ──▶ EventSink
//!  ControlPort ◀──▶│ FSM · Session · Scheduler│ ◀── ClockPort
//!                  └──────────────────────────┘
//! ```
//!
//! One [`tick`](AppService::tick) is: service at most one control request,
//! advance the FSM, yield one scheduler tick.

use log::{error, info};

use crate::config::SystemConfig;
use crate::fsm::context::FsmContext;
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::scheduler::{Cooperate, CooperativeScheduler, SchedulerStats};
use crate::session::MeasurementSession;

use super::commands::{ControlCommand, ControlReply};
use super::control::ControlSurface;
use super::events::AppEvent;
use super::ports::Ports;

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    fsm: Fsm,
    session: MeasurementSession,
    config: SystemConfig,
    sched: CooperativeScheduler,
}

impl AppService {
    /// Construct the service from an already validated configuration.
    ///
    /// Does **not** start the FSM: call [`start`](Self::start) next.
    pub fn new(config: SystemConfig) -> Self {
        let sched = CooperativeScheduler::new(config.scheduler_tick_ms);
        Self {
            fsm: Fsm::new(build_state_table(), StateId::Idle),
            session: MeasurementSession::new(),
            config,
            sched,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Probe the sensor and start the FSM.  A missing sensor parks the
    /// machine in `SensorFault`; the control surface keeps answering.
    pub fn start(&mut self, io: &mut Ports<'_>) -> StateId {
        let probe = io.sensor.probe();

        let mut ctx = FsmContext::new(&mut self.session, &self.config, &mut self.sched, io);
        self.fsm.start(&mut ctx);
        if let Err(e) = probe {
            error!("sensor probe failed: {e}");
            self.fsm.force_transition(StateId::SensorFault, &mut ctx);
        }

        let state = self.fsm.current_state();
        ctx.emit(AppEvent::Started(state));
        info!("AppService started in {:?}", state);
        state
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one cooperative cycle: control request → FSM → yield.
    pub fn tick(&mut self, io: &mut Ports<'_>) {
        let mut ctx = FsmContext::new(&mut self.session, &self.config, &mut self.sched, io);
        ctx.service_pending();
        self.fsm.tick(&mut ctx);
        ctx.yield_for(self.config.scheduler_tick_ms);
    }

    /// Drive the service forever.
    pub fn run(&mut self, io: &mut Ports<'_>) -> ! {
        loop {
            self.tick(io);
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Execute a control command directly, bypassing the transport.
    pub fn handle_command(&mut self, cmd: ControlCommand) -> ControlReply {
        ControlSurface::new(&mut self.session).handle(cmd)
    }

    // ── Queries ───────────────────────────────────────────────

    /// Current FSM state.
    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn session(&self) -> &MeasurementSession {
        &self.session
    }

    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.sched.stats()
    }
}
