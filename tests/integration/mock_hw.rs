//! Mock adapters for integration tests.
//!
//! Time is fake and shared: it only moves when the service yields, so a
//! whole measurement session runs in microseconds.  The sensor produces a
//! sample every [`SAMPLE_PERIOD_MS`] of fake time, and control requests
//! are scripted against the same clock.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use pulseox::app::commands::{ControlCommand, ControlReply};
use pulseox::app::events::AppEvent;
use pulseox::app::ports::{
    ClockPort, ControlPort, Estimator, EventSink, Ports, Presenter, Screen, SensorPort,
};
use pulseox::app::service::AppService;
use pulseox::config::SystemConfig;
use pulseox::error::SensorError;
use pulseox::fsm::StateId;
use pulseox::sensors::{Estimate, RawSample};
use pulseox::session::make_label;

/// 25 Hz, matching the default sample rate.
pub const SAMPLE_PERIOD_MS: u64 = 40;
pub const FINGER_IR: u32 = 120_000;
pub const NO_FINGER_IR: u32 = 2_000;
const FIFO_DEPTH: u64 = 32;

pub type Now = Rc<Cell<u64>>;

// ── Clock ─────────────────────────────────────────────────────

pub struct FakeClock {
    now: Now,
    pub yields: u64,
}

impl ClockPort for FakeClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }

    fn yield_for(&mut self, ms: u32) {
        self.yields += 1;
        self.now.set(self.now.get() + u64::from(ms));
    }
}

// ── Sensor ────────────────────────────────────────────────────

pub struct FakeSensor {
    now: Now,
    pub present: bool,
    pub finger: Rc<Cell<bool>>,
    pub stalled: Rc<Cell<bool>>,
    pub bus_errors: Rc<Cell<u32>>,
    delivered: u64,
}

impl FakeSensor {
    fn level(&self) -> u32 {
        if self.finger.get() { FINGER_IR } else { NO_FINGER_IR }
    }
}

impl SensorPort for FakeSensor {
    fn probe(&mut self) -> Result<(), SensorError> {
        if self.present {
            Ok(())
        } else {
            Err(SensorError::NotFound)
        }
    }

    fn poll_sample(&mut self) -> Result<Option<RawSample>, SensorError> {
        if self.bus_errors.get() > 0 {
            self.bus_errors.set(self.bus_errors.get() - 1);
            return Err(SensorError::Bus);
        }
        let due = self.now.get() / SAMPLE_PERIOD_MS;
        if self.stalled.get() || self.delivered >= due {
            return Ok(None);
        }
        // Older samples fell out of the FIFO.
        self.delivered = self.delivered.max(due.saturating_sub(FIFO_DEPTH));
        self.delivered += 1;
        let ir = self.level();
        Ok(Some(RawSample { red: ir / 2, ir }))
    }

    fn ir_level(&mut self) -> Result<u32, SensorError> {
        Ok(self.level())
    }
}

// ── Estimator ─────────────────────────────────────────────────

/// Returns scripted estimates in order, then `fallback` forever.
pub struct ScriptedEstimator {
    pub script: VecDeque<Estimate>,
    pub fallback: Estimate,
    pub windows: Rc<RefCell<Vec<usize>>>,
}

impl Estimator for ScriptedEstimator {
    fn estimate(&mut self, ir: &[u32], red: &[u32]) -> Estimate {
        assert_eq!(ir.len(), red.len(), "channels must be paired");
        self.windows.borrow_mut().push(ir.len());
        self.script.pop_front().unwrap_or(self.fallback)
    }
}

pub fn estimate(hr: i32, spo2: i32) -> Estimate {
    Estimate {
        heart_rate: hr,
        hr_valid: true,
        spo2,
        spo2_valid: true,
    }
}

// ── Control surface ───────────────────────────────────────────

/// Requests released once fake time reaches their timestamp.
pub struct ScriptedControl {
    now: Now,
    pub queue: Rc<RefCell<VecDeque<(u64, ControlCommand)>>>,
    pub replies: Rc<RefCell<Vec<(u64, ControlReply)>>>,
}

impl ControlPort for ScriptedControl {
    fn serve_one(&mut self, handler: &mut dyn FnMut(ControlCommand) -> ControlReply) -> bool {
        let now = self.now.get();
        let next = {
            let mut q = self.queue.borrow_mut();
            match q.front() {
                Some((at, _)) if *at <= now => q.pop_front(),
                _ => None,
            }
        };
        let Some((_, cmd)) = next else {
            return false;
        };
        let reply = handler(cmd);
        self.replies.borrow_mut().push((now, reply));
        true
    }
}

// ── Presenter / events ────────────────────────────────────────

#[derive(Default)]
pub struct RecordingPresenter {
    pub screens: Rc<RefCell<Vec<String>>>,
}

impl Presenter for RecordingPresenter {
    fn present(&mut self, screen: &Screen<'_>, status: &str) {
        self.screens
            .borrow_mut()
            .push(format!("{screen:?} | {status}"));
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Rc<RefCell<Vec<AppEvent>>>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// An [`AppService`] wired to the mocks above.
pub struct Rig {
    pub app: AppService,
    pub now: Now,
    pub clock: FakeClock,
    pub sensor: FakeSensor,
    pub estimator: ScriptedEstimator,
    pub control: ScriptedControl,
    pub presenter: RecordingPresenter,
    pub sink: RecordingSink,
}

impl Rig {
    pub fn new(config: SystemConfig) -> Self {
        let now: Now = Rc::new(Cell::new(0));
        Self {
            app: AppService::new(config),
            clock: FakeClock {
                now: now.clone(),
                yields: 0,
            },
            sensor: FakeSensor {
                now: now.clone(),
                present: true,
                finger: Rc::new(Cell::new(true)),
                stalled: Rc::new(Cell::new(false)),
                bus_errors: Rc::new(Cell::new(0)),
                delivered: 0,
            },
            estimator: ScriptedEstimator {
                script: VecDeque::new(),
                fallback: estimate(72, 98),
                windows: Rc::new(RefCell::new(Vec::new())),
            },
            control: ScriptedControl {
                now: now.clone(),
                queue: Rc::new(RefCell::new(VecDeque::new())),
                replies: Rc::new(RefCell::new(Vec::new())),
            },
            presenter: RecordingPresenter::default(),
            sink: RecordingSink::default(),
            now,
        }
    }

    /// Default configuration, started.
    pub fn started() -> Self {
        let mut rig = Self::new(SystemConfig::default());
        rig.start();
        rig
    }

    pub fn start(&mut self) -> StateId {
        let mut io = Ports {
            sensor: &mut self.sensor,
            estimator: &mut self.estimator,
            presenter: &mut self.presenter,
            clock: &mut self.clock,
            control: &mut self.control,
            events: &mut self.sink,
        };
        self.app.start(&mut io)
    }

    pub fn tick(&mut self) {
        let mut io = Ports {
            sensor: &mut self.sensor,
            estimator: &mut self.estimator,
            presenter: &mut self.presenter,
            clock: &mut self.clock,
            control: &mut self.control,
            events: &mut self.sink,
        };
        self.app.tick(&mut io);
    }

    /// Tick until `done` holds; panics after `max_ticks`.
    pub fn run_until(&mut self, max_ticks: usize, mut done: impl FnMut(&Rig) -> bool) {
        for _ in 0..max_ticks {
            if done(self) {
                return;
            }
            self.tick();
        }
        assert!(
            done(self),
            "condition not reached within {max_ticks} ticks (state {:?})",
            self.app.state()
        );
    }

    pub fn run_until_state(&mut self, state: StateId) {
        self.run_until(200, |r| r.app.state() == state);
    }

    pub fn now(&self) -> u64 {
        self.now.get()
    }

    /// Queue a request for fake time `at_ms`.
    pub fn send_at(&self, at_ms: u64, cmd: ControlCommand) {
        self.control.queue.borrow_mut().push_back((at_ms, cmd));
    }

    /// Queue a request for right now.
    pub fn send(&self, cmd: ControlCommand) {
        self.send_at(self.now(), cmd);
    }

    pub fn begin(&self, name: Option<&str>) {
        self.send(ControlCommand::Begin {
            label: name.and_then(make_label),
        });
    }

    pub fn events(&self) -> Vec<AppEvent> {
        self.sink.events.borrow().clone()
    }

    pub fn windows(&self) -> Vec<usize> {
        self.estimator.windows.borrow().clone()
    }

    pub fn screens(&self) -> Vec<String> {
        self.presenter.screens.borrow().clone()
    }

    pub fn pending_requests(&self) -> usize {
        self.control.queue.borrow().len()
    }
}
