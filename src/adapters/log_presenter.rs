//! Text presenter.
//!
//! Renders each [`Screen`] as two short lines, the way a 16x2 character
//! display would show it, and logs them with the status text whenever
//! either changes.  The
//! device build has no panel wired up yet, so the serial console is the
//! display on both targets.

use core::fmt::Write;

use heapless::String;
use log::info;

use crate::app::ports::{Presenter, Screen};
use crate::session::{MetricText, StageReading, StatusText};

/// Characters per rendered line.
pub const LINE_WIDTH: usize = 16;

pub type Line = String<LINE_WIDTH>;

/// Copy `text`, cutting at capacity on a char boundary.
fn clip<const N: usize>(text: &str) -> String<N> {
    let mut out = String::new();
    for c in text.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

fn line(text: &str) -> Line {
    clip(text)
}

/// Formatted line; output past [`LINE_WIDTH`] is dropped.
fn line_fmt(args: core::fmt::Arguments<'_>) -> Line {
    let mut buf: String<64> = String::new();
    let _ = buf.write_fmt(args);
    line(&buf)
}

fn stage_line(last: Option<StageReading>) -> Line {
    match last {
        Some(r) => line_fmt(format_args!(
            "HR {} SpO2 {}",
            MetricText(r.heart_rate),
            MetricText(r.spo2)
        )),
        None => line("Hold still"),
    }
}

/// The two display lines for `screen`.
pub fn render(screen: &Screen<'_>) -> [Line; 2] {
    match *screen {
        Screen::Idle(status) => [line("Pulse oximeter"), line(status)],
        Screen::AwaitingFinger(name) => [
            line(name.unwrap_or("New reading")),
            line("Place finger"),
        ],
        Screen::Greeting(Some(name)) => [line_fmt(format_args!("Hello {name}")), line("Get ready")],
        Screen::Greeting(None) => [line("Hello"), line("Get ready")],
        Screen::Countdown(secs) => [line("Starting in"), line_fmt(format_args!("{secs}"))],
        Screen::Sampling { stage, total, last } => [
            line_fmt(format_args!("Measuring {}/{}", stage + 1, total)),
            stage_line(last),
        ],
        Screen::Result {
            heart_rate,
            spo2,
            verdict,
        } => [
            line_fmt(format_args!(
                "HR {} SpO2 {}%",
                MetricText(heart_rate),
                MetricText(spo2)
            )),
            line(verdict.as_str()),
        ],
        Screen::SensorFault => [line("Sensor error"), line("Check wiring")],
    }
}

/// [`Presenter`] that writes the rendered lines to the log.
#[derive(Default)]
pub struct LogPresenter {
    shown: Option<[Line; 2]>,
    status: StatusText,
    renders: u64,
}

impl LogPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// What is currently "on screen".
    pub fn shown(&self) -> Option<&[Line; 2]> {
        self.shown.as_ref()
    }

    /// Status text logged with the current screen.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// How many times the screen or the status actually changed.
    pub fn renders(&self) -> u64 {
        self.renders
    }
}

impl Presenter for LogPresenter {
    fn present(&mut self, screen: &Screen<'_>, status: &str) {
        let lines = render(screen);
        let status: StatusText = clip(status);
        if self.shown.as_ref() == Some(&lines) && self.status == status {
            return;
        }
        info!("DISPLAY | {:<16} | {:<16} | {}", lines[0], lines[1], status);
        self.shown = Some(lines);
        self.status = status;
        self.renders += 1;
    }
}
