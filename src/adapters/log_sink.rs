//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the logger (UART / USB-CDC on the device, stderr in the simulator).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::session::MetricText;

/// Adapter that logs every [`AppEvent`] to the console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(state) => {
                info!("START | initial_state={:?}", state);
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            AppEvent::SessionStarted => {
                info!("SESSION | started");
            }
            AppEvent::StageCompleted { stage, reading } => {
                info!(
                    "STAGE | #{} hr={} spo2={}",
                    stage,
                    MetricText(reading.heart_rate),
                    MetricText(reading.spo2)
                );
            }
            AppEvent::SessionCompleted {
                heart_rate,
                spo2,
                verdict,
            } => {
                info!(
                    "RESULT | hr={}bpm spo2={}% -> {}",
                    MetricText(*heart_rate),
                    MetricText(*spo2),
                    verdict
                );
            }
            AppEvent::SessionCancelled(reason) => {
                warn!("SESSION | cancelled: {}", reason.as_str());
            }
            AppEvent::SensorFault => {
                warn!("FAULT | optical sensor unavailable");
            }
        }
    }
}
