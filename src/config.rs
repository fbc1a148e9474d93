//! System configuration parameters
//!
//! All tunable parameters for the measurement firmware.  Defaults match
//! the reference measurement protocol; the simulator can load overrides
//! from a JSON file.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of sampling stages in one measurement session.
pub const STAGE_COUNT: usize = 5;

/// Largest window (in samples) any stage may request.
pub const MAX_STAGE_WINDOW: usize = 200;

/// Longest scheduler tick allowed; keeps the control surface responsive.
pub const MAX_SCHEDULER_TICK_MS: u32 = 50;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    // --- Sensor ---
    /// Raw IR intensity at or above which a finger counts as present
    pub finger_ir_threshold: u32,
    /// Effective sample rate delivered by the sensor FIFO (Hz)
    pub sample_rate_hz: u16,
    /// 7-bit I2C address of the optical front end
    pub sensor_i2c_address: u8,

    // --- Protocol ---
    /// Greeting dwell before the countdown (milliseconds)
    pub greeting_ms: u32,
    /// Countdown length (one-second steps)
    pub countdown_secs: u8,
    /// How long the final result stays on screen (milliseconds)
    pub result_hold_ms: u32,
    /// Samples per stage window, non-decreasing
    pub stage_windows: [u16; STAGE_COUNT],

    // --- Scheduling ---
    /// Cooperative yield between control-surface checks (milliseconds)
    pub scheduler_tick_ms: u32,
    /// Give up on a stage when no sample arrives for this long (0 = never)
    pub sample_timeout_ms: u32,

    // --- Network ---
    /// TCP port of the HTTP control surface
    pub http_port: u16,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Sensor
            finger_ir_threshold: 50_000,
            sample_rate_hz: 25, // 100 sps, 4-sample FIFO averaging
            sensor_i2c_address: 0x57,

            // Protocol
            greeting_ms: 800,
            countdown_secs: 3,
            result_hold_ms: 10_000,
            stage_windows: [100, 125, 150, 175, 200],

            // Scheduling
            scheduler_tick_ms: 10,
            sample_timeout_ms: 1_000,

            // Network
            http_port: 80,
        }
    }
}

impl SystemConfig {
    /// Reject configurations the state machine cannot run safely.
    pub fn validate(&self) -> Result<()> {
        if self.scheduler_tick_ms == 0 || self.scheduler_tick_ms > MAX_SCHEDULER_TICK_MS {
            return Err(Error::Config("scheduler_tick_ms must be 1..=50"));
        }
        if self.sample_rate_hz == 0 {
            return Err(Error::Config("sample_rate_hz must be non-zero"));
        }
        if self.finger_ir_threshold == 0 {
            return Err(Error::Config("finger_ir_threshold must be non-zero"));
        }
        if self.stage_windows.iter().any(|&w| w == 0) {
            return Err(Error::Config("stage windows must be non-empty"));
        }
        if self
            .stage_windows
            .iter()
            .any(|&w| w as usize > MAX_STAGE_WINDOW)
        {
            return Err(Error::Config("stage window exceeds MAX_STAGE_WINDOW"));
        }
        if self.stage_windows.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(Error::Config("stage windows must be non-decreasing"));
        }
        Ok(())
    }

    /// Window size (in samples) for stage `index`.
    pub fn stage_window(&self, index: usize) -> usize {
        self.stage_windows[index.min(STAGE_COUNT - 1)] as usize
    }

    /// Parse a JSON override document.  Missing fields keep their defaults.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let config: Self =
            serde_json::from_slice(bytes).map_err(|_| Error::Config("malformed config JSON"))?;
        config.validate()?;
        Ok(config)
    }
}
