//! Sensor subsystem: raw PPG samples, finger presence, and the estimators
//! that turn a window of samples into heart rate and saturation.
//!
//! The hardware driver lives in [`crate::drivers::max30102`]; this module
//! holds the target-independent pieces.

pub mod estimator;
pub mod simulated;

/// One paired reading from the optical front end.  Intensities are raw
/// 18-bit ADC counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawSample {
    pub red: u32,
    pub ir: u32,
}

/// Output of an estimator run over one window.  Values are only
/// meaningful when the matching flag is set; the stage aggregator applies
/// its own plausibility limits on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Estimate {
    pub heart_rate: i32,
    pub hr_valid: bool,
    pub spo2: i32,
    pub spo2_valid: bool,
}

impl Estimate {
    pub const INVALID: Self = Self {
        heart_rate: -1,
        hr_valid: false,
        spo2: -1,
        spo2_valid: false,
    };
}

/// A finger is on the sensor when IR intensity reaches the threshold.
/// Instantaneous, no debounce.
#[inline]
pub fn finger_present(ir: u32, threshold: u32) -> bool {
    ir >= threshold
}
