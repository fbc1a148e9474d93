//! Synthetic PPG source for the host simulator.
//!
//! Produces a clean two-harmonic pulse on both channels at a fixed rate,
//! paced by wall-clock time the way the real FIFO fills.  The red/IR
//! modulation ratio is chosen so the ratio-of-ratios calibration maps back
//! onto the requested saturation.

use std::time::Instant;

use crate::app::ports::SensorPort;
use crate::error::SensorError;

use super::RawSample;

const DC_IR: f32 = 100_000.0;
const DC_RED: f32 = 80_000.0;
const AC_IR: f32 = 1_000.0;
/// IR level reported with no finger on the sensor.
const NO_FINGER_IR: u32 = 2_000;
/// Depth of the sensor FIFO; older samples are dropped on overflow.
const FIFO_DEPTH: u64 = 32;

/// Sample `index` of a synthetic pulse train.
pub fn synth_sample(index: u64, rate_hz: u16, hr_bpm: f32, spo2_pct: f32) -> RawSample {
    let t = index as f32 / f32::from(rate_hz.max(1));
    let phase = core::f32::consts::TAU * hr_bpm / 60.0 * t;
    let wave = phase.sin() + 0.2 * (2.0 * phase).sin();

    let r = (110.0 - spo2_pct) / 25.0;
    let ac_red = r * (AC_IR / DC_IR) * DC_RED;

    RawSample {
        red: (DC_RED + ac_red * wave) as u32,
        ir: (DC_IR + AC_IR * wave) as u32,
    }
}

/// A full `(ir, red)` window, handy for exercising estimators.
pub fn synth_window(n: usize, rate_hz: u16, hr_bpm: f32, spo2_pct: f32) -> (Vec<u32>, Vec<u32>) {
    (0..n as u64)
        .map(|i| synth_sample(i, rate_hz, hr_bpm, spo2_pct))
        .map(|s| (s.ir, s.red))
        .unzip()
}

pub struct SimulatedPpg {
    rate_hz: u16,
    hr_bpm: f32,
    spo2_pct: f32,
    finger: bool,
    epoch: Instant,
    emitted: u64,
}

impl SimulatedPpg {
    pub fn new(rate_hz: u16, hr_bpm: f32, spo2_pct: f32) -> Self {
        Self {
            rate_hz: rate_hz.max(1),
            hr_bpm,
            spo2_pct,
            finger: true,
            epoch: Instant::now(),
            emitted: 0,
        }
    }

    pub fn set_finger(&mut self, present: bool) {
        self.finger = present;
    }

    fn due(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64 * u64::from(self.rate_hz) / 1000
    }

    fn sample(&self, index: u64) -> RawSample {
        let mut s = synth_sample(index, self.rate_hz, self.hr_bpm, self.spo2_pct);
        if !self.finger {
            s.ir = NO_FINGER_IR;
            s.red = NO_FINGER_IR / 2;
        }
        s
    }
}

impl SensorPort for SimulatedPpg {
    fn probe(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    fn poll_sample(&mut self) -> Result<Option<RawSample>, SensorError> {
        let due = self.due();
        if self.emitted >= due {
            return Ok(None);
        }
        self.emitted = self.emitted.max(due.saturating_sub(FIFO_DEPTH));
        let s = self.sample(self.emitted);
        self.emitted += 1;
        Ok(Some(s))
    }

    fn ir_level(&mut self) -> Result<u32, SensorError> {
        Ok(self.sample(self.due()).ir)
    }
}
