//! Reference heart-rate / SpO2 estimator.
//!
//! SpO2 uses the ratio-of-ratios of the pulsatile (AC) to baseline (DC)
//! components of the red and IR channels with the common linear
//! calibration `110 - 25 R`.  Heart rate is the first autocorrelation peak
//! of the IR channel inside the 40–220 bpm band.
//!
//! Good enough to make the firmware and simulator runnable.  A clinical
//! algorithm can replace it behind the [`Estimator`] port.

use crate::app::ports::Estimator;

use super::Estimate;

/// Slowest heart rate searched for (bpm).
const HR_MIN_BPM: f32 = 40.0;
/// Fastest heart rate searched for (bpm).
const HR_MAX_BPM: f32 = 220.0;
/// Minimum normalised autocorrelation for a periodic pulse.
const MIN_PERIODICITY: f32 = 0.5;
/// Perfusion index (AC/DC) below which the pulse is considered absent.
const MIN_PERFUSION: f32 = 0.000_5;

pub struct RatioOfRatiosEstimator {
    sample_rate_hz: f32,
}

impl RatioOfRatiosEstimator {
    pub fn new(sample_rate_hz: u16) -> Self {
        Self {
            sample_rate_hz: f32::from(sample_rate_hz.max(1)),
        }
    }
}

impl Estimator for RatioOfRatiosEstimator {
    fn estimate(&mut self, ir: &[u32], red: &[u32]) -> Estimate {
        let n = ir.len().min(red.len());
        if n < 8 {
            return Estimate::INVALID;
        }
        let (ir, red) = (&ir[..n], &red[..n]);

        let mut out = Estimate::INVALID;

        if let Some(bpm) = heart_rate(ir, self.sample_rate_hz) {
            out.heart_rate = bpm.round() as i32;
            out.hr_valid = true;
        }
        if let Some(pct) = spo2(ir, red) {
            out.spo2 = pct.round() as i32;
            out.spo2_valid = true;
        }
        out
    }
}

/// Mean and RMS deviation of a channel.
fn dc_ac(channel: &[u32]) -> (f32, f32) {
    let n = channel.len() as f32;
    let mean = channel.iter().map(|&v| v as f32).sum::<f32>() / n;
    let var = channel
        .iter()
        .map(|&v| {
            let d = v as f32 - mean;
            d * d
        })
        .sum::<f32>()
        / n;
    (mean, var.sqrt())
}

fn spo2(ir: &[u32], red: &[u32]) -> Option<f32> {
    let (dc_ir, ac_ir) = dc_ac(ir);
    let (dc_red, ac_red) = dc_ac(red);
    if dc_ir < 1.0 || dc_red < 1.0 {
        return None;
    }
    let (pi_ir, pi_red) = (ac_ir / dc_ir, ac_red / dc_red);
    if pi_ir < MIN_PERFUSION || pi_red < MIN_PERFUSION {
        return None;
    }
    let r = pi_red / pi_ir;
    Some((110.0 - 25.0 * r).clamp(0.0, 100.0))
}

fn heart_rate(ir: &[u32], fs: f32) -> Option<f32> {
    let n = ir.len();
    let min_lag = ((fs * 60.0 / HR_MAX_BPM).floor() as usize).max(1);
    let max_lag = ((fs * 60.0 / HR_MIN_BPM).ceil() as usize).min(n / 2);
    if min_lag + 2 > max_lag {
        return None;
    }

    let mean = ir.iter().map(|&v| v as f32).sum::<f32>() / n as f32;
    let acf = |lag: usize| -> f32 {
        ir.iter()
            .zip(&ir[lag..])
            .map(|(&a, &b)| (a as f32 - mean) * (b as f32 - mean))
            .sum()
    };
    let acf0 = acf(0);
    if acf0 <= f32::EPSILON {
        return None;
    }

    // First local maximum in the cardiac band.
    let mut prev = acf(min_lag - 1);
    let mut cur = acf(min_lag);
    for lag in min_lag..max_lag {
        let next = acf(lag + 1);
        if cur >= prev && cur >= next && cur / acf0 >= MIN_PERIODICITY {
            // Parabolic refinement of the peak position.
            let denom = prev - 2.0 * cur + next;
            let offset = if denom.abs() > f32::EPSILON {
                0.5 * (prev - next) / denom
            } else {
                0.0
            };
            let period = lag as f32 + offset.clamp(-0.5, 0.5);
            return Some(60.0 * fs / period);
        }
        prev = cur;
        cur = next;
    }
    None
}
