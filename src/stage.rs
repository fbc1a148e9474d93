//! Stage aggregator.
//!
//! One sampling stage collects a window of paired samples, hands the whole
//! window to the estimator once, and keeps only plausible values.  After
//! the last stage the kept values are averaged per category.

use heapless::Vec;
use log::warn;

use crate::config::MAX_STAGE_WINDOW;
use crate::scheduler::{Cooperate, Step, Suspended, suspend_until};
use crate::sensors::{Estimate, RawSample, finger_present};
use crate::session::{AbortReason, Averages, StageReading};

/// Heart rates outside this band (bpm) are discarded.
pub const HR_PLAUSIBLE: core::ops::RangeInclusive<i32> = 40..=220;
/// Saturations outside this band (%) are discarded.
pub const SPO2_PLAUSIBLE: core::ops::RangeInclusive<i32> = 80..=100;

/// A waiter that can also pull samples off the sensor.
pub trait Acquire: Cooperate {
    /// Next sample if one is ready.  Bus errors count as "not yet".
    fn poll_sample(&mut self) -> Option<RawSample>;
}

/// Raw samples for one stage, split by channel.
#[derive(Debug, Default)]
pub struct Window {
    pub ir: Vec<u32, MAX_STAGE_WINDOW>,
    pub red: Vec<u32, MAX_STAGE_WINDOW>,
}

impl Window {
    pub fn len(&self) -> usize {
        self.ir.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ir.is_empty()
    }

    fn push(&mut self, s: RawSample) -> bool {
        self.ir.push(s.ir).is_ok() && self.red.push(s.red).is_ok()
    }
}

/// Collect `n` samples (capped at [`MAX_STAGE_WINDOW`]).
///
/// Every per-sample wait is a suspension point.  A sample below the
/// finger threshold ends the stage with [`AbortReason::FingerLost`]; no
/// sample within `sample_timeout_ms` (0 disables) ends it with
/// [`AbortReason::SensorStalled`].  A partial window is never returned.
pub fn collect_window<C: Acquire + ?Sized>(
    coop: &mut C,
    n: usize,
    finger_threshold: u32,
    sample_timeout_ms: u32,
) -> Result<Window, AbortReason> {
    let n = n.min(MAX_STAGE_WINDOW);
    let timeout = (sample_timeout_ms > 0).then_some(sample_timeout_ms);
    let mut window = Window::default();

    while window.len() < n {
        let sample = match suspend_until(coop, timeout, |c| match c.poll_sample() {
            Some(s) => Step::Ready(s),
            None => Step::Pending,
        }) {
            Suspended::Done(s) => s,
            Suspended::Cancelled => return Err(AbortReason::Cancelled),
            Suspended::TimedOut => {
                warn!(
                    "no sample for {} ms after {} of {}",
                    sample_timeout_ms,
                    window.len(),
                    n
                );
                return Err(AbortReason::SensorStalled);
            }
        };

        if !finger_present(sample.ir, finger_threshold) {
            warn!("finger lost at sample {} (ir={})", window.len(), sample.ir);
            return Err(AbortReason::FingerLost);
        }
        if !window.push(sample) {
            break;
        }
    }
    Ok(window)
}

/// Keep each metric only if the estimator vouched for it and it is
/// physiologically plausible.  The two checks are independent.
pub fn filter_estimate(est: &Estimate) -> StageReading {
    let heart_rate = (est.hr_valid && HR_PLAUSIBLE.contains(&est.heart_rate))
        .then_some(est.heart_rate as u16);
    let spo2 = (est.spo2_valid && SPO2_PLAUSIBLE.contains(&est.spo2)).then_some(est.spo2 as u8);
    StageReading { heart_rate, spo2 }
}

/// Mean of the present values per category; 0 when a category has none.
pub fn average(readings: &[StageReading]) -> Averages {
    fn mean(values: impl Iterator<Item = f32>) -> f32 {
        let (sum, count) = values.fold((0.0f32, 0u32), |(s, c), v| (s + v, c + 1));
        if count == 0 { 0.0 } else { sum / count as f32 }
    }

    Averages {
        heart_rate: mean(readings.iter().filter_map(|r| r.heart_rate).map(f32::from)),
        spo2: mean(readings.iter().filter_map(|r| r.spo2).map(f32::from)),
    }
}
