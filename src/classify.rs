//! Result classification.
//!
//! The one place that turns averaged readings into a verdict.  The status
//! snapshot, the presenter and the completion event all call into here, and
//! it takes the same rounded integers the snapshot publishes so a client can
//! reproduce the label from the payload alone.
//!
//! A category with no valid stage has no value at all (its published
//! average is 0).  [`verdict`] only classifies when both are present.

use core::fmt;

/// Verdict for a completed measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Normal,
    Warning,
    Critical,
}

impl Classification {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Warning => "Warning",
            Self::Critical => "Critical",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Three-way classification of averaged heart rate (bpm) and saturation (%).
pub fn classify(avg_hr: u16, avg_spo2: u16) -> Classification {
    if avg_spo2 >= 95 && (60..=100).contains(&avg_hr) {
        Classification::Normal
    } else if avg_spo2 >= 90 {
        Classification::Warning
    } else {
        Classification::Critical
    }
}

/// What a finished session amounts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Classified(Classification),
    /// Exactly one category had a valid stage.
    Partial,
    /// No stage produced a valid value.
    NoReading,
}

impl Verdict {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Classified(c) => c.as_str(),
            Self::Partial => "Partial reading",
            Self::NoReading => "No reading",
        }
    }

    pub const fn classification(self) -> Option<Classification> {
        match self {
            Self::Classified(c) => Some(c),
            Self::Partial | Self::NoReading => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict over the measured averages; `None` is a category with no data.
pub fn verdict(avg_hr: Option<u16>, avg_spo2: Option<u16>) -> Verdict {
    match (avg_hr, avg_spo2) {
        (Some(hr), Some(spo2)) => Verdict::Classified(classify(hr, spo2)),
        (None, None) => Verdict::NoReading,
        _ => Verdict::Partial,
    }
}

/// Label published in the status snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLabel {
    Idle,
    Measuring,
    Result(Verdict),
}

impl StatusLabel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Measuring => "measuring",
            Self::Result(v) => v.as_str(),
        }
    }
}

/// Status label for the snapshot.  An active session always reads as
/// "measuring", whatever its partial averages are.
pub fn status_label(
    avg_hr: Option<u16>,
    avg_spo2: Option<u16>,
    active: bool,
    completed: bool,
) -> StatusLabel {
    if active {
        StatusLabel::Measuring
    } else if !completed {
        StatusLabel::Idle
    } else {
        StatusLabel::Result(verdict(avg_hr, avg_spo2))
    }
}
