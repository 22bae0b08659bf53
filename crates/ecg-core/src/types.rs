//! Core types for ECG beat detection and classification.
//!
//! Beat labels are a three-way classification; their wire codes come from
//! the standard ECG annotation code table (`NORMAL = 1`, `PVC = 5`,
//! `UNKNOWN = 13`), so results can be written straight into annotation
//! streams that use that enumeration.

use serde::{Deserialize, Serialize};

/// Result type for analyzer construction.
pub type EcgResult<T> = Result<T, EcgError>;

/// Errors that can occur when configuring the analyzer.
///
/// The streaming path itself is total: once an analyzer is built, every
/// sample is accepted and degraded input shows up as `Unknown` labels, not
/// as errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcgError {
    #[error("sample rate {0} Hz outside the supported 150-400 Hz range")]
    SampleRateOutOfRange(u32),

    #[error(
        "beat analysis rate {beat_rate} Hz must be half the detection rate \
         {sample_rate} Hz (templates are stored at half rate)"
    )]
    UnsupportedBeatRate { sample_rate: u32, beat_rate: u32 },
}

/// Classification of a single heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BeatClass {
    /// Normal (supraventricular) beat.
    Normal,
    /// Premature ventricular contraction.
    Pvc,
    /// Unclassifiable beat.
    Unknown,
}

impl BeatClass {
    /// Annotation code for this label (`NORMAL = 1`, `PVC = 5`,
    /// `UNKNOWN = 13`).
    pub fn code(self) -> u8 {
        match self {
            BeatClass::Normal => 1,
            BeatClass::Pvc => 5,
            BeatClass::Unknown => 13,
        }
    }
}

/// Verdict produced by the beat classifier for one completed beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeatVerdict {
    /// A labeled beat that should be reported.
    Beat(BeatClass),
    /// The trailing edge of a beat that was already reported (annotation
    /// code 100). The orchestrator suppresses the emission and folds the
    /// RR interval into the next beat.
    TrailingEdge,
}

/// A detected, classified beat as emitted by [`crate::bdac::Bdac`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beat {
    /// Number of input samples elapsed since the estimated R-wave location.
    pub samples_since_r_wave: i32,
    /// Beat label.
    pub class: BeatClass,
    /// Index of the morphology template this beat matched, or the template
    /// capacity when no template was recorded.
    pub template: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beat_class_codes() {
        assert_eq!(BeatClass::Normal.code(), 1);
        assert_eq!(BeatClass::Pvc.code(), 5);
        assert_eq!(BeatClass::Unknown.code(), 13);
    }

    #[test]
    fn test_error_display() {
        let e = EcgError::SampleRateOutOfRange(500);
        assert!(e.to_string().contains("500"));
        let e = EcgError::UnsupportedBeatRate {
            sample_rate: 200,
            beat_rate: 70,
        };
        assert!(e.to_string().contains("70"));
    }
}
