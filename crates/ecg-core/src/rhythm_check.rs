//! RR-interval rhythm classification.
//!
//! Classifies each R-to-R interval as NORMAL, PVC, or UNKNOWN based on the
//! last eight intervals and their labels. Intervals classified as NORMAL
//! are presumed to end with normal beats, PVC intervals with a premature
//! contraction; UNKNOWN intervals fit no recognized pattern. NORMAL covers
//! regular rhythm, beats following premature beats, and recovery beats
//! after ventricular runs; PVC covers short intervals following a regular
//! rhythm, runs of short intervals, and bigeminal rhythms.
//!
//! ## Example
//!
//! ```rust
//! use ecg_core::params::DetectionParams;
//! use ecg_core::rhythm_check::RhythmChecker;
//! use ecg_core::types::BeatClass;
//!
//! let mut rc = RhythmChecker::new(&DetectionParams::new(200));
//! // One-second intervals at 200 Hz settle into a regular rhythm.
//! let mut last = BeatClass::Unknown;
//! for _ in 0..8 {
//!     last = rc.check(200);
//! }
//! assert_eq!(last, BeatClass::Normal);
//! ```

use crate::params::DetectionParams;
use crate::types::BeatClass;

const RBB_LENGTH: usize = 8;

/// Label for one RR interval: which kinds of beat bound it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RrLabel {
    /// Unknown-unknown interval.
    Qq,
    /// Normal-normal interval.
    Nn,
    /// Normal-premature interval.
    Nv,
    /// Premature-normal interval.
    Vn,
    /// Premature-premature interval.
    Vv,
}

/// Streaming RR-interval rhythm classifier.
#[derive(Debug, Clone)]
pub struct RhythmChecker {
    brady_limit: i32,
    rr_buffer: [i32; RBB_LENGTH],
    rr_types: [RrLabel; RBB_LENGTH],
    beat_count: u32,
    learning: bool,
    bigeminy: bool,
}

impl RhythmChecker {
    /// Create a rhythm checker for the given detection-rate parameters.
    pub fn new(params: &DetectionParams) -> Self {
        Self {
            brady_limit: params.ms1500,
            rr_buffer: [0; RBB_LENGTH],
            rr_types: [RrLabel::Qq; RBB_LENGTH],
            beat_count: 0,
            learning: true,
            bigeminy: false,
        }
    }

    /// Whether the most recent interval was part of a bigeminal pattern.
    pub fn is_bigeminy(&self) -> bool {
        self.bigeminy
    }

    /// Classify the rhythm ending with this RR interval (detection-rate
    /// samples).
    pub fn check(&mut self, rr: i32) -> BeatClass {
        self.bigeminy = false;

        // Wait for at least 4 beats before classifying anything.
        if self.beat_count < 4 {
            self.beat_count += 1;
            if self.beat_count == 4 {
                self.learning = false;
            }
        }

        for i in (1..RBB_LENGTH).rev() {
            self.rr_buffer[i] = self.rr_buffer[i - 1];
            self.rr_types[i] = self.rr_types[i - 1];
        }
        self.rr_buffer[0] = rr;

        if self.learning {
            self.rr_types[0] = RrLabel::Qq;
            return BeatClass::Unknown;
        }

        let buf = self.rr_buffer;
        match self.rr_types[1] {
            // The previous interval could not be classified.
            RrLabel::Qq => {
                // This plus the last three intervals matching means a
                // regular rhythm.
                if (0..3).all(|i| rr_match(buf[i], buf[i + 1])) {
                    self.rr_types[0] = RrLabel::Nn;
                    return BeatClass::Normal;
                }

                // Bigeminy: every other interval matches while consecutive
                // intervals do not.
                let alternating = (0..6).all(|i| rr_match(buf[i], buf[i + 2]))
                    && (0..6).all(|i| !rr_match(buf[i], buf[i + 1]));
                if alternating {
                    self.bigeminy = true;
                    if buf[0] < buf[1] {
                        self.rr_types[0] = RrLabel::Nv;
                        self.rr_types[1] = RrLabel::Vn;
                        return BeatClass::Pvc;
                    }
                    self.rr_types[0] = RrLabel::Vn;
                    self.rr_types[1] = RrLabel::Nv;
                    return BeatClass::Normal;
                }

                // N N V N N N V pattern.
                if rr_short(buf[0], buf[1])
                    && rr_match(buf[1], buf[2])
                    && rr_match(buf[2] * 2, buf[3] + buf[4])
                    && rr_match(buf[4], buf[0])
                    && rr_match(buf[5], buf[2])
                {
                    self.rr_types[0] = RrLabel::Nv;
                    self.rr_types[1] = RrLabel::Nn;
                    return BeatClass::Pvc;
                }

                self.rr_types[0] = RrLabel::Qq;
                BeatClass::Unknown
            }

            // The previous two beats were normal.
            RrLabel::Nn => {
                if rr_short2(&self.rr_buffer, &self.rr_types) {
                    if self.rr_buffer[1] < self.brady_limit {
                        self.rr_types[0] = RrLabel::Nv;
                        return BeatClass::Pvc;
                    }
                    self.rr_types[0] = RrLabel::Qq;
                    return BeatClass::Unknown;
                }

                if rr_match(buf[0], buf[1]) {
                    self.rr_types[0] = RrLabel::Nn;
                    return BeatClass::Normal;
                }

                if rr_short(buf[0], buf[1]) {
                    // A short interval matching the one before last (which
                    // was normal) is still normal.
                    if rr_match(buf[0], buf[2]) && self.rr_types[2] == RrLabel::Nn {
                        self.rr_types[0] = RrLabel::Nn;
                        return BeatClass::Normal;
                    }
                    // Premature against a non-bradycardic rhythm.
                    if buf[1] < self.brady_limit {
                        self.rr_types[0] = RrLabel::Nv;
                        return BeatClass::Pvc;
                    }
                    // During bradycardia a short interval proves nothing.
                    self.rr_types[0] = RrLabel::Qq;
                    return BeatClass::Unknown;
                }

                // A long interval reads as normal but resets the pattern.
                self.rr_types[0] = RrLabel::Qq;
                BeatClass::Normal
            }

            // The previous beat was premature.
            RrLabel::Nv => {
                if rr_short2(&self.rr_buffer[1..], &self.rr_types[1..]) {
                    if rr_match(buf[0], buf[1]) {
                        self.rr_types[0] = RrLabel::Nn;
                        self.rr_types[1] = RrLabel::Nn;
                        return BeatClass::Normal;
                    }
                    if buf[0] > buf[1] {
                        self.rr_types[0] = RrLabel::Vn;
                        return BeatClass::Normal;
                    }
                    self.rr_types[0] = RrLabel::Qq;
                    return BeatClass::Unknown;
                }

                // Matching the premature interval makes a couplet.
                if rr_match(buf[0], buf[1]) {
                    self.rr_types[0] = RrLabel::Vv;
                    return BeatClass::Pvc;
                }

                // A longer interval is recovery to normal.
                if buf[0] > buf[1] {
                    self.rr_types[0] = RrLabel::Vn;
                    return BeatClass::Normal;
                }

                self.rr_types[0] = RrLabel::Qq;
                BeatClass::Unknown
            }

            // The previous beat followed a premature beat or a couplet.
            RrLabel::Vn => {
                // Estimate the normal interval from the last NN in the
                // buffer, or from the NV/VN pair when no NN survives.
                let mut nn_est = 0;
                for i in 2..RBB_LENGTH {
                    if self.rr_types[i] == RrLabel::Nn {
                        nn_est = buf[i];
                        if rr_match(buf[0], nn_est) {
                            self.rr_types[0] = RrLabel::Nn;
                            return BeatClass::Normal;
                        }
                        break;
                    }
                }
                let mut nv_est = 0;
                for i in 2..RBB_LENGTH {
                    if self.rr_types[i] == RrLabel::Nv {
                        nv_est = buf[i];
                        break;
                    }
                }
                if nn_est == 0 && nv_est != 0 {
                    nn_est = (buf[1] + nv_est) >> 1;
                }

                if nv_est != 0
                    && (nn_est - buf[0]).abs() < (nv_est - buf[0]).abs()
                    && rr_match(nn_est, buf[0])
                {
                    self.rr_types[0] = RrLabel::Nn;
                    return BeatClass::Normal;
                }
                if nv_est != 0
                    && (nn_est - buf[0]).abs() > (nv_est - buf[0]).abs()
                    && rr_match(nv_est, buf[0])
                {
                    self.rr_types[0] = RrLabel::Nv;
                    return BeatClass::Pvc;
                }

                self.rr_types[0] = RrLabel::Qq;
                BeatClass::Unknown
            }

            // The previous interval was between two premature beats.
            RrLabel::Vv => {
                if rr_match(buf[0], buf[1]) {
                    self.rr_types[0] = RrLabel::Vv;
                    return BeatClass::Pvc;
                }
                if rr_short(buf[0], buf[1]) {
                    self.rr_types[0] = RrLabel::Qq;
                    return BeatClass::Unknown;
                }
                // Any non-short interval is recovery to a normal beat.
                self.rr_types[0] = RrLabel::Vn;
                BeatClass::Normal
            }
        }
    }
}

/// Whether two intervals are within 12.5 % of their mean.
fn rr_match(rr0: i32, rr1: i32) -> bool {
    (rr0 - rr1).abs() < ((rr0 + rr1) >> 3)
}

/// Whether an interval is less than 75 % of the previous interval.
fn rr_short(rr0: i32, rr1: i32) -> bool {
    rr0 < rr1 - (rr1 >> 2)
}

/// A single short interval inside an otherwise very regular rhythm: the
/// last four NN intervals agree with their mean within 1/16 and the new
/// interval falls below seven eighths of that mean.
fn rr_short2(rr_intervals: &[i32], rr_types: &[RrLabel]) -> bool {
    let mut rr_mean = 0;
    let mut nn_count = 0;
    let mut i = 1;
    while i < 7 && nn_count < 4 {
        if rr_types[i] == RrLabel::Nn {
            nn_count += 1;
            rr_mean += rr_intervals[i];
        }
        i += 1;
    }
    if nn_count != 4 {
        return false;
    }
    rr_mean >>= 2;

    let mut i = 1;
    while i < 7 {
        if rr_types[i] == RrLabel::Nn && (rr_mean - rr_intervals[i]).abs() > (rr_mean >> 4) {
            i = 10;
        }
        i += 1;
    }

    i < 9 && rr_intervals[0] < rr_mean - (rr_mean >> 3)
}
