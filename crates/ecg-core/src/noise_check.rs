//! Inter-beat noise estimation.
//!
//! Keeps the last 1.5 s of raw samples in a ring buffer. When a beat is
//! detected, the noise estimate is the peak-to-peak signal variation in the
//! isoelectric window between the end of the previous beat and the
//! beginning of the present beat (or the most recent 250 ms, whichever is
//! shorter), divided by the window length and scaled by 10. If the beats
//! are too close together for any window to exist, the estimate is 0.

use crate::params::DetectionParams;

/// Streaming noise estimator over the raw sample stream.
#[derive(Debug, Clone)]
pub struct NoiseChecker {
    buffer: Vec<i32>,
    ptr: usize,
    estimate: i32,
    ms250: i32,
}

impl NoiseChecker {
    /// Create a noise checker for the given detection-rate parameters.
    pub fn new(params: &DetectionParams) -> Self {
        Self {
            buffer: vec![0; params.ms1500 as usize],
            ptr: 0,
            estimate: 0,
            ms250: params.ms250,
        }
    }

    /// The most recent noise estimate.
    pub fn estimate(&self) -> i32 {
        self.estimate
    }

    /// Store one raw sample; when `delay` marks a detected beat, estimate
    /// the noise between the previous beat's end and this beat's begin.
    ///
    /// `delay` is the sample delay since the R-wave of the detected beat
    /// (0 when no beat is ready), `rr` the interval to the previous beat,
    /// and `beat_begin`/`beat_end` the offsets from the R-wave to the edges
    /// of a beat, all at the detection rate.
    pub fn check(&mut self, datum: i32, delay: i32, rr: i32, beat_begin: i32, beat_end: i32) -> i32 {
        let nb_length = self.buffer.len() as i32;

        self.buffer[self.ptr] = datum;
        self.ptr += 1;
        if self.ptr == self.buffer.len() {
            self.ptr = 0;
        }

        // Window between 300 ms after the last R-wave and 250 ms before the
        // present one.
        let mut nc_start = delay + rr - beat_end;
        let nc_end = delay + beat_begin;
        if nc_start > nc_end + self.ms250 {
            nc_start = nc_end + self.ms250;
        }

        if delay != 0 && nc_start < nb_length && nc_start > nc_end {
            let mut ptr = self.ptr as i32 - nc_start;
            if ptr < 0 {
                ptr += nb_length;
            }
            let mut ptr = ptr as usize;

            let mut nc_max = self.buffer[ptr];
            let mut nc_min = self.buffer[ptr];
            for _ in 0..(nc_start - nc_end) {
                if self.buffer[ptr] > nc_max {
                    nc_max = self.buffer[ptr];
                } else if self.buffer[ptr] < nc_min {
                    nc_min = self.buffer[ptr];
                }
                ptr += 1;
                if ptr == self.buffer.len() {
                    ptr = 0;
                }
            }

            let noise_index = (nc_max - nc_min) as f64 / (nc_start - nc_end) as f64;
            self.estimate = (noise_index * 10.0) as i32;
        } else {
            self.estimate = 0;
        }
        self.estimate
    }
}
