//! Sample-rate-derived parameter bundles.
//!
//! Every duration in the pipeline is expressed in integer samples and
//! derived once from the sample rate as `round(ms / ms_per_sample)`. Two
//! rates exist side by side: the **detection rate** at which raw samples
//! arrive and the filters run, and the **beat analysis rate** (half the
//! detection rate) at which beat templates are stored and compared.
//!
//! ## Example
//!
//! ```rust
//! use ecg_core::params::DetectionParams;
//!
//! let p = DetectionParams::new(200);
//! assert_eq!(p.ms100, 20);
//! assert_eq!(p.window_width, p.ms80);
//! ```

use serde::{Deserialize, Serialize};

/// Maximum number of morphology templates kept in the bank.
pub const MAX_TYPES: usize = 8;

/// Length of each template's recent-match-index history.
pub const MATCH_HISTORY: usize = 8;

/// Durations at the detection sample rate, in samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionParams {
    /// Detection sample rate in Hz.
    pub sample_rate: i32,
    pub ms10: i32,
    pub ms25: i32,
    pub ms30: i32,
    pub ms80: i32,
    pub ms95: i32,
    pub ms100: i32,
    pub ms125: i32,
    pub ms150: i32,
    pub ms160: i32,
    pub ms175: i32,
    pub ms195: i32,
    pub ms200: i32,
    pub ms220: i32,
    pub ms250: i32,
    pub ms300: i32,
    pub ms360: i32,
    pub ms450: i32,
    pub ms1000: i32,
    pub ms1500: i32,
    /// Length of the derivative history (10 ms).
    pub deriv_length: i32,
    /// Low-pass filter buffer length (50 ms).
    pub lpbuffer_lgth: i32,
    /// High-pass filter buffer length (125 ms).
    pub hpbuffer_lgth: i32,
    /// Moving window integration width (80 ms).
    pub window_width: i32,
}

impl DetectionParams {
    /// Derive all detection-rate durations for the given sample rate.
    pub fn new(sample_rate: u32) -> Self {
        let sample_rate = sample_rate as i32;
        let ms_per_sample = 1000.0 / sample_rate as f64;
        let ms = |m: f64| (m / ms_per_sample + 0.5) as i32;
        let ms10 = ms(10.0);
        let ms25 = ms(25.0);
        let ms80 = ms(80.0);
        let ms125 = ms(125.0);
        Self {
            sample_rate,
            ms10,
            ms25,
            ms30: ms(30.0),
            ms80,
            ms95: ms(95.0),
            ms100: ms(100.0),
            ms125,
            ms150: ms(150.0),
            ms160: ms(160.0),
            ms175: ms(175.0),
            ms195: ms(195.0),
            ms200: ms(200.0),
            ms220: ms(220.0),
            ms250: ms(250.0),
            ms300: ms(300.0),
            ms360: ms(360.0),
            ms450: ms(450.0),
            ms1000: sample_rate,
            // Truncated, not rounded, in the original tables.
            ms1500: (1500.0 / ms_per_sample) as i32,
            deriv_length: ms10,
            lpbuffer_lgth: 2 * ms25,
            hpbuffer_lgth: ms125,
            window_width: ms80,
        }
    }
}

/// Detection delays once the pre-blank hold is accounted for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreBlankParams {
    /// Peak-hold window: only the largest peak within this window survives.
    pub pre_blank: i32,
    /// Combined filter delays plus the pre-blank delay.
    pub filter_delay: i32,
    /// Raw-derivative history length needed for baseline-shift review.
    pub der_delay: i32,
}

impl PreBlankParams {
    pub fn new(params: &DetectionParams, pre_blank: i32) -> Self {
        let filter_delay = (params.deriv_length as f64 / 2.0
            + (params.lpbuffer_lgth as f64 / 2.0 - 1.0)
            + (params.hpbuffer_lgth as f64 - 1.0) / 2.0
            + pre_blank as f64) as i32;
        Self {
            pre_blank,
            filter_delay,
            der_delay: params.window_width + filter_delay + params.ms100,
        }
    }
}

/// Durations at the beat analysis sample rate, in samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeatParams {
    /// Beat analysis sample rate in Hz.
    pub beat_sample_rate: i32,
    pub ms10: i32,
    pub ms20: i32,
    pub ms40: i32,
    pub ms50: i32,
    pub ms60: i32,
    pub ms70: i32,
    pub ms80: i32,
    pub ms90: i32,
    pub ms100: i32,
    pub ms110: i32,
    pub ms130: i32,
    pub ms140: i32,
    pub ms150: i32,
    pub ms250: i32,
    pub ms280: i32,
    pub ms300: i32,
    pub ms350: i32,
    pub ms400: i32,
    pub ms1000: i32,
    /// Beat buffer length: one second of beat-rate samples.
    pub beatlgth: i32,
    /// Canonical R-wave index within a beat buffer (400 ms).
    pub fidmark: i32,
}

impl BeatParams {
    /// Derive all beat-rate durations for the given beat sample rate.
    pub fn new(beat_sample_rate: u32) -> Self {
        let beat_sample_rate = beat_sample_rate as i32;
        let ms_per_sample = 1000.0 / beat_sample_rate as f64;
        let ms = |m: f64| (m / ms_per_sample + 0.5) as i32;
        let ms400 = ms(400.0);
        Self {
            beat_sample_rate,
            ms10: ms(10.0),
            ms20: ms(20.0),
            ms40: ms(40.0),
            ms50: ms(50.0),
            ms60: ms(60.0),
            ms70: ms(70.0),
            ms80: ms(80.0),
            ms90: ms(90.0),
            ms100: ms(100.0),
            ms110: ms(110.0),
            ms130: ms(130.0),
            ms140: ms(140.0),
            ms150: ms(150.0),
            ms250: ms(250.0),
            ms280: ms(280.0),
            ms300: ms(300.0),
            ms350: ms(350.0),
            ms400,
            ms1000: beat_sample_rate,
            beatlgth: beat_sample_rate,
            fidmark: ms400,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_params_200hz() {
        let p = DetectionParams::new(200);
        assert_eq!(p.ms10, 2);
        assert_eq!(p.ms25, 5);
        assert_eq!(p.ms80, 16);
        assert_eq!(p.ms95, 19);
        assert_eq!(p.ms195, 39);
        assert_eq!(p.ms1000, 200);
        assert_eq!(p.ms1500, 300);
        assert_eq!(p.lpbuffer_lgth, 10);
        assert_eq!(p.hpbuffer_lgth, 25);
        assert_eq!(p.window_width, 16);
    }

    #[test]
    fn test_pre_blank_delays_200hz() {
        let p = DetectionParams::new(200);
        let pb = PreBlankParams::new(&p, p.ms195);
        // deriv/2 + lp/2 - 1 + (hp-1)/2 + pre_blank = 1 + 4 + 12 + 39
        assert_eq!(pb.filter_delay, 56);
        assert_eq!(pb.der_delay, 16 + 56 + 20);
    }

    #[test]
    fn test_beat_params_100hz() {
        let p = BeatParams::new(100);
        assert_eq!(p.beatlgth, 100);
        assert_eq!(p.fidmark, 40);
        assert_eq!(p.ms150, 15);
        assert_eq!(p.ms40, 4);
        assert!(p.fidmark < p.beatlgth);
    }

    #[test]
    fn test_rounding_at_odd_rates() {
        // 250 Hz: 4 ms per sample, 10 ms rounds to 3 samples.
        let p = DetectionParams::new(250);
        assert_eq!(p.ms10, 3);
        assert_eq!(p.ms1000, 250);
        // 360 Hz (MIT-BIH native rate).
        let p = DetectionParams::new(360);
        assert_eq!(p.ms1000, 360);
        assert_eq!(p.ms1500, 540);
    }
}
