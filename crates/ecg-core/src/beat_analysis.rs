//! Per-beat geometry analysis.
//!
//! Given a beat buffer sampled at the beat analysis rate with the R-wave
//! near the fiducial mark, estimates the QRS onset and offset, the
//! isoelectric level, the beat begin (P-wave onset) and beat end (T-wave
//! offset), and the QRS amplitude. Onset and offset come from walking
//! outward from the extreme slopes until the slope magnitude falls below a
//! quarter of the threshold slope, with inflection checks that carry the
//! walk across brief opposite-slope plateaus. Purely functional over the
//! buffer; no streaming state.

use crate::params::BeatParams;

const ISO_LIMIT: i32 = 20;

/// Geometry estimates for one beat.
///
/// `beat_begin` and `beat_end` are absolute indices into the beat buffer;
/// the matcher converts them to offsets from the fiducial mark when the
/// orchestrator needs detection-rate windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeatFeatures {
    pub onset: i32,
    pub offset: i32,
    pub iso_level: i32,
    pub beat_begin: i32,
    pub beat_end: i32,
    pub amp: i32,
}

/// Beat geometry analyzer.
#[derive(Debug, Clone)]
pub struct BeatAnalyzer {
    params: BeatParams,
    iso_length1: i32,
    iso_length2: i32,
    inf_chk_n: i32,
}

impl BeatAnalyzer {
    /// Create an analyzer for the given beat-rate parameters.
    pub fn new(params: &BeatParams) -> Self {
        Self {
            iso_length1: params.ms50,
            iso_length2: params.ms80,
            inf_chk_n: params.ms40,
            params: params.clone(),
        }
    }

    /// Whether a run of data stays within a small enough amplitude band to
    /// count as isoelectric.
    pub fn iso_check(&self, data: &[i32], iso_length: i32) -> bool {
        let mut max = data[0];
        let mut min = data[0];
        let mut i = 1usize;
        while (i as i32) < iso_length && i < data.len() {
            if data[i] > max {
                max = data[i];
            } else if data[i] < min {
                min = data[i];
            }
            i += 1;
        }
        max - min < ISO_LIMIT
    }

    /// Analyze one beat buffer of length `beatlgth` with the R-wave near
    /// the fiducial mark.
    pub fn analyze(&self, beat: &[i32]) -> BeatFeatures {
        let p = &self.params;
        let beatlgth = p.beatlgth;
        let fid = p.fidmark;
        let s = |i: i32| beat[i as usize];

        // Search back from the fiducial mark for the isoelectric region
        // preceding the QRS; retry with the short window if none is found.
        let mut i = fid - self.iso_length2;
        while i > 0 && !self.iso_check(&beat[i as usize..], self.iso_length2) {
            i -= 1;
        }
        let mut iso_start;
        if i == 0 {
            i = fid - self.iso_length1;
            while i > 0 && !self.iso_check(&beat[i as usize..], self.iso_length1) {
                i -= 1;
            }
            iso_start = i + (self.iso_length1 - 1);
        } else {
            iso_start = i + (self.iso_length2 - 1);
        }

        // Isoelectric region following the QRS.
        let mut i = fid;
        while i < beatlgth && !self.iso_check(&beat[i as usize..], self.iso_length1) {
            i += 1;
        }
        let iso_end = i;

        // Extreme slopes on the QRS complex.
        let mut i = fid - p.ms150;
        let mut max_slope = s(i) - s(i - 1);
        let mut max_slope_i = i;
        let mut min_slope = 0;
        let mut min_slope_i = i;
        while i < fid + p.ms150 {
            let slope = s(i) - s(i - 1);
            if slope > max_slope {
                max_slope = slope;
                max_slope_i = i;
            } else if slope < min_slope {
                min_slope = slope;
                min_slope_i = i;
            }
            i += 1;
        }

        // Use the smaller magnitude of the two as the search threshold.
        if max_slope > -min_slope {
            max_slope = -min_slope;
        } else {
            min_slope = -max_slope;
        }

        let mut onset;
        let mut offset;

        if max_slope_i < min_slope_i {
            // Search back from the maximum slope point for the QRS onset.
            let mut i = max_slope_i;
            while i > 0 && s(i) - s(i - 1) > (max_slope >> 2) {
                i -= 1;
            }
            onset = i - 1;

            // Check whether this was just a brief inflection.
            while i > 0 && i > onset - self.inf_chk_n && s(i) - s(i - 1) <= (max_slope >> 2) {
                i -= 1;
            }
            if i > onset - self.inf_chk_n {
                while i > 0 && s(i) - s(i - 1) > (max_slope >> 2) {
                    i -= 1;
                }
                onset = i - 1;
            }
            i = onset + 1;

            // A large negative slope after an inflection extends the onset.
            while i > 0 && i > onset - self.inf_chk_n && s(i - 1) - s(i) < (max_slope >> 2) {
                i -= 1;
            }
            if i > onset - self.inf_chk_n {
                while i > 0 && s(i - 1) - s(i) > (max_slope >> 2) {
                    i -= 1;
                }
                onset = i - 1;
            }

            // Search forward from the minimum slope point for the offset.
            let mut i = min_slope_i;
            while i < beatlgth && s(i) - s(i - 1) < (min_slope >> 2) {
                i += 1;
            }
            offset = i;

            // Make sure this wasn't just an inflection.
            while i < beatlgth && i < offset + self.inf_chk_n && s(i) - s(i - 1) >= (min_slope >> 2)
            {
                i += 1;
            }
            if i < offset + self.inf_chk_n {
                while i < beatlgth && s(i) - s(i - 1) < (min_slope >> 2) {
                    i += 1;
                }
                offset = i;
            }
            i = offset;

            // A significant upslope following the downslope extends the
            // offset, and PVC shapes can earn one more swing.
            while i < beatlgth && i < offset + p.ms40 && s(i - 1) - s(i) > (min_slope >> 2) {
                i += 1;
            }
            if i < offset + p.ms40 {
                while i < beatlgth && s(i - 1) - s(i) < (min_slope >> 2) {
                    i += 1;
                }
                offset = i;

                while i < beatlgth && i < offset + p.ms60 && s(i) - s(i - 1) > (min_slope >> 2) {
                    i += 1;
                }
                if i < offset + p.ms60 {
                    while i < beatlgth && s(i) - s(i - 1) < (min_slope >> 2) {
                        i += 1;
                    }
                    offset = i;
                }
            }
        } else {
            // Search back from the minimum slope point for the QRS onset.
            let mut i = min_slope_i;
            while i > 0 && s(i) - s(i - 1) < (min_slope >> 2) {
                i -= 1;
            }
            onset = i - 1;

            // Check whether this was just a brief inflection.
            while i > 0 && i > onset - self.inf_chk_n && s(i) - s(i - 1) >= (min_slope >> 2) {
                i -= 1;
            }
            if i > onset - self.inf_chk_n {
                while i > 0 && s(i) - s(i - 1) < (min_slope >> 2) {
                    i -= 1;
                }
                onset = i - 1;
            }
            i = onset + 1;

            // Significant positive slope after a turning point.
            while i > 0 && i > onset - self.inf_chk_n && s(i - 1) - s(i) > (min_slope >> 2) {
                i -= 1;
            }
            if i > onset - self.inf_chk_n {
                while i > 0 && s(i - 1) - s(i) < (min_slope >> 2) {
                    i -= 1;
                }
                onset = i - 1;
            }

            // Search forward from the maximum slope point for the offset.
            let mut i = max_slope_i;
            while i < beatlgth && s(i) - s(i - 1) > (max_slope >> 2) {
                i += 1;
            }
            offset = i;

            // Make sure this wasn't just an inflection.
            while i < beatlgth && i < offset + self.inf_chk_n && s(i) - s(i - 1) <= (max_slope >> 2)
            {
                i += 1;
            }
            if i < offset + self.inf_chk_n {
                while i < beatlgth && s(i) - s(i - 1) > (max_slope >> 2) {
                    i += 1;
                }
                offset = i;
            }
            i = offset;

            // A significant downslope following the upslope extends the
            // offset.
            while i < beatlgth && i < offset + p.ms40 && s(i - 1) - s(i) < (max_slope >> 2) {
                i += 1;
            }
            if i < offset + p.ms40 {
                while i < beatlgth && s(i - 1) - s(i) > (max_slope >> 2) {
                    i += 1;
                }
                offset = i;
            }
        }

        // Reconcile the slope-based points with the isoelectric searches.
        if iso_start == self.iso_length1 - 1 && onset > iso_start {
            iso_start = onset;
        } else if onset - iso_start < p.ms50 {
            onset = iso_start;
        }
        if iso_end - offset < p.ms50 {
            offset = iso_end;
        }
        let iso_level = s(iso_start);

        // Extremes within the QRS, for the deep-S test below.
        let mut max_v = s(onset);
        let mut min_v = max_v;
        for i in onset..offset {
            if s(i) > max_v {
                max_v = s(i);
            } else if s(i) < min_v {
                min_v = s(i);
            }
        }

        // If the offset sits well below the onset on a falling edge, carry
        // the offset across the following upslope.
        if s(onset) - s(offset) > ((max_v - min_v) >> 2) + ((max_v - min_v) >> 3) {
            let mut i = offset;
            let mut max_slope_i = offset;
            let mut max_slope = s(offset) - s(offset - 1);
            while i < offset + p.ms100 && i < beatlgth {
                let slope = s(i) - s(i - 1);
                if slope > max_slope {
                    max_slope = slope;
                    max_slope_i = i;
                }
                i += 1;
            }
            if max_slope > 0 {
                let mut i = max_slope_i;
                while i < beatlgth && s(i) - s(i - 1) > (max_slope >> 1) {
                    i += 1;
                }
                offset = i;
            }
        }

        // Beat begin: an isoelectric anchor at least 250 ms before the
        // R-wave, refined toward the QRS when the far search succeeds
        // immediately.
        let mut i = fid - p.ms250;
        while i > p.ms80 && !self.iso_check(&beat[(i - p.ms80) as usize..], p.ms80) {
            i -= 1;
        }
        let mut beat_begin = i;

        if beat_begin == fid - p.ms250 {
            while i < onset - p.ms50 && self.iso_check(&beat[(i - p.ms80) as usize..], p.ms80) {
                i += 1;
            }
            beat_begin = i - 1;
        } else if beat_begin == p.ms80 {
            while i < onset && !self.iso_check(&beat[(i - p.ms80) as usize..], p.ms80) {
                i += 1;
            }
            if i < onset {
                while i < onset && self.iso_check(&beat[(i - p.ms80) as usize..], p.ms80) {
                    i += 1;
                }
                if i < onset {
                    beat_begin = i - 1;
                }
            }
        }

        // Beat end: first isoelectric segment at least 300 ms after the
        // R-wave.
        let mut i = fid + p.ms300;
        while i < beatlgth && !self.iso_check(&beat[i as usize..], p.ms80) {
            i += 1;
        }
        let beat_end = i;

        // Beat amplitude over the final onset..offset span.
        let mut max_v = s(onset);
        let mut min_v = max_v;
        for i in onset..offset {
            if s(i) > max_v {
                max_v = s(i);
            } else if s(i) < min_v {
                min_v = s(i);
            }
        }

        BeatFeatures {
            onset,
            offset,
            iso_level,
            beat_begin,
            beat_end,
            amp: max_v - min_v,
        }
    }
}
