//! Morphology template bank and beat matching.
//!
//! Beats are matched to previously seen beat types point by point over a
//! 300 ms region centered on the fiducial mark, trying a small range of
//! alignments and (for the primary metric) scaling the candidate to the
//! template's peak-to-peak amplitude. The bank holds at most
//! [`MAX_TYPES`](crate::params::MAX_TYPES) templates; beats that match
//! update their template by exponential averaging, close pairs of
//! templates are merged, and when the bank is full the least interesting
//! template is evicted.
//!
//! Template slots shift down on merge and are recycled on eviction; the
//! dominant monitor is informed of every slot move so its per-slot history
//! stays consistent.

use log::debug;

use crate::beat_analysis::BeatAnalyzer;
use crate::classify::DominantMonitor;
use crate::params::{BeatParams, MATCH_HISTORY, MAX_TYPES};
use crate::post_classify::PostClassifier;
use crate::types::BeatClass;

/// Match limit for considering two templates mergeable candidates.
const MATCH_LIMIT: f64 = 1.2;
/// Similarity limit below which two templates are actually combined.
const COMBINE_LIMIT: f64 = 0.8;
/// Average match-history level above which a type counts as noisy.
const WIDE_VAR_LIMIT: f64 = 0.50;

/// Outcome of matching a new beat against the template bank.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    /// Index of the best-matching template.
    pub match_type: usize,
    /// Scaled match metric for that template (large when the bank is
    /// empty, so a new type is always created).
    pub match_index: f64,
    /// Unscaled (amplitude-sensitive) match metric for the same template.
    pub mi2: f64,
    /// Alignment shift that produced the best match.
    pub shift: i32,
}

/// Template bank with morphology matching.
#[derive(Debug, Clone)]
pub struct BeatMatcher {
    fidmark: i32,
    beatlgth: i32,
    match_length: i32,
    match_start: i32,
    match_end: i32,
    max_shift: i32,

    templates: Vec<Vec<i32>>,
    counts: [i32; MAX_TYPES],
    widths: [i32; MAX_TYPES],
    classes: [BeatClass; MAX_TYPES],
    begins: [i32; MAX_TYPES],
    ends: [i32; MAX_TYPES],
    since_match: [i32; MAX_TYPES],
    amps: [i32; MAX_TYPES],
    centers: [i32; MAX_TYPES],
    match_history: [[f64; MATCH_HISTORY]; MAX_TYPES],
    type_count: usize,

    analyzer: BeatAnalyzer,
}

impl BeatMatcher {
    /// Create an empty template bank for the given beat-rate parameters.
    pub fn new(params: &BeatParams) -> Self {
        let match_length = params.ms300;
        Self {
            fidmark: params.fidmark,
            beatlgth: params.beatlgth,
            match_length,
            match_start: params.fidmark - match_length / 2,
            match_end: params.fidmark + match_length / 2,
            max_shift: params.ms40,
            templates: vec![vec![0; params.beatlgth as usize]; MAX_TYPES],
            counts: [0; MAX_TYPES],
            widths: [0; MAX_TYPES],
            classes: [BeatClass::Unknown; MAX_TYPES],
            begins: [0; MAX_TYPES],
            ends: [0; MAX_TYPES],
            since_match: [0; MAX_TYPES],
            amps: [0; MAX_TYPES],
            centers: [0; MAX_TYPES],
            match_history: [[0.0; MATCH_HISTORY]; MAX_TYPES],
            type_count: 0,
            analyzer: BeatAnalyzer::new(params),
        }
    }

    /// Number of template slots currently in use.
    pub fn type_count(&self) -> usize {
        self.type_count
    }

    /// Number of beats matched to a given type.
    pub fn count_of(&self, ty: usize) -> i32 {
        self.counts[ty]
    }

    /// QRS width estimate for a given type.
    pub fn width_of(&self, ty: usize) -> i32 {
        self.widths[ty]
    }

    /// Midpoint between onset and offset for a given type.
    pub fn center_of(&self, ty: usize) -> i32 {
        self.centers[ty]
    }

    /// Offset of the beat begin (P-wave onset) for a given type.
    pub fn begin_of(&self, ty: usize) -> i32 {
        self.begins[ty]
    }

    /// Offset of the beat end (T-wave offset) for a given type.
    pub fn end_of(&self, ty: usize) -> i32 {
        self.ends[ty]
    }

    /// QRS amplitude estimate for a given type.
    pub fn amp_of(&self, ty: usize) -> i32 {
        self.amps[ty]
    }

    /// Persistent classification for a given type; the pseudo-type equal
    /// to the bank capacity reads as UNKNOWN.
    pub fn class_of(&self, ty: usize) -> BeatClass {
        if ty >= MAX_TYPES {
            return BeatClass::Unknown;
        }
        self.classes[ty]
    }

    /// Set the persistent classification for a type.
    pub fn set_class(&mut self, ty: usize, class: BeatClass) {
        self.classes[ty] = class;
    }

    /// True when all recent match indexes of a type stay below 0.5.
    pub fn minimum_beat_variation(&self, ty: usize) -> bool {
        self.match_history[ty].iter().all(|&mi| mi <= 0.5)
    }

    /// True when the average recent match index of a type exceeds the
    /// wide-variation limit.
    pub fn wide_beat_variation(&self, ty: usize) -> bool {
        let n = (self.counts[ty].min(8)) as usize;
        let ave: f64 = self.match_history[ty][..n].iter().sum::<f64>() / n as f64;
        ave > WIDE_VAR_LIMIT
    }

    /// Undo the most recent [`new_beat_type`](Self::new_beat_type), used
    /// when the new type is suspected to be a baseline-shift artifact.
    pub fn clear_last_new_type(&mut self) {
        if self.type_count != 0 {
            self.type_count -= 1;
        }
    }

    /// The NORMAL-classified type seen most often; once more than 300
    /// beats have accumulated without any NORMAL type, the most frequent
    /// type overall.
    pub fn dominant_type(&self) -> Option<usize> {
        let mut max_count = 0;
        let mut max_type = None;
        for ty in 0..MAX_TYPES {
            if self.classes[ty] == BeatClass::Normal && self.counts[ty] > max_count {
                max_type = Some(ty);
                max_count = self.counts[ty];
            }
        }
        if max_type.is_none() {
            let total: i32 = self.counts[..self.type_count].iter().sum();
            if total > 300 {
                for ty in 0..self.type_count {
                    if self.counts[ty] > max_count {
                        max_type = Some(ty);
                        max_count = self.counts[ty];
                    }
                }
            }
        }
        max_type
    }

    /// Similarity index between a type and the dominant type, unscaled.
    pub fn dom_compare(&self, new_type: usize, dom_type: Option<usize>) -> f64 {
        let dom = dom_type.unwrap_or(0).min(MAX_TYPES - 1);
        let new_type = new_type.min(MAX_TYPES - 1);
        self.compare_unscaled(&self.templates[dom], &self.templates[new_type])
            .0
    }

    /// Similarity index between a raw beat and the dominant type,
    /// unscaled.
    pub fn dom_compare_beat(&self, new_beat: &[i32], dom_type: Option<usize>) -> f64 {
        let dom = dom_type.unwrap_or(0);
        self.compare_unscaled(&self.templates[dom], new_beat).0
    }

    /// Compare two beats point by point over the match window, scaling
    /// `beat2` to `beat1`'s peak-to-peak amplitude and trying every
    /// alignment within the shift range. Returns the best metric and the
    /// shift that produced it.
    fn compare(&self, beat1: &[i32], beat2: &[i32]) -> (f64, i32) {
        let start = self.match_start as usize;
        let end = self.match_end as usize;

        let mut max = beat1[start];
        let mut min = max;
        for &v in &beat1[start + 1..end] {
            if v > max {
                max = v;
            } else if v < min {
                min = v;
            }
        }
        let mag_sum = (max - min) as i64;

        let mut max = beat2[start];
        let mut min = max;
        for &v in &beat2[start + 1..end] {
            if v > max {
                max = v;
            } else if v < min {
                min = v;
            }
        }
        let scale_factor = mag_sum as f64 / (max - min) as f64;
        let mag_sum = mag_sum * 2;

        let half = self.match_length >> 1;
        let mut min_diff = 0i64;
        let mut min_shift = -self.max_shift;
        for shift in -self.max_shift..=self.max_shift {
            let mut mean_diff = 0i64;
            for i in (self.fidmark - half)..(self.fidmark + half) {
                let scaled = beat2[(i + shift) as usize] as f64 * scale_factor;
                mean_diff = (mean_diff as f64 + (beat1[i as usize] as f64 - scaled)) as i64;
            }
            mean_diff /= self.match_length as i64;

            let mut beat_diff = 0i64;
            for i in (self.fidmark - half)..(self.fidmark + half) {
                let scaled = beat2[(i + shift) as usize] as f64 * scale_factor;
                beat_diff = (beat_diff as f64
                    + (beat1[i as usize] as f64 - mean_diff as f64 - scaled).abs())
                    as i64;
            }

            if shift == -self.max_shift || beat_diff < min_diff {
                min_diff = beat_diff;
                min_shift = shift;
            }
        }

        // The metric scales inversely with the match length; the rules were
        // tuned with a match length of 30.
        let mut metric = min_diff as f64;
        metric /= mag_sum as f64;
        metric *= 30.0;
        metric /= self.match_length as f64;
        (metric, min_shift)
    }

    /// Same comparison without amplitude scaling; the metric divides by
    /// the combined amplitude of the two beats.
    fn compare_unscaled(&self, beat1: &[i32], beat2: &[i32]) -> (f64, i32) {
        let start = self.match_start as usize;
        let end = self.match_end as usize;

        let mut max = beat1[start];
        let mut min = max;
        for &v in &beat1[start + 1..end] {
            if v > max {
                max = v;
            } else if v < min {
                min = v;
            }
        }
        let mag1 = (max - min) as i64;

        let mut max = beat2[start];
        let mut min = max;
        for &v in &beat2[start + 1..end] {
            if v > max {
                max = v;
            } else if v < min {
                min = v;
            }
        }
        let mag2 = (max - min) as i64;

        let half = self.match_length >> 1;
        let mut min_diff = 0i64;
        let mut min_shift = -self.max_shift;
        for shift in -self.max_shift..=self.max_shift {
            let mut mean_diff = 0i64;
            for i in (self.fidmark - half)..(self.fidmark + half) {
                mean_diff += (beat1[i as usize] - beat2[(i + shift) as usize]) as i64;
            }
            mean_diff /= self.match_length as i64;

            let mut beat_diff = 0i64;
            for i in (self.fidmark - half)..(self.fidmark + half) {
                beat_diff +=
                    (beat1[i as usize] as i64 - mean_diff - beat2[(i + shift) as usize] as i64)
                        .abs();
            }

            if shift == -self.max_shift || beat_diff < min_diff {
                min_diff = beat_diff;
                min_shift = shift;
            }
        }

        let mut metric = min_diff as f64;
        metric /= (mag1 + mag2) as f64;
        metric *= 30.0;
        metric /= self.match_length as f64;
        (metric, min_shift)
    }

    /// Match a new beat against every stored template.
    ///
    /// When the beat lands close to two templates the tie is broken by the
    /// unscaled comparison, and if the two templates themselves are close
    /// enough they are merged (higher slots shift down, and the
    /// post-classifier and dominant monitor are told about the move).
    pub fn best_match(
        &mut self,
        new_beat: &[i32],
        post: &mut PostClassifier,
        dom: &mut DominantMonitor,
    ) -> MatchResult {
        if self.type_count == 0 {
            // No templates yet: report an impossible match index so the
            // classifier starts a new type.
            return MatchResult {
                match_type: 0,
                match_index: 1000.0,
                mi2: 0.0,
                shift: 0,
            };
        }

        let mut best = 0usize;
        let mut next_best = 0usize;
        let mut min_diff = 0.0;
        let mut min_shift = 0;
        let mut next_diff = 10000.0;
        for ty in 0..self.type_count {
            let (beat_diff, shift) = self.compare(&self.templates[ty], new_beat);
            if ty == 0 {
                best = 0;
                min_diff = beat_diff;
                min_shift = shift;
            } else if beat_diff < min_diff {
                next_best = best;
                next_diff = min_diff;
                best = ty;
                min_diff = beat_diff;
                min_shift = shift;
            } else if self.type_count > 1 && ty == 1 {
                next_best = 1;
                next_diff = beat_diff;
            } else if beat_diff < next_diff {
                next_best = ty;
                next_diff = beat_diff;
            }
        }

        if min_diff < MATCH_LIMIT && next_diff < MATCH_LIMIT && self.type_count > 1 {
            // Break the tie without amplitude scaling.
            let (best_diff2, _) = self.compare_unscaled(&self.templates[best], new_beat);
            let (next_diff2, next_shift2) = self.compare_unscaled(&self.templates[next_best], new_beat);
            let mi2;
            if next_diff2 < best_diff2 {
                std::mem::swap(&mut best, &mut next_best);
                min_diff = next_diff;
                min_shift = next_shift2;
                mi2 = best_diff2;
            } else {
                mi2 = next_diff2;
            }

            let (beat_diff, shift) =
                self.compare(&self.templates[best], &self.templates[next_best]);

            if beat_diff < COMBINE_LIMIT && (mi2 < 1.0 || !self.minimum_beat_variation(next_best)) {
                debug!(
                    "combining templates {} and {} (similarity {:.2})",
                    best, next_best, beat_diff
                );
                if best < next_best {
                    for i in 0..self.beatlgth as usize {
                        let is = i as i32 + shift;
                        if is > 0 && is < self.beatlgth {
                            let v = self.templates[next_best][is as usize];
                            self.templates[best][i] = (self.templates[best][i] + v) >> 1;
                        }
                    }
                    self.classes[best] = Self::merge_class(self.classes[best], self.classes[next_best]);
                    self.counts[best] += self.counts[next_best];
                    dom.combine(next_best, best);
                    for ty in next_best..self.type_count - 1 {
                        self.beat_copy(ty + 1, ty, post, dom);
                    }
                } else {
                    for i in 0..self.beatlgth as usize {
                        let v = self.templates[best][i];
                        self.templates[next_best][i] = (self.templates[next_best][i] + v) >> 1;
                    }
                    self.classes[next_best] =
                        Self::merge_class(self.classes[best], self.classes[next_best]);
                    self.counts[next_best] += self.counts[best];
                    dom.combine(best, next_best);
                    for ty in best..self.type_count - 1 {
                        self.beat_copy(ty + 1, ty, post, dom);
                    }
                    best = next_best;
                }
                self.type_count -= 1;
                self.classes[self.type_count] = BeatClass::Unknown;
            }
        }

        let (mi2, _) = self.compare_unscaled(&self.templates[best], new_beat);
        MatchResult {
            match_type: best,
            match_index: min_diff,
            mi2,
            shift: min_shift,
        }
    }

    /// NORMAL dominates PVC dominates UNKNOWN when merging templates.
    fn merge_class(a: BeatClass, b: BeatClass) -> BeatClass {
        if a == BeatClass::Normal || b == BeatClass::Normal {
            BeatClass::Normal
        } else if a == BeatClass::Pvc || b == BeatClass::Pvc {
            BeatClass::Pvc
        } else {
            BeatClass::Unknown
        }
    }

    /// Store a new beat as the next available type; when the bank is full,
    /// evict the template with the fewest occurrences (most stale on
    /// ties) and retire its dominant-monitor history.
    pub fn new_beat_type(&mut self, new_beat: &[i32], dom: &mut DominantMonitor) -> usize {
        for i in 0..self.type_count {
            self.since_match[i] += 1;
        }

        let slot = if self.type_count < MAX_TYPES {
            self.type_count += 1;
            self.type_count - 1
        } else {
            let mut mc = 0;
            for i in 1..MAX_TYPES {
                if self.counts[i] < self.counts[mc] {
                    mc = i;
                } else if self.counts[i] == self.counts[mc]
                    && self.since_match[i] > self.since_match[mc]
                {
                    mc = i;
                }
            }
            debug!("template bank full, evicting type {}", mc);
            dom.adjust(mc, MAX_TYPES);
            mc
        };

        self.templates[slot].copy_from_slice(new_beat);
        self.counts[slot] = 1;
        self.classes[slot] = BeatClass::Unknown;
        self.since_match[slot] = 0;
        self.refresh_features(slot);
        slot
    }

    /// Average a new beat into its matched template (a straight average
    /// when the template holds a single beat, 7/8 + 1/8 thereafter) and
    /// refresh the template's features and match history.
    pub fn update_beat_type(&mut self, ty: usize, new_beat: &[i32], mi2: f64, shift: i32) {
        for i in 0..self.type_count {
            if i != ty {
                self.since_match[i] += 1;
            } else {
                self.since_match[i] = 0;
            }
        }

        if self.counts[ty] == 1 {
            for i in 0..self.beatlgth as usize {
                let is = i as i32 + shift;
                if is >= 0 && is < self.beatlgth {
                    self.templates[ty][i] =
                        (self.templates[ty][i] + new_beat[is as usize]) >> 1;
                }
            }
        } else {
            for i in 0..self.beatlgth as usize {
                let is = i as i32 + shift;
                if is >= 0 && is < self.beatlgth {
                    let blended =
                        ((self.templates[ty][i] as i64 * 7) + new_beat[is as usize] as i64) >> 3;
                    self.templates[ty][i] = blended as i32;
                }
            }
        }

        self.refresh_features(ty);
        self.counts[ty] += 1;

        for i in (1..MATCH_HISTORY).rev() {
            self.match_history[ty][i] = self.match_history[ty][i - 1];
        }
        self.match_history[ty][0] = mi2;
    }

    /// Re-derive the geometry features of a template slot.
    fn refresh_features(&mut self, slot: usize) {
        let f = self.analyzer.analyze(&self.templates[slot]);
        self.widths[slot] = f.offset - f.onset;
        self.centers[slot] = (f.offset + f.onset) / 2;
        self.begins[slot] = f.beat_begin;
        self.ends[slot] = f.beat_end;
        self.amps[slot] = f.amp;
    }

    /// Move a template slot (merge/evict bookkeeping), carrying the
    /// post-classifier rows and rewriting the dominant monitor's history.
    fn beat_copy(
        &mut self,
        src: usize,
        dest: usize,
        post: &mut PostClassifier,
        dom: &mut DominantMonitor,
    ) {
        let beat = self.templates[src].clone();
        self.templates[dest].copy_from_slice(&beat);

        self.counts[dest] = self.counts[src];
        self.widths[dest] = self.widths[src];
        self.centers[dest] = self.centers[src];
        post.copy_type(src, dest);
        self.classes[dest] = self.classes[src];
        self.begins[dest] = self.begins[src];
        self.ends[dest] = self.begins[src];
        self.since_match[dest] = self.since_match[src];
        self.amps[dest] = self.amps[src];

        dom.adjust(src, dest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::DetectionParams;

    fn params() -> BeatParams {
        BeatParams::new(100)
    }

    fn fixtures() -> (BeatMatcher, PostClassifier, DominantMonitor) {
        let bp = params();
        let qp = DetectionParams::new(200);
        (
            BeatMatcher::new(&bp),
            PostClassifier::new(),
            DominantMonitor::new(&bp, &qp),
        )
    }

    /// A beat with a triangular QRS of the given amplitude and half-width.
    fn shaped_beat(amp: i32, half_width: i32) -> Vec<i32> {
        let p = params();
        let mut beat = vec![0; p.beatlgth as usize];
        let fid = p.fidmark;
        for k in 0..half_width {
            let v = amp * (k + 1) / half_width;
            beat[(fid - half_width + k) as usize] = v;
            beat[(fid + half_width - k) as usize] = v;
        }
        beat[fid as usize] = amp;
        beat
    }

    #[test]
    fn test_empty_bank_reports_no_match() {
        let (mut m, mut post, mut dom) = fixtures();
        let beat = shaped_beat(300, 4);
        let r = m.best_match(&beat, &mut post, &mut dom);
        assert_eq!(m.type_count(), 0);
        assert!(r.match_index > 100.0);
    }

    #[test]
    fn test_identical_beat_matches_perfectly() {
        let (mut m, mut post, mut dom) = fixtures();
        let beat = shaped_beat(300, 4);
        m.new_beat_type(&beat, &mut dom);
        let r = m.best_match(&beat, &mut post, &mut dom);
        assert_eq!(r.match_type, 0);
        assert!(r.match_index < 0.1, "match_index = {}", r.match_index);
        assert!(r.mi2 < 0.1, "mi2 = {}", r.mi2);
        assert_eq!(r.shift, 0);
        assert_eq!(m.amp_of(0), 300);
    }

    #[test]
    fn test_different_morphology_matches_poorly() {
        let (mut m, mut post, mut dom) = fixtures();
        m.new_beat_type(&shaped_beat(300, 3), &mut dom);
        // Wide, inverted beat.
        let p = params();
        let mut other = vec![0; p.beatlgth as usize];
        for k in 0..12 {
            let v = -400 * (k + 1) / 12;
            other[(p.fidmark - 12 + k) as usize] = v;
            other[(p.fidmark + 12 - k) as usize] = v;
        }
        other[p.fidmark as usize] = -400;
        let r = m.best_match(&other, &mut post, &mut dom);
        assert!(r.match_index > MATCH_LIMIT, "match_index = {}", r.match_index);
    }

    #[test]
    fn test_type_count_never_exceeds_capacity() {
        let (mut m, _post, mut dom) = fixtures();
        for k in 0..(MAX_TYPES + 3) {
            let beat = shaped_beat(200 + 150 * k as i32, 2 + (k % 6) as i32);
            m.new_beat_type(&beat, &mut dom);
            assert!(m.type_count() <= MAX_TYPES);
        }
        assert_eq!(m.type_count(), MAX_TYPES);
    }

    #[test]
    fn test_eviction_picks_fewest_occurrences() {
        let (mut m, _post, mut dom) = fixtures();
        for k in 0..MAX_TYPES {
            let beat = shaped_beat(200 + 150 * k as i32, 2 + (k % 6) as i32);
            let slot = m.new_beat_type(&beat, &mut dom);
            assert_eq!(slot, k);
        }
        // Bump every template's count except slot 3.
        for ty in 0..MAX_TYPES {
            if ty != 3 {
                let beat = m.templates[ty].clone();
                m.update_beat_type(ty, &beat, 0.0, 0);
            }
        }
        let slot = m.new_beat_type(&shaped_beat(900, 7), &mut dom);
        assert_eq!(slot, 3);
        assert_eq!(m.count_of(3), 1);
    }

    #[test]
    fn test_eviction_ties_break_by_staleness() {
        let (mut m, _post, mut dom) = fixtures();
        for k in 0..MAX_TYPES {
            m.new_beat_type(&shaped_beat(200 + 150 * k as i32, 2 + (k % 6) as i32), &mut dom);
        }
        // All counts equal; staleness increases toward earlier slots, and
        // slot 0 is the most stale.
        let slot = m.new_beat_type(&shaped_beat(950, 8), &mut dom);
        assert_eq!(slot, 0);
    }

    #[test]
    fn test_update_blends_toward_new_beat() {
        let (mut m, _post, mut dom) = fixtures();
        let a = shaped_beat(320, 4);
        m.new_beat_type(&a, &mut dom);
        // Second beat: straight average.
        let b = shaped_beat(160, 4);
        m.update_beat_type(0, &b, 0.1, 0);
        let fid = params().fidmark as usize;
        assert_eq!(m.templates[0][fid], 240);
        assert_eq!(m.count_of(0), 2);
        // Third beat: 7/8 template + 1/8 beat.
        m.update_beat_type(0, &b, 0.1, 0);
        assert_eq!(m.templates[0][fid], (240 * 7 + 160) >> 3);
    }

    #[test]
    fn test_match_history_gates_minimum_variation() {
        let (mut m, _post, mut dom) = fixtures();
        let a = shaped_beat(320, 4);
        m.new_beat_type(&a, &mut dom);
        assert!(m.minimum_beat_variation(0));
        for _ in 0..MATCH_HISTORY {
            m.update_beat_type(0, &a, 0.2, 0);
        }
        assert!(m.minimum_beat_variation(0));
        m.update_beat_type(0, &a, 0.9, 0);
        assert!(!m.minimum_beat_variation(0));
    }

    #[test]
    fn test_wide_beat_variation_averages_history() {
        let (mut m, _post, mut dom) = fixtures();
        let a = shaped_beat(320, 4);
        m.new_beat_type(&a, &mut dom);
        for _ in 0..8 {
            m.update_beat_type(0, &a, 0.8, 0);
        }
        assert!(m.wide_beat_variation(0));
        for _ in 0..8 {
            m.update_beat_type(0, &a, 0.1, 0);
        }
        assert!(!m.wide_beat_variation(0));
    }

    #[test]
    fn test_clear_last_new_type() {
        let (mut m, _post, mut dom) = fixtures();
        m.new_beat_type(&shaped_beat(300, 4), &mut dom);
        assert_eq!(m.type_count(), 1);
        m.clear_last_new_type();
        assert_eq!(m.type_count(), 0);
        // Clearing an empty bank is a no-op.
        m.clear_last_new_type();
        assert_eq!(m.type_count(), 0);
    }

    #[test]
    fn test_dominant_type_prefers_normal() {
        let (mut m, _post, mut dom) = fixtures();
        m.new_beat_type(&shaped_beat(300, 4), &mut dom);
        m.new_beat_type(&shaped_beat(700, 9), &mut dom);
        assert_eq!(m.dominant_type(), None);
        m.set_class(1, BeatClass::Normal);
        assert_eq!(m.dominant_type(), Some(1));
        // A more frequent NORMAL type wins.
        m.set_class(0, BeatClass::Normal);
        let beat = m.templates[0].clone();
        m.update_beat_type(0, &beat, 0.1, 0);
        assert_eq!(m.dominant_type(), Some(0));
    }

    #[test]
    fn test_merge_class_precedence() {
        use BeatClass::*;
        assert_eq!(BeatMatcher::merge_class(Normal, Pvc), Normal);
        assert_eq!(BeatMatcher::merge_class(Pvc, Unknown), Pvc);
        assert_eq!(BeatMatcher::merge_class(Unknown, Unknown), Unknown);
        assert_eq!(BeatMatcher::merge_class(Unknown, Normal), Normal);
    }

    #[test]
    fn test_close_templates_are_merged() {
        let (mut m, mut post, mut dom) = fixtures();
        // Two nearly identical templates.
        m.new_beat_type(&shaped_beat(300, 4), &mut dom);
        m.new_beat_type(&shaped_beat(310, 4), &mut dom);
        m.set_class(0, BeatClass::Normal);
        assert_eq!(m.type_count(), 2);
        // A beat close to both triggers the combine path.
        let r = m.best_match(&shaped_beat(305, 4), &mut post, &mut dom);
        assert_eq!(m.type_count(), 1);
        assert_eq!(r.match_type, 0);
        assert_eq!(m.class_of(0), BeatClass::Normal);
        assert_eq!(m.count_of(0), 2);
    }
}
