//! Beat classification.
//!
//! [`BeatClassifier`] owns the template bank, rhythm checker,
//! post-classifier, beat analyzer and dominant monitor, and runs the full
//! per-beat decision sequence: noise gauging, rhythm labeling, baseline
//! shift review, template disposition, dominant-type maintenance,
//! retrospective classification, and finally a short-circuited rule
//! cascade that labels the beat NORMAL, PVC, or UNKNOWN.
//!
//! The collaborators form a cycle in the original design (the matcher
//! reports template moves back to the dominant monitor and the
//! post-classifier). Here the classifier owns all of them as sibling
//! fields and passes disjoint mutable borrows downward, so the cycle
//! never materializes as aliasing.

use log::debug;

use crate::beat_analysis::BeatAnalyzer;
use crate::matcher::BeatMatcher;
use crate::params::{BeatParams, DetectionParams, MAX_TYPES};
use crate::post_classify::PostClassifier;
use crate::rhythm_check::RhythmChecker;
use crate::types::{BeatClass, BeatVerdict};

// Template disposition limits.
const MATCH_LIMIT: f64 = 1.3;
const MATCH_WITH_AMP_LIMIT: f64 = 2.5;
const PVC_MATCH_WITH_AMP_LIMIT: f64 = 0.9;
const BL_SHIFT_LIMIT: i32 = 100;
const NEW_TYPE_NOISE_THRESHOLD: i32 = 18;
const NEW_TYPE_HF_NOISE_LIMIT: i32 = 75;
const MATCH_NOISE_THRESHOLD: f64 = 0.7;

// Rule cascade thresholds on the dominant similarity index.
const R2_DI_THRESHOLD: f64 = 1.0;
const R7_DI_THRESHOLD: f64 = 1.2;
const R8_DI_THRESHOLD: f64 = 1.5;
const R9_DI_THRESHOLD: f64 = 2.0;
const R10_BC_LIM: i32 = 3;
const R10_DI_THRESHOLD: f64 = 2.5;
const R11_HF_THRESHOLD: i32 = 45;
const R11_MA_THRESHOLD: i32 = 14;
const R11_BC_LIM: i32 = 1;
const R15_DI_THRESHOLD: f64 = 3.5;
const R18_DI_THRESHOLD: f64 = 1.5;
const R19_HF_THRESHOLD: i32 = 75;

/// Length of the dominant monitor's beat history ring.
pub const DM_BUFFER_LENGTH: usize = 180;
/// Irregular-beat count above which the dominant rhythm is not regular.
pub const IRREG_RR_LIMIT: i32 = 60;

/// Result of classifying one beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifyResult {
    /// Label for this beat, or the trailing-edge sentinel the
    /// orchestrator must swallow.
    pub verdict: BeatVerdict,
    /// Template index the beat matched (the bank capacity when no
    /// template was recorded).
    pub template: usize,
    /// Fiducial-mark correction derived from the matched template's
    /// center, in beat-rate samples.
    pub fid_adj: i32,
}

/// Tracks which morphology is dominant over the last
/// [`DM_BUFFER_LENGTH`] beats.
///
/// The dominant morphology is the one most frequently considered normal
/// looking; the dominant rhythm is regular while no more than
/// [`IRREG_RR_LIMIT`] of the remembered beats carried an UNKNOWN rhythm.
#[derive(Debug, Clone)]
pub struct DominantMonitor {
    fidmark: i32,
    beat_ms130: i32,
    rate_ratio: i32,

    beat_types: [i32; DM_BUFFER_LENGTH],
    beat_classes: [i32; DM_BUFFER_LENGTH],
    beat_rhythms: [BeatClass; DM_BUFFER_LENGTH],
    norm_counts: [i32; MAX_TYPES],
    beat_counts: [i32; MAX_TYPES],
    irreg_count: i32,
    br_index: usize,
}

impl DominantMonitor {
    /// Create an empty monitor.
    pub fn new(beat_params: &BeatParams, qrs_params: &DetectionParams) -> Self {
        Self {
            fidmark: beat_params.fidmark,
            beat_ms130: beat_params.ms130,
            rate_ratio: qrs_params.sample_rate / beat_params.beat_sample_rate,
            beat_types: [-1; DM_BUFFER_LENGTH],
            beat_classes: [0; DM_BUFFER_LENGTH],
            beat_rhythms: [BeatClass::Unknown; DM_BUFFER_LENGTH],
            norm_counts: [0; MAX_TYPES],
            beat_counts: [0; MAX_TYPES],
            irreg_count: 0,
            br_index: 0,
        }
    }

    /// Record one beat and return the current dominant type.
    pub(crate) fn update(
        &mut self,
        matcher: &mut BeatMatcher,
        morph_type: usize,
        rhythm_class: BeatClass,
        beat_width: i32,
        rr: i32,
    ) -> Option<usize> {
        // Type of the beat before the last one, for the P-R interval rule.
        let mut i = self.br_index as i32 - 2;
        if i < 0 {
            i += DM_BUFFER_LENGTH as i32;
        }
        let old_type = self.beat_types[i as usize];

        // Once the ring has wrapped, retire the slot we are about to
        // overwrite.
        let br = self.br_index;
        let t = self.beat_types[br];
        if t != -1 && t != MAX_TYPES as i32 {
            self.beat_counts[t as usize] -= 1;
            self.norm_counts[t as usize] -= self.beat_classes[br];
            if self.beat_rhythms[br] == BeatClass::Unknown {
                self.irreg_count -= 1;
            }
        }

        if morph_type != MAX_TYPES {
            self.beat_types[br] = morph_type as i32;
            self.beat_counts[morph_type] += 1;
            self.beat_rhythms[br] = rhythm_class;
            if rhythm_class == BeatClass::Unknown {
                self.irreg_count += 1;
            }

            // Beats of this type in a row, capped at six.
            let mut i = br as i32 - 1;
            if i < 0 {
                i += DM_BUFFER_LENGTH as i32;
            }
            let mut run_count = 0;
            while self.beat_types[i as usize] == morph_type as i32 && run_count < 6 {
                run_count += 1;
                i -= 1;
                if i < 0 {
                    i += DM_BUFFER_LENGTH as i32;
                }
            }

            // Normal looking: regular rhythm, narrow, and at least one
            // same-type predecessor.
            if rhythm_class == BeatClass::Normal && beat_width < self.beat_ms130 && run_count >= 1 {
                self.beat_classes[br] = 1;
                self.norm_counts[morph_type] += 1;
            }
            // Or: the last beat fell within this type's P-R interval and
            // the beat before it was this type, so the last beat was
            // probably noise.
            else if rr < (self.fidmark - matcher.begin_of(morph_type)) * self.rate_ratio
                && old_type == morph_type as i32
            {
                self.beat_classes[br] = 1;
                self.norm_counts[morph_type] += 1;
            } else {
                self.beat_classes[br] = 0;
            }
        } else {
            self.beat_classes[br] = 0;
            self.beat_types[br] = -1;
        }

        self.br_index += 1;
        if self.br_index == DM_BUFFER_LENGTH {
            self.br_index = 0;
        }

        // The slot with the most normal-looking beats wins; fall back to
        // the template bank's frequency-based dominant when the normal
        // counts are empty or badly outnumbered.
        let mut dom = 0usize;
        for i in 1..MAX_TYPES {
            if self.norm_counts[i] > self.norm_counts[dom] {
                dom = i;
            }
        }
        let mut max = 0usize;
        for i in 1..MAX_TYPES {
            if self.beat_counts[i] > self.beat_counts[max] {
                max = i;
            }
        }

        let mut dom = dom as i32;
        if self.norm_counts[dom as usize] == 0
            || self.beat_counts[max] / self.beat_counts[dom as usize] >= 2
        {
            dom = matcher.dominant_type().map(|t| t as i32).unwrap_or(-1);
        } else if self.beat_counts[dom as usize] / self.norm_counts[dom as usize] >= 2 {
            dom = matcher.dominant_type().map(|t| t as i32).unwrap_or(-1);
        }

        // Demote NORMAL templates that no longer look normal at all.
        for i in 0..MAX_TYPES {
            if self.beat_counts[i] > 10
                && self.norm_counts[i] == 0
                && i as i32 != dom
                && matcher.class_of(i) == BeatClass::Normal
            {
                debug!("demoting inconsistent NORMAL template {} to UNKNOWN", i);
                matcher.set_class(i, BeatClass::Unknown);
            }
        }

        if dom < 0 {
            None
        } else {
            Some(dom as usize)
        }
    }

    /// Whether the dominant rhythm has been regular.
    pub fn rhythm_regular(&self) -> bool {
        self.irreg_count <= IRREG_RR_LIMIT
    }

    /// Rewrite one template slot's history as another (eviction retires a
    /// slot by moving it to the bank capacity).
    pub(crate) fn adjust(&mut self, old_type: usize, new_type: usize) {
        for t in self.beat_types.iter_mut() {
            if *t == old_type as i32 {
                *t = new_type as i32;
            }
        }
        if new_type != MAX_TYPES {
            self.norm_counts[new_type] = self.norm_counts[old_type];
            self.beat_counts[new_type] = self.beat_counts[old_type];
        }
        self.norm_counts[old_type] = 0;
        self.beat_counts[old_type] = 0;
    }

    /// Fold one template slot's history into another (template merge).
    pub(crate) fn combine(&mut self, old_type: usize, new_type: usize) {
        for t in self.beat_types.iter_mut() {
            if *t == old_type as i32 {
                *t = new_type as i32;
            }
        }
        if new_type != MAX_TYPES {
            self.norm_counts[new_type] += self.norm_counts[old_type];
            self.beat_counts[new_type] += self.beat_counts[old_type];
        }
        self.norm_counts[old_type] = 0;
        self.beat_counts[old_type] = 0;
    }
}

/// Rule-based beat classifier.
#[derive(Debug, Clone)]
pub struct BeatClassifier {
    params: BeatParams,
    matcher: BeatMatcher,
    rhythm: RhythmChecker,
    post: PostClassifier,
    analyzer: BeatAnalyzer,
    dom: DominantMonitor,

    recent_rrs: [i32; 8],
    recent_types: [usize; 8],
    last_iso_level: i32,
    last_rhythm_class: BeatClass,
    last_beat_was_new: bool,
}

impl BeatClassifier {
    /// Create a classifier for the given parameter bundles.
    pub fn new(qrs_params: &DetectionParams, beat_params: &BeatParams) -> Self {
        Self {
            params: beat_params.clone(),
            matcher: BeatMatcher::new(beat_params),
            rhythm: RhythmChecker::new(qrs_params),
            post: PostClassifier::new(),
            analyzer: BeatAnalyzer::new(beat_params),
            dom: DominantMonitor::new(beat_params, qrs_params),
            recent_rrs: [0; 8],
            recent_types: [0; 8],
            last_iso_level: 0,
            last_rhythm_class: BeatClass::Unknown,
            last_beat_was_new: false,
        }
    }

    /// Whether the most recent beat was part of a bigeminal rhythm.
    pub fn is_bigeminy(&self) -> bool {
        self.rhythm.is_bigeminy()
    }

    /// Number of morphology templates currently in the bank.
    pub fn template_count(&self) -> usize {
        self.matcher.type_count()
    }

    /// Beat begin/end offsets of the dominant template (beat-rate
    /// absolute indices), when a dominant type exists.
    pub fn dominant_bounds(&self) -> Option<(i32, i32)> {
        let dom = self.matcher.dominant_type()?;
        Some((self.matcher.begin_of(dom), self.matcher.end_of(dom)))
    }

    /// Classify one beat buffer given its RR interval and the low
    /// frequency noise estimate. The buffer is shifted to a zero
    /// isoelectric level in place.
    pub fn classify(&mut self, beat: &mut [i32], rr: i32, noise_level: i32) -> ClassifyResult {
        let mut noise_level = noise_level;
        let mut hf_noise = self.hf_noise_check(beat);
        let rhythm_class = self.rhythm.check(rr);

        let features = self.analyzer.analyze(beat);
        let mut bl_shift = (self.last_iso_level - features.iso_level).abs();
        self.last_iso_level = features.iso_level;

        // Make the isoelectric level zero.
        for v in beat.iter_mut() {
            *v -= features.iso_level;
        }

        // A large baseline shift right after a new type was created means
        // the new type was probably an artifact of the shift.
        if bl_shift > BL_SHIFT_LIMIT
            && self.last_beat_was_new
            && self.last_rhythm_class == BeatClass::Normal
            && rhythm_class == BeatClass::Normal
        {
            debug!("revoking template created across a baseline shift");
            self.matcher.clear_last_new_type();
        }
        self.last_beat_was_new = false;

        let m = self.matcher.best_match(beat, &mut self.post, &mut self.dom);
        let mut morph_type = m.match_type;

        // A very good match overrides the noise indications.
        if m.match_index < MATCH_NOISE_THRESHOLD {
            hf_noise = 0;
            noise_level = 0;
            bl_shift = 0;
        }

        // Template disposition. Premature beats get a stricter match
        // limit so a PVC near the dominant shape still starts its own
        // type.
        if m.match_index < MATCH_LIMIT
            && rhythm_class == BeatClass::Pvc
            && self.matcher.minimum_beat_variation(morph_type)
            && m.mi2 > PVC_MATCH_WITH_AMP_LIMIT
        {
            morph_type = self.matcher.new_beat_type(beat, &mut self.dom);
            self.last_beat_was_new = true;
        } else if m.match_index < MATCH_LIMIT && m.mi2 <= MATCH_WITH_AMP_LIMIT {
            self.matcher.update_beat_type(morph_type, beat, m.mi2, m.shift);
        } else if bl_shift < BL_SHIFT_LIMIT
            && noise_level < NEW_TYPE_NOISE_THRESHOLD
            && hf_noise < NEW_TYPE_HF_NOISE_LIMIT
        {
            morph_type = self.matcher.new_beat_type(beat, &mut self.dom);
            self.last_beat_was_new = true;
        } else if self.last_rhythm_class != BeatClass::Normal || rhythm_class != BeatClass::Normal {
            morph_type = self.matcher.new_beat_type(beat, &mut self.dom);
            self.last_beat_was_new = true;
        } else {
            // Noisy and regular: don't waste a template slot.
            morph_type = MAX_TYPES;
        }

        for i in (1..8).rev() {
            self.recent_rrs[i] = self.recent_rrs[i - 1];
            self.recent_types[i] = self.recent_types[i - 1];
        }
        self.recent_rrs[0] = rr;
        self.recent_types[0] = morph_type;

        self.last_rhythm_class = rhythm_class;

        // Beat features from the matched template, falling back to this
        // beat's own geometry when the template is young and looks wide.
        let stale_class = self.matcher.class_of(morph_type);
        let mut beat_width;
        let mut fid_adj;
        if morph_type != MAX_TYPES {
            beat_width = self.matcher.width_of(morph_type);
            fid_adj = self.matcher.center_of(morph_type) - self.params.fidmark;
            if beat_width > features.offset - features.onset
                && self.matcher.count_of(morph_type) <= 4
            {
                beat_width = features.offset - features.onset;
                fid_adj = (features.offset + features.onset) / 2 - self.params.fidmark;
            }
        } else {
            beat_width = features.offset - features.onset;
            fid_adj = (features.offset + features.onset) / 2 - self.params.fidmark;
        }

        let dom_type =
            self.dom
                .update(&mut self.matcher, morph_type, rhythm_class, beat_width, rr);
        let dom_width = self.matcher.width_of(dom_type.unwrap_or(0));

        let dom_index = if Some(morph_type) != dom_type && morph_type != MAX_TYPES {
            self.matcher.dom_compare(morph_type, dom_type)
        } else if morph_type == MAX_TYPES {
            self.matcher.dom_compare_beat(beat, dom_type)
        } else {
            m.match_index
        };

        self.post.post_classify(
            &self.matcher,
            &self.recent_types,
            dom_type,
            &self.recent_rrs,
            beat_width,
            dom_index,
            rhythm_class,
        );

        let temp_class = self.temp_class(
            rhythm_class,
            morph_type,
            beat_width,
            dom_width,
            dom_type,
            hf_noise,
            noise_level,
            bl_shift,
            dom_index,
        );

        // Run-length classification for morphologies without a persistent
        // class yet.
        if stale_class == BeatClass::Unknown && morph_type < MAX_TYPES {
            let run_count = self.run_count();

            // Three in a row, not too wide: normal. The width test keeps
            // ventricular runs from being called normal during VTACH.
            if run_count >= 3 && dom_type.is_some() && beat_width < dom_width + self.params.ms20 {
                self.matcher.set_class(morph_type, BeatClass::Normal);
            }
            // No dominant type yet: six in a row is normal.
            else if run_count >= 6 && dom_type.is_none() {
                self.matcher.set_class(morph_type, BeatClass::Normal);
            }
            // During bigeminy the premature beats are ventricular unless
            // they are narrow.
            else if self.rhythm.is_bigeminy() {
                if rhythm_class == BeatClass::Pvc && beat_width > self.params.ms100 {
                    self.matcher.set_class(morph_type, BeatClass::Pvc);
                } else if rhythm_class == BeatClass::Normal {
                    self.matcher.set_class(morph_type, BeatClass::Normal);
                }
            }
        }

        // A persistent class wins; otherwise a PVC post-class vote;
        // otherwise the rule cascade verdict.
        let beat_class = self.matcher.class_of(morph_type);
        let class = if beat_class != BeatClass::Unknown {
            beat_class
        } else if self.post.check_post_class(morph_type) == BeatClass::Pvc {
            BeatClass::Pvc
        } else {
            temp_class
        };

        ClassifyResult {
            verdict: BeatVerdict::Beat(class),
            template: morph_type,
            fid_adj,
        }
    }

    /// How many beats of the current type occurred in a row.
    fn run_count(&self) -> i32 {
        let mut i = 1;
        while i < 8 && self.recent_types[0] == self.recent_types[i] {
            i += 1;
        }
        i as i32
    }

    /// Muscle-noise gauge: highpass the beat with a second difference,
    /// average over 50 ms, and take the maximum of that average outside
    /// the QRS as a ratio to the QRS amplitude.
    fn hf_noise_check(&self, beat: &[i32]) -> i32 {
        let p = &self.params;
        let fid = p.fidmark;

        let mut qrs_max = 0;
        let mut qrs_min = 0;
        for i in (fid - p.ms70)..(fid + p.ms80) {
            let v = beat[i as usize];
            if v > qrs_max {
                qrs_max = v;
            } else if v < qrs_min {
                qrs_min = v;
            }
        }

        let ave_length = p.ms50 as usize;
        let mut ave_buff = vec![0i32; ave_length];
        let mut ave_ptr = 0usize;
        let mut sum = 0i32;
        let mut max_noise_ave = 0i32;
        for i in (fid - p.ms280)..(fid + p.ms280) {
            sum -= ave_buff[ave_ptr];
            let second_diff = (beat[i as usize] - (beat[(i - p.ms10) as usize] << 1)
                + beat[(i - 2 * p.ms10) as usize])
                .abs();
            ave_buff[ave_ptr] = second_diff;
            sum += second_diff;
            ave_ptr += 1;
            if ave_ptr == ave_length {
                ave_ptr = 0;
            }
            if (i < fid - p.ms50 || i > fid + p.ms110) && sum > max_noise_ave {
                max_noise_ave = sum;
            }
        }

        if qrs_max - qrs_min >= 4 {
            (max_noise_ave * (50 / p.ms50)) / ((qrs_max - qrs_min) >> 2)
        } else {
            0
        }
    }

    /// The classification rule cascade, applied top to bottom.
    #[allow(clippy::too_many_arguments)]
    fn temp_class(
        &self,
        rhythm_class: BeatClass,
        morph_type: usize,
        beat_width: i32,
        dom_width: i32,
        dom_type: Option<usize>,
        hf_noise: i32,
        noise_level: i32,
        bl_shift: i32,
        dom_index: f64,
    ) -> BeatClass {
        let p = &self.params;

        // Rule 1: without a dominant type everything is unknown.
        let dom = match dom_type {
            None => return BeatClass::Unknown,
            Some(d) => d,
        };

        // Rule 2: stable dominant, premature, sufficiently different.
        if self.matcher.minimum_beat_variation(dom)
            && rhythm_class == BeatClass::Pvc
            && dom_index > R2_DI_THRESHOLD
            && self.dom.rhythm_regular()
        {
            return BeatClass::Pvc;
        }

        // Rule 3: sufficiently narrow beats are normal.
        if beat_width < p.ms90 {
            return BeatClass::Normal;
        }

        // Rule 5: unmatched but not premature; probably noisy.
        if morph_type == MAX_TYPES && rhythm_class != BeatClass::Pvc {
            return BeatClass::Normal;
        }

        // Rule 6: full bank, single occurrence, unknown rhythm.
        if self.matcher.type_count() == MAX_TYPES
            && self.matcher.count_of(morph_type) == 1
            && rhythm_class == BeatClass::Unknown
        {
            return BeatClass::Normal;
        }

        // Rule 7: looks dominant and the rhythm is regular.
        if dom_index < R7_DI_THRESHOLD && rhythm_class == BeatClass::Normal {
            return BeatClass::Normal;
        }

        // Rule 8: close to dominant with a normal post-rhythm.
        if dom_index < R8_DI_THRESHOLD
            && self.post.check_pc_rhythm(&self.matcher, morph_type) == BeatClass::Normal
        {
            return BeatClass::Normal;
        }

        // Rule 9: not premature, similar to a noisy dominant.
        if dom_index < R9_DI_THRESHOLD
            && rhythm_class != BeatClass::Pvc
            && self.matcher.wide_beat_variation(dom)
        {
            return BeatClass::Normal;
        }

        // Rule 10: clearly different, seen repeatedly, PVC post-rhythm,
        // regular dominant rhythm.
        if dom_index > R10_DI_THRESHOLD
            && self.matcher.count_of(morph_type) >= R10_BC_LIM
            && self.post.check_pc_rhythm(&self.matcher, morph_type) == BeatClass::Pvc
            && self.dom.rhythm_regular()
        {
            return BeatClass::Pvc;
        }

        // Rule 11: wide, wider than dominant, clean, and matched more
        // than once.
        if beat_width >= p.ms110
            && ((beat_width - dom_width >= p.ms40 && dom_width < p.ms140)
                || beat_width - dom_width >= p.ms60)
            && hf_noise < R11_HF_THRESHOLD
            && noise_level < R11_MA_THRESHOLD
            && bl_shift < BL_SHIFT_LIMIT
            && morph_type < MAX_TYPES
            && self.matcher.count_of(morph_type) > R11_BC_LIM
        {
            return BeatClass::Pvc;
        }

        // Rule 12: premature against a regular dominant rhythm.
        if rhythm_class == BeatClass::Pvc && self.dom.rhythm_regular() {
            return BeatClass::Pvc;
        }

        // Rule 14: regular against a regular dominant rhythm.
        if rhythm_class == BeatClass::Normal && self.dom.rhythm_regular() {
            return BeatClass::Normal;
        }

        // Rhythm can't help below this point; decide on width and shape.

        // Rule 15: wider than dominant, wide absolutely, very different.
        if beat_width > dom_width && dom_index > R15_DI_THRESHOLD && beat_width >= p.ms100 {
            return BeatClass::Pvc;
        }

        // Rule 16: narrow enough to be normal.
        if beat_width < p.ms100 {
            return BeatClass::Normal;
        }

        // Rule 17: not much wider than the dominant beat.
        if beat_width < dom_width + p.ms20 {
            return BeatClass::Normal;
        }

        // Rule 18: similar to the dominant beat.
        if dom_index < R18_DI_THRESHOLD {
            return BeatClass::Normal;
        }

        // Rule 19: too noisy to trust the width.
        if hf_noise > R19_HF_THRESHOLD {
            return BeatClass::Normal;
        }

        // Rule 20: wide, dissimilar, no rhythm evidence.
        BeatClass::Pvc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> BeatClassifier {
        BeatClassifier::new(&DetectionParams::new(200), &BeatParams::new(100))
    }

    /// Beat buffer with a triangular QRS at the fiducial mark.
    fn beat(amp: i32, half_width: i32) -> Vec<i32> {
        let p = BeatParams::new(100);
        let mut b = vec![0; p.beatlgth as usize];
        let fid = p.fidmark;
        for k in 0..half_width {
            let v = amp * (k + 1) / half_width;
            b[(fid - half_width + k) as usize] = v;
            b[(fid + half_width - k) as usize] = v;
        }
        b[fid as usize] = amp;
        b
    }

    #[test]
    fn test_steady_narrow_beats_become_normal() {
        let mut c = classifier();
        let mut labels = Vec::new();
        for _ in 0..12 {
            let mut b = beat(300, 3);
            let r = c.classify(&mut b, 200, 0);
            match r.verdict {
                BeatVerdict::Beat(class) => labels.push(class),
                BeatVerdict::TrailingEdge => panic!("unexpected trailing edge"),
            }
        }
        // A steady stream of identical narrow beats settles on NORMAL.
        assert!(labels[4..].iter().all(|&c| c == BeatClass::Normal));
        assert_eq!(c.template_count(), 1);
    }

    #[test]
    fn test_single_template_for_identical_beats() {
        let mut c = classifier();
        for _ in 0..20 {
            let mut b = beat(300, 3);
            c.classify(&mut b, 200, 0);
        }
        assert_eq!(c.template_count(), 1);
    }

    #[test]
    fn test_distinct_morphologies_get_templates() {
        let mut c = classifier();
        for i in 0..10 {
            let mut b = if i % 2 == 0 { beat(300, 3) } else { beat(-500, 12) };
            c.classify(&mut b, 200, 0);
        }
        assert!(c.template_count() >= 2);
    }

    #[test]
    fn test_dominant_monitor_count_bounds() {
        let mut c = classifier();
        for i in 0..250 {
            let (mut b, rr) = if i % 5 == 4 {
                (beat(-500, 12), 140)
            } else {
                (beat(300, 3), 215)
            };
            c.classify(&mut b, rr, 0);
            for t in 0..MAX_TYPES {
                assert!(c.dom.norm_counts[t] >= 0);
                assert!(c.dom.norm_counts[t] <= c.dom.beat_counts[t]);
                assert!(c.dom.beat_counts[t] <= DM_BUFFER_LENGTH as i32);
            }
        }
    }

    #[test]
    fn test_hf_noise_low_for_clean_beat() {
        let c = classifier();
        let b = beat(400, 4);
        let clean = c.hf_noise_check(&b);

        // Inject alternating noise outside the QRS.
        let mut noisy = b.clone();
        for (i, v) in noisy.iter_mut().enumerate() {
            if !(30..=55).contains(&i) {
                *v += if i % 2 == 0 { 40 } else { -40 };
            }
        }
        let dirty = c.hf_noise_check(&noisy);
        assert!(dirty > clean);
    }

    #[test]
    fn test_dominant_bounds_follow_dominant_type() {
        let mut c = classifier();
        assert_eq!(c.dominant_bounds(), None);
        for _ in 0..10 {
            let mut b = beat(300, 3);
            c.classify(&mut b, 200, 0);
        }
        let (begin, end) = c.dominant_bounds().expect("dominant established");
        let p = BeatParams::new(100);
        assert!(begin < p.fidmark);
        assert!(end > p.fidmark);
    }

    /// Add a triangular lobe to a beat buffer.
    fn lobe(b: &mut [i32], center: i32, hw: i32, amp: i32) {
        for k in -hw..=hw {
            b[(center + k) as usize] += amp * (hw - k.abs()) / hw;
        }
    }

    #[test]
    fn test_template_cap_evicts_for_new_morphologies() {
        let mut c = classifier();
        let p = BeatParams::new(100);
        let fid = p.fidmark;
        let blank = vec![0i32; p.beatlgth as usize];

        // Eight distinct morphologies: three widths in both polarities,
        // plus two biphasic shapes.
        let mut shapes: Vec<Vec<i32>> = Vec::new();
        for &hw in &[2, 7, 12] {
            for &sign in &[1, -1] {
                let mut b = blank.clone();
                lobe(&mut b, fid, hw, sign * 1200);
                shapes.push(b);
            }
        }
        for &sign in &[1, -1] {
            let mut b = blank.clone();
            lobe(&mut b, fid - 5, 4, sign * 1200);
            lobe(&mut b, fid + 5, 4, -sign * 1200);
            shapes.push(b);
        }

        for (i, shape) in shapes.iter().enumerate() {
            let mut b = shape.clone();
            c.classify(&mut b, 200, 0);
            assert_eq!(c.template_count(), i + 1);
        }
        assert_eq!(c.template_count(), MAX_TYPES);

        // A ninth morphology evicts rather than growing the bank, and
        // its template sticks around to match the next occurrence.
        let mut m_shape = blank.clone();
        lobe(&mut m_shape, fid - 5, 4, 1200);
        lobe(&mut m_shape, fid + 5, 4, 1200);

        let mut b = m_shape.clone();
        let first = c.classify(&mut b, 200, 0);
        assert_eq!(c.template_count(), MAX_TYPES);
        assert!(first.template < MAX_TYPES);

        let mut b = m_shape.clone();
        let second = c.classify(&mut b, 200, 0);
        assert_eq!(c.template_count(), MAX_TYPES);
        assert_eq!(second.template, first.template);
    }

    #[test]
    fn test_premature_wide_beat_is_pvc() {
        let mut c = classifier();
        // Establish a dominant narrow rhythm.
        for _ in 0..30 {
            let mut b = beat(300, 3);
            c.classify(&mut b, 200, 0);
        }
        // Premature wide beat followed by a compensatory pause.
        let mut pvc = beat(-600, 12);
        let r = c.classify(&mut pvc, 120, 0);
        assert_eq!(r.verdict, BeatVerdict::Beat(BeatClass::Pvc));
    }
}
