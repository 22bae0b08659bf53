//! Retrospective beat classification.
//!
//! Once the beat *following* a given beat has arrived, its RR intervals
//! can reveal a premature beat with a compensatory pause that the forward
//! pass missed. Each template keeps two eight-deep rings: a post-class
//! ring (PVC/UNKNOWN votes for individual beats) and a post-rhythm ring
//! (the rhythm context each beat occurred in). The classifier consults
//! the window votes when a morphology has no persistent class yet.
//!
//! The first three invocations only record timing context and do not
//! shift the rings.

use crate::matcher::BeatMatcher;
use crate::params::{MATCH_HISTORY, MAX_TYPES};
use crate::types::BeatClass;

/// Per-type retrospective classification state.
#[derive(Debug, Clone, Default)]
pub struct PostClassifier {
    post_class: [[Option<BeatClass>; MATCH_HISTORY]; MAX_TYPES],
    pc_rhythm: [[Option<BeatClass>; MATCH_HISTORY]; MAX_TYPES],
    init_count: u32,
    last_mi2: f64,
    last_rhythm: Option<BeatClass>,
}

impl PostClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-examine the previous beat (`recent_types[1]`) now that the
    /// current one is known.
    ///
    /// `recent_types` and `recent_rrs` hold the current beat at index 0;
    /// `mi2` and `rhythm_class` describe the current beat and are consumed
    /// lagged, on the next invocation.
    pub fn post_classify(
        &mut self,
        matcher: &BeatMatcher,
        recent_types: &[usize; 8],
        dom_type: Option<usize>,
        recent_rrs: &[i32; 8],
        _width: i32,
        mi2: f64,
        rhythm_class: BeatClass,
    ) {
        let mut dom_type = dom_type;

        // If the surrounding beats share a non-dominant type, are mostly
        // regular, and sit close to the dominant shape, treat that type as
        // dominant for this pass.
        if recent_types[0] == recent_types[2]
            && Some(recent_types[0]) != dom_type
            && recent_types[0] != recent_types[1]
        {
            let mi3 = matcher.dom_compare(recent_types[0], dom_type);
            let row = recent_types[0].min(MAX_TYPES - 1);
            let reg_count = self.pc_rhythm[row]
                .iter()
                .filter(|&&c| c == Some(BeatClass::Normal))
                .count();
            if mi3 < 2.0 && reg_count > 6 {
                dom_type = Some(recent_types[0]);
            }
        }

        // Warm-up: nothing is recorded for the first three beats.
        if self.init_count < 3 {
            self.init_count += 1;
            self.last_mi2 = 0.0;
            self.last_rhythm = None;
            return;
        }

        let rt1 = recent_types[1];
        if rt1 < MAX_TYPES {
            // Normal interval estimate: the most recent adjacent pair of
            // equal types.
            let mut i = 2;
            while i < 7 && recent_types[i] != recent_types[i + 1] {
                i += 1;
            }
            let norm_rr = if i == 7 { 0 } else { recent_rrs[i] };

            let pvc_count = self.post_class[rt1]
                .iter()
                .filter(|&&c| c == Some(BeatClass::Pvc))
                .count();

            for i in (1..MATCH_HISTORY).rev() {
                self.post_class[rt1][i] = self.post_class[rt1][i - 1];
                self.pc_rhythm[rt1][i] = self.pc_rhythm[rt1][i - 1];
            }

            let (rr0, rr1) = (recent_rrs[0], recent_rrs[1]);
            let surrounded = Some(recent_types[0]) == dom_type
                && Some(recent_types[2]) == dom_type
                && Some(rt1) != dom_type;

            // Premature followed by a compensatory pause between dominant
            // neighbors.
            if (norm_rr - (norm_rr >> 3)) >= rr1 && (rr0 - (rr0 >> 3)) >= norm_rr && surrounded {
                self.post_class[rt1][0] = Some(BeatClass::Pvc);
            }
            // Slightly premature, continuing an established PVC pattern.
            else if (norm_rr - (norm_rr >> 4)) > rr1
                && (norm_rr + (norm_rr >> 4)) < rr0
                && ((self.post_class[rt1][1] == Some(BeatClass::Pvc)
                    && self.post_class[rt1][2] == Some(BeatClass::Pvc))
                    || pvc_count >= 6)
                && surrounded
            {
                self.post_class[rt1][0] = Some(BeatClass::Pvc);
            }
            // Dominant neighbors and a strongly different shape.
            else if Some(recent_types[0]) == dom_type
                && Some(recent_types[2]) == dom_type
                && self.last_mi2 > 2.5
            {
                self.post_class[rt1][0] = Some(BeatClass::Pvc);
            } else {
                self.post_class[rt1][0] = Some(BeatClass::Unknown);
            }

            // Rhythm vote: premature plus compensatory reads as PVC,
            // otherwise carry the lagged rhythm classification.
            if (norm_rr - (norm_rr >> 3)) > rr1 && (rr0 - (rr0 >> 3)) > norm_rr {
                self.pc_rhythm[rt1][0] = Some(BeatClass::Pvc);
            } else {
                self.pc_rhythm[rt1][0] = self.last_rhythm;
            }
        }

        self.last_mi2 = mi2;
        self.last_rhythm = Some(rhythm_class);
    }

    /// PVC when three of the last four or six of the last eight beats of
    /// this type were post-classified as PVC.
    pub fn check_post_class(&self, ty: usize) -> BeatClass {
        if ty >= MAX_TYPES {
            return BeatClass::Unknown;
        }
        let pvcs4 = self.post_class[ty][..4]
            .iter()
            .filter(|&&c| c == Some(BeatClass::Pvc))
            .count();
        let pvcs8 = pvcs4
            + self.post_class[ty][4..]
                .iter()
                .filter(|&&c| c == Some(BeatClass::Pvc))
                .count();
        if pvcs4 >= 3 || pvcs8 >= 6 {
            BeatClass::Pvc
        } else {
            BeatClass::Unknown
        }
    }

    /// Rhythm vote over the usable window of this type's post-rhythm
    /// ring: NORMAL when at least 7 are regular, PVC when nearly none
    /// are, UNKNOWN otherwise.
    pub fn check_pc_rhythm(&self, matcher: &BeatMatcher, ty: usize) -> BeatClass {
        if ty >= MAX_TYPES {
            return BeatClass::Unknown;
        }
        let count = matcher.count_of(ty);
        let n = if count < 9 { (count - 1) as usize } else { 8 };

        let norm_count = self.pc_rhythm[ty][..n]
            .iter()
            .filter(|&&c| c == Some(BeatClass::Normal))
            .count();
        if norm_count >= 7 {
            return BeatClass::Normal;
        }
        if (norm_count == 0 && n < 4)
            || (norm_count <= 1 && (4..7).contains(&n))
            || (norm_count <= 2 && n >= 7)
        {
            return BeatClass::Pvc;
        }
        BeatClass::Unknown
    }

    /// Move one type's rings to another slot (template merge/evict
    /// bookkeeping).
    pub(crate) fn copy_type(&mut self, src: usize, dest: usize) {
        self.post_class[dest] = self.post_class[src];
        self.pc_rhythm[dest] = self.pc_rhythm[src];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::BeatParams;

    fn matcher_with_types(n: usize) -> BeatMatcher {
        let bp = BeatParams::new(100);
        let qp = crate::params::DetectionParams::new(200);
        let mut dom = crate::classify::DominantMonitor::new(&bp, &qp);
        let mut m = BeatMatcher::new(&bp);
        for k in 0..n {
            let mut beat = vec![0; bp.beatlgth as usize];
            let fid = bp.fidmark;
            let amp = 200 + 120 * k as i32;
            for j in 0..4 {
                let v = amp * (j + 1) / 4;
                beat[(fid - 4 + j) as usize] = v;
                beat[(fid + 4 - j) as usize] = v;
            }
            beat[fid as usize] = amp;
            m.new_beat_type(&beat, &mut dom);
        }
        m
    }

    #[test]
    fn test_check_post_class_out_of_range_type() {
        let pc = PostClassifier::new();
        assert_eq!(pc.check_post_class(MAX_TYPES), BeatClass::Unknown);
    }

    #[test]
    fn test_check_post_class_votes() {
        let mut pc = PostClassifier::new();
        assert_eq!(pc.check_post_class(0), BeatClass::Unknown);
        // Three of the last four.
        pc.post_class[0][0] = Some(BeatClass::Pvc);
        pc.post_class[0][1] = Some(BeatClass::Pvc);
        pc.post_class[0][2] = Some(BeatClass::Pvc);
        assert_eq!(pc.check_post_class(0), BeatClass::Pvc);
        // Six of the last eight.
        let mut pc = PostClassifier::new();
        for i in 2..8 {
            pc.post_class[1][i] = Some(BeatClass::Pvc);
        }
        assert_eq!(pc.check_post_class(1), BeatClass::Pvc);
    }

    #[test]
    fn test_check_pc_rhythm_windows() {
        let mut m = matcher_with_types(1);
        let mut pc = PostClassifier::new();

        // A single-beat type has an empty usable window: reads as PVC.
        assert_eq!(pc.check_pc_rhythm(&m, 0), BeatClass::Pvc);

        // Grow the type to nine beats (re-feeding the same shape) and fill
        // the ring with regular votes.
        let bp = BeatParams::new(100);
        let mut beat = vec![0; bp.beatlgth as usize];
        let fid = bp.fidmark;
        for j in 0..4 {
            let v = 200 * (j + 1) / 4;
            beat[(fid - 4 + j) as usize] = v;
            beat[(fid + 4 - j) as usize] = v;
        }
        beat[fid as usize] = 200;
        for _ in 0..8 {
            m.update_beat_type(0, &beat, 0.1, 0);
        }
        for i in 0..8 {
            pc.pc_rhythm[0][i] = Some(BeatClass::Normal);
        }
        assert_eq!(pc.check_pc_rhythm(&m, 0), BeatClass::Normal);

        // Two regular votes in a full window are not enough.
        for i in 2..8 {
            pc.pc_rhythm[0][i] = Some(BeatClass::Pvc);
        }
        assert_eq!(pc.check_pc_rhythm(&m, 0), BeatClass::Pvc);
    }

    #[test]
    fn test_compensatory_pause_marks_previous_as_pvc() {
        let m = matcher_with_types(2);
        let mut pc = PostClassifier::new();

        // Warm up past the three ignored invocations.
        let types = [0usize, 0, 0, 0, 0, 0, 0, 0];
        let rrs = [200i32; 8];
        for _ in 0..3 {
            pc.post_classify(&m, &types, Some(0), &rrs, 10, 0.1, BeatClass::Normal);
        }

        // Beat 1 (type 1) was premature (RR 120) and is followed by a
        // compensatory pause (RR 280) between dominant type-0 neighbors.
        let types = [0usize, 1, 0, 0, 0, 0, 0, 0];
        let rrs = [280, 120, 200, 200, 200, 200, 200, 200];
        pc.post_classify(&m, &types, Some(0), &rrs, 10, 0.1, BeatClass::Normal);

        assert_eq!(pc.post_class[1][0], Some(BeatClass::Pvc));
        assert_eq!(pc.pc_rhythm[1][0], Some(BeatClass::Pvc));
    }

    #[test]
    fn test_regular_beat_marks_previous_as_unknown() {
        let m = matcher_with_types(1);
        let mut pc = PostClassifier::new();
        let types = [0usize; 8];
        let rrs = [200i32; 8];
        for _ in 0..3 {
            pc.post_classify(&m, &types, Some(0), &rrs, 10, 0.1, BeatClass::Normal);
        }
        // First recorded call: the lagged rhythm is still unset.
        pc.post_classify(&m, &types, Some(0), &rrs, 10, 0.1, BeatClass::Normal);
        assert_eq!(pc.post_class[0][0], Some(BeatClass::Unknown));
        assert_eq!(pc.pc_rhythm[0][0], None);
        // The next call carries the lagged rhythm classification.
        pc.post_classify(&m, &types, Some(0), &rrs, 10, 0.1, BeatClass::Normal);
        assert_eq!(pc.pc_rhythm[0][0], Some(BeatClass::Normal));
    }

    #[test]
    fn test_warm_up_does_not_shift_rings() {
        let m = matcher_with_types(1);
        let mut pc = PostClassifier::new();
        let types = [0usize; 8];
        let rrs = [200i32; 8];
        for _ in 0..3 {
            pc.post_classify(&m, &types, Some(0), &rrs, 10, 0.1, BeatClass::Normal);
        }
        assert!(pc.post_class[0].iter().all(|c| c.is_none()));
        assert!(pc.pc_rhythm[0].iter().all(|c| c.is_none()));
    }
}
