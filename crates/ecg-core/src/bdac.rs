//! Beat detection and classification pipeline.
//!
//! [`Bdac`] drives one raw ECG sample at a time through the QRS detector,
//! waits until enough of the beat's tail has arrived, then extracts the
//! beat from its sample ring, downsamples it to the beat analysis rate by
//! pair averaging, and hands it to the classifier. Detection delays queue
//! up while beats wait for their tails, so several pending beats can be
//! in flight at once at high heart rates.
//!
//! ## Example
//!
//! ```rust
//! use ecg_core::bdac::Bdac;
//!
//! let mut bdac = Bdac::new(200, 100).unwrap();
//! // A quiescent signal never yields a beat.
//! for _ in 0..1000 {
//!     assert!(bdac.process(0).is_none());
//! }
//! ```

use crate::classify::BeatClassifier;
use crate::noise_check::NoiseChecker;
use crate::params::{BeatParams, DetectionParams};
use crate::qrs_detector::QrsDetector;
use crate::types::{Beat, BeatClass, BeatVerdict, EcgError, EcgResult};

/// Raw-sample ring length: one beat plus the maximum detection delay.
const ECG_BUFFER_LENGTH: usize = 2000;
/// Maximum number of beats awaiting classification.
const BEAT_QUEUE_LENGTH: usize = 10;

/// Streaming beat detector and classifier.
#[derive(Debug, Clone)]
pub struct Bdac {
    qrs_params: DetectionParams,
    beat_params: BeatParams,
    rate_ratio: i32,

    detector: QrsDetector,
    noise: NoiseChecker,
    classifier: BeatClassifier,

    ecg_buffer: Vec<i32>,
    buffer_index: usize,
    beat_buffer: Vec<i32>,
    scratch: Vec<i32>,
    beat_queue: Vec<i32>,
    rr_count: i32,
    init_beat: bool,
}

impl Bdac {
    /// Create an analyzer for the given detection rate (150–400 Hz) and
    /// beat analysis rate (half the detection rate: templates are stored
    /// at half rate and the downsampler averages sample pairs).
    pub fn new(sample_rate: u32, beat_sample_rate: u32) -> EcgResult<Self> {
        if !(150..=400).contains(&sample_rate) {
            return Err(EcgError::SampleRateOutOfRange(sample_rate));
        }
        if beat_sample_rate == 0 || sample_rate != 2 * beat_sample_rate {
            return Err(EcgError::UnsupportedBeatRate {
                sample_rate,
                beat_rate: beat_sample_rate,
            });
        }

        let qrs_params = DetectionParams::new(sample_rate);
        let beat_params = BeatParams::new(beat_sample_rate);
        let rate_ratio = qrs_params.sample_rate / beat_params.beat_sample_rate;
        Ok(Self {
            detector: QrsDetector::from_params(&qrs_params),
            noise: NoiseChecker::new(&qrs_params),
            classifier: BeatClassifier::new(&qrs_params, &beat_params),
            ecg_buffer: vec![0; ECG_BUFFER_LENGTH],
            buffer_index: 0,
            beat_buffer: vec![0; beat_params.beatlgth as usize],
            scratch: vec![0; (rate_ratio * beat_params.beatlgth) as usize],
            beat_queue: Vec::with_capacity(BEAT_QUEUE_LENGTH),
            rr_count: 0,
            init_beat: true,
            rate_ratio,
            qrs_params,
            beat_params,
        })
    }

    /// Whether the most recent beat was part of a bigeminal rhythm.
    pub fn is_bigeminy(&self) -> bool {
        self.classifier.is_bigeminy()
    }

    /// Number of morphology templates currently in use.
    pub fn template_count(&self) -> usize {
        self.classifier.template_count()
    }

    /// The most recent inter-beat noise estimate.
    pub fn noise_estimate(&self) -> i32 {
        self.noise.estimate()
    }

    /// Process one ECG sample. Returns a classified beat once per
    /// detected QRS complex, a bounded number of samples after its
    /// R-wave.
    pub fn process(&mut self, sample: i32) -> Option<Beat> {
        self.ecg_buffer[self.buffer_index] = sample;
        self.buffer_index += 1;
        if self.buffer_index == ECG_BUFFER_LENGTH {
            self.buffer_index = 0;
        }

        self.rr_count += 1;
        for delay in self.beat_queue.iter_mut() {
            *delay += 1;
        }

        let delay = self.detector.detect(sample);
        if delay != 0 {
            debug_assert!(self.beat_queue.len() < BEAT_QUEUE_LENGTH);
            self.beat_queue.push(delay);
        }

        // Wait until the whole tail of the oldest pending beat has
        // arrived.
        let ready = (self.beat_params.beatlgth - self.beat_params.fidmark) * self.rate_ratio;
        if self.beat_queue.first().map_or(true, |&d| d < ready) {
            self.noise.check(sample, 0, 0, 0, 0);
            return None;
        }

        let detect_delay = self.beat_queue[0];
        let rr = self.rr_count - detect_delay;
        self.rr_count = detect_delay;

        // Low frequency noise over the window between this beat and the
        // previous one, bounded by the dominant beat's extent.
        let (beat_begin, beat_end) = match self.classifier.dominant_bounds() {
            None => (self.qrs_params.ms250, self.qrs_params.ms300),
            Some((begin, end)) => (
                self.rate_ratio * (self.beat_params.fidmark - begin),
                self.rate_ratio * (end - self.beat_params.fidmark),
            ),
        };
        let noise_est = self.noise.check(sample, detect_delay, rr, beat_begin, beat_end);

        // Copy the beat out of the ring, R-wave landing on the fiducial
        // mark, and downsample by averaging sample pairs.
        let total = self.scratch.len();
        let mut j = self.buffer_index as i32
            - detect_delay
            - self.rate_ratio * self.beat_params.fidmark;
        if j < 0 {
            j += ECG_BUFFER_LENGTH as i32;
        }
        let mut j = j as usize;
        for i in 0..total {
            self.scratch[i] = self.ecg_buffer[j];
            j += 1;
            if j == ECG_BUFFER_LENGTH {
                j = 0;
            }
        }
        for i in 0..self.beat_buffer.len() {
            self.beat_buffer[i] = (self.scratch[i << 1] + self.scratch[(i << 1) + 1]) >> 1;
        }
        self.beat_queue.remove(0);

        // The first beat has nothing to compare against and is always
        // reported unclassified.
        let (verdict, template, fid_adj) = if self.init_beat {
            self.init_beat = false;
            (BeatVerdict::Beat(BeatClass::Unknown), 0, 0)
        } else {
            let r = self.classifier.classify(&mut self.beat_buffer, rr, noise_est);
            (r.verdict, r.template, r.fid_adj * self.rate_ratio)
        };

        match verdict {
            // Trailing edge of a beat that was already reported: fold the
            // interval into the next beat.
            BeatVerdict::TrailingEdge => {
                self.rr_count += rr;
                None
            }
            BeatVerdict::Beat(class) => {
                // Bound the fiducial adjustment against bad onset/offset
                // estimates.
                let fid_adj = fid_adj.clamp(-self.qrs_params.ms80, self.qrs_params.ms80);
                Some(Beat {
                    samples_since_r_wave: detect_delay - fid_adj,
                    class,
                    template,
                })
            }
        }
    }
}
