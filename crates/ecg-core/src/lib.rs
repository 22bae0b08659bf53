//! # Real-time single-lead ECG beat detection and classification
//!
//! This crate ingests one integer ECG sample at a time and emits, with
//! bounded delay, the location of each detected QRS complex and a beat
//! label drawn from NORMAL / PVC / UNKNOWN. It is built for embedding in
//! monitors and batch analysis tools: it owns no I/O, keeps no persistent
//! state, performs no runtime tuning, and does amortized O(1) integer
//! work per sample.
//!
//! ## Pipeline
//!
//! ```text
//! sample ──► filter ──► detector ──► beat queue ──► downsample
//!                                                       │
//!        noise estimator ──────────────────────────►────┤
//!                                                       ▼
//!            template bank ◄── matcher ◄── beat ──► classifier ──► label
//!                                    rhythm checker, post-classifier
//! ```
//!
//! Samples arrive at the **detection rate** (typically 200 Hz); beat
//! templates are stored and compared at the **beat analysis rate** (half
//! of it). The classifier combines morphology matching against up to
//! eight adaptive templates, an RR-interval rhythm state machine, a
//! dominant-morphology monitor, and a retrospective pass that can
//! re-label a beat once the following beat is known.
//!
//! ## Example
//!
//! ```rust
//! use ecg_core::prelude::*;
//!
//! let mut analyzer = Bdac::new(200, 100).unwrap();
//! for &sample in &[0i32; 400] {
//!     if let Some(beat) = analyzer.process(sample) {
//!         println!(
//!             "beat {} samples ago: {:?} ({})",
//!             beat.samples_since_r_wave,
//!             beat.class,
//!             beat.class.code()
//!         );
//!     }
//! }
//! ```
//!
//! For detection without classification, [`qrs_detector::QrsDetector`]
//! can be used on its own.

pub mod bdac;
pub mod beat_analysis;
pub mod classify;
pub mod matcher;
pub mod noise_check;
pub mod params;
pub mod post_classify;
pub mod qrs_detector;
pub mod qrs_filter;
pub mod rhythm_check;
pub mod types;

pub use bdac::Bdac;
pub use qrs_detector::QrsDetector;
pub use types::{Beat, BeatClass, BeatVerdict, EcgError, EcgResult};

/// Commonly used types.
pub mod prelude {
    pub use crate::bdac::Bdac;
    pub use crate::qrs_detector::QrsDetector;
    pub use crate::types::{Beat, BeatClass, EcgError, EcgResult};
}
