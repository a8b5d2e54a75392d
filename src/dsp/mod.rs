//! DSP kernels: FFT, band-pass filtering, onset detection, MFCC,
//! autocorrelation pitch tracking, envelope following, and resampling.
//!
//! These are the building blocks the Feature Extractor (`crate::analyzer`)
//! and Instrument Extractor (`crate::instruments`) are layered on top of.
//! Hand-rolled in `Vec<f32>`/`Vec<f64>` math rather than an array/tensor
//! crate, matching the rest of this codebase's manual numerics.

pub mod envelope;
pub mod fft;
pub mod filters;
pub mod mfcc;
pub mod onset;
pub mod pitch;
pub mod resample;

pub use envelope::EnvelopeFollower;
pub use fft::{fft_magnitude, fft_size_for};
pub use filters::band_pass;
pub use mfcc::mfcc;
pub use onset::detect_onsets;
pub use pitch::autocorrelation_pitch;
pub use resample::linear_resample;
