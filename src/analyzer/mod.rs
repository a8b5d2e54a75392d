//! The Feature Extractor (spec §4.3): BPM, spectral descriptors, MFCC,
//! clipping, silence trim, genre classification and structure segmentation.

pub mod clipping;
pub mod genre;
pub mod silence;
pub mod structure;

use crate::dsp;
use crate::io::{self, AudioBuffer, DecodeError};
use std::path::Path;
use thiserror::Error;

pub use clipping::{apply_declipping, detect_clipping, repair_clipping, ClippingReport};
pub use genre::{bass_level, classify_genre, intensity};
pub use silence::detect_silence_and_trim;
pub use structure::analyze_song_structure;

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

/// Persisted/transient acoustic feature set for a track (spec §3 `AudioFeatures`).
#[derive(Debug, Clone)]
pub struct TrackFeatures {
    pub mfcc: Vec<f32>,
    pub spectral_centroid: f32,
    pub spectral_rolloff: f32,
    pub zcr: f32,
    pub bpm: f32,
    pub duration_secs: f64,
    pub sample_rate: u32,
    pub rms: f32,
    pub bass_energy_ratio: f32,
    pub genre: String,
    pub intensity: String,
    pub bass_level: String,
}

/// `analyze(path) → TrackFeatures | DecodeError`. No side effect on the store.
pub fn analyze(path: &Path) -> Result<TrackFeatures, AnalyzeError> {
    let buf = io::load_audio(path)?;
    Ok(analyze_buffer(&buf))
}

pub fn analyze_buffer(buf: &AudioBuffer) -> TrackFeatures {
    let samples = &buf.samples;
    let rate = buf.rate as f32;

    let rms = root_mean_square(samples);
    let bpm = detect_bpm(samples, rate);
    let magnitude = dsp::fft_magnitude(samples);
    let centroid = spectral_centroid(&magnitude, rate);
    let rolloff = spectral_rolloff(&magnitude, 0.85);
    let zcr = zero_crossing_rate(samples);
    let mfcc = dsp::mfcc(samples, rate, 13);
    let bass_energy_ratio = sub_band_energy_ratio(&magnitude, rate, 20.0, 250.0);

    let intensity = intensity(rms);
    let bass_level = bass_level(bass_energy_ratio);
    let genre = classify_genre(bpm, &intensity, &bass_level, centroid / (rate / 2.0), zcr);

    TrackFeatures {
        mfcc,
        spectral_centroid: centroid,
        spectral_rolloff: rolloff,
        zcr,
        bpm,
        duration_secs: buf.duration_secs(),
        sample_rate: buf.rate,
        rms,
        bass_energy_ratio,
        genre,
        intensity,
        bass_level,
    }
}

/// Parallel batch analysis. Order of the returned list matches input order;
/// `progress_sink` is invoked with a monotonically non-decreasing count.
pub fn analyze_batch(
    paths: &[std::path::PathBuf],
    progress_sink: impl Fn(usize) + Sync,
) -> Vec<Result<TrackFeatures, AnalyzeError>> {
    use rayon::prelude::*;
    let done = std::sync::atomic::AtomicUsize::new(0);
    paths
        .par_iter()
        .map(|p| {
            let result = analyze(p);
            let n = done.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            progress_sink(n);
            result
        })
        .collect()
}

fn root_mean_square(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|x| x * x).sum::<f32>() / samples.len() as f32).sqrt()
}

fn zero_crossing_rate(samples: &[f32]) -> f32 {
    if samples.len() < 2 {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f32 / (samples.len() - 1) as f32
}

fn spectral_centroid(magnitude: &[f32], rate: f32) -> f32 {
    let n_fft = magnitude.len().saturating_sub(1) * 2;
    if n_fft == 0 {
        return 0.0;
    }
    let bin_hz = rate / n_fft as f32;
    let weighted: f32 = magnitude
        .iter()
        .enumerate()
        .map(|(i, &m)| i as f32 * bin_hz * m)
        .sum();
    let total: f32 = magnitude.iter().sum();
    if total <= 0.0 {
        0.0
    } else {
        weighted / total
    }
}

/// Fraction (0..1) of the spectrum below which `threshold` of total energy sits.
fn spectral_rolloff(magnitude: &[f32], threshold: f32) -> f32 {
    let total: f32 = magnitude.iter().map(|m| m * m).sum();
    if total <= 0.0 || magnitude.is_empty() {
        return 0.0;
    }
    let target = total * threshold;
    let mut cumulative = 0.0f32;
    for (i, &m) in magnitude.iter().enumerate() {
        cumulative += m * m;
        if cumulative >= target {
            return i as f32 / magnitude.len() as f32;
        }
    }
    1.0
}

fn sub_band_energy_ratio(magnitude: &[f32], rate: f32, low_hz: f32, high_hz: f32) -> f32 {
    let n_fft = magnitude.len().saturating_sub(1) * 2;
    if n_fft == 0 {
        return 0.0;
    }
    let bin_hz = rate / n_fft as f32;
    let total: f32 = magnitude.iter().map(|m| m * m).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let sub: f32 = magnitude
        .iter()
        .enumerate()
        .filter(|(i, _)| {
            let hz = *i as f32 * bin_hz;
            hz >= low_hz && hz <= high_hz
        })
        .map(|(_, &m)| m * m)
        .sum();
    sub / total
}

/// BPM from the median inter-onset interval of detected onsets.
fn detect_bpm(samples: &[f32], rate: f32) -> f32 {
    let onsets = dsp::detect_onsets(samples, rate, 0.5);
    if onsets.len() < 2 {
        return 0.0;
    }
    let mut intervals: Vec<f32> = onsets.windows(2).map(|w| w[1] - w[0]).collect();
    intervals.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let median = intervals[intervals.len() / 2];
    if median <= 0.0 {
        0.0
    } else {
        (60.0 / median).clamp(0.0, 300.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_buffer_produces_finite_features() {
        let rate = 44100u32;
        let samples: Vec<f32> = (0..rate as usize)
            .map(|i| (2.0 * std::f32::consts::PI * 220.0 * i as f32 / rate as f32).sin() * 0.5)
            .collect();
        let buf = AudioBuffer { samples, rate };
        let features = analyze_buffer(&buf);
        assert!(features.spectral_centroid.is_finite());
        assert!(features.spectral_rolloff >= 0.0 && features.spectral_rolloff <= 1.0);
        assert!(features.zcr >= 0.0 && features.zcr <= 1.0);
        assert_eq!(features.mfcc.len(), 13);
        assert!(features.bpm >= 0.0 && features.bpm <= 300.0);
    }

    #[test]
    fn zcr_of_alternating_signal_is_high() {
        let samples: Vec<f32> = (0..100).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert!(zero_crossing_rate(&samples) > 0.9);
    }
}
