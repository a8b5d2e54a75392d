//! Clipping detection and repair (spec §4.3).

use crate::io;
use std::path::Path;

const CLIP_THRESHOLD: f32 = 0.99;

#[derive(Debug, Clone, Copy)]
pub struct ClippingReport {
    pub has_clipping: bool,
    pub peak: f32,
    pub clipped_count: usize,
    pub clipping_percentage: f32,
    pub recommended_gain: f32,
}

/// Peak, clipped-sample ratio, and a recommended makeup gain.
pub fn detect_clipping(samples: &[f32]) -> ClippingReport {
    let peak = samples.iter().fold(0.0f32, |m, &x| m.max(x.abs()));
    let clipped_count = samples.iter().filter(|&&x| x.abs() >= CLIP_THRESHOLD).count();
    let clipping_percentage = if samples.is_empty() {
        0.0
    } else {
        100.0 * clipped_count as f32 / samples.len() as f32
    };
    let recommended_gain = if peak > 0.0 { 0.95 / peak } else { 1.0 };

    ClippingReport {
        has_clipping: clipped_count > 0,
        peak,
        clipped_count,
        clipping_percentage,
        recommended_gain,
    }
}

/// Replace every clipped sample with the mean of a ±1-sample window, falling
/// back to ±5 samples when the immediate neighbours are also clipped.
pub fn apply_declipping(samples: &[f32]) -> Vec<f32> {
    let n = samples.len();
    let is_clipped = |x: f32| x.abs() >= CLIP_THRESHOLD;

    (0..n)
        .map(|i| {
            if !is_clipped(samples[i]) {
                return samples[i];
            }

            let narrow: Vec<f32> = window_around(samples, i, 1)
                .into_iter()
                .filter(|&x| !is_clipped(x))
                .collect();
            if !narrow.is_empty() {
                return narrow.iter().sum::<f32>() / narrow.len() as f32;
            }

            let wide: Vec<f32> = window_around(samples, i, 5)
                .into_iter()
                .filter(|&x| !is_clipped(x))
                .collect();
            if !wide.is_empty() {
                wide.iter().sum::<f32>() / wide.len() as f32
            } else {
                samples[i].signum() * CLIP_THRESHOLD
            }
        })
        .collect()
}

fn window_around(samples: &[f32], center: usize, radius: usize) -> Vec<f32> {
    let start = center.saturating_sub(radius);
    let end = (center + radius + 1).min(samples.len());
    (start..end).filter(|&i| i != center).map(|i| samples[i]).collect()
}

/// Decode, de-clip, normalize to `target_peak`, encode as WAV.
pub fn repair_clipping(
    in_path: &Path,
    out_path: &Path,
    target_peak: f32,
) -> Result<(), crate::error::AppError> {
    let buf = io::load_audio(in_path)?;
    let declipped = apply_declipping(&buf.samples);
    let peak = declipped.iter().fold(0.0f32, |m, &x| m.max(x.abs()));
    let gain = if peak > 0.0 { target_peak / peak } else { 1.0 };
    let normalized: Vec<f32> = declipped.iter().map(|&x| (x * gain).clamp(-1.0, 1.0)).collect();
    io::encode_wav(out_path, &normalized, buf.rate)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_clipped_square_wave() {
        let mut samples = vec![0.0f32; 1000];
        for (i, s) in samples.iter_mut().enumerate() {
            *s = if i % 100 < 8 { 1.0 } else { 0.1 };
        }
        let report = detect_clipping(&samples);
        assert!(report.has_clipping);
        assert!(report.clipping_percentage > 7.0 && report.clipping_percentage < 9.0);
    }

    #[test]
    fn declipping_never_increases_peak() {
        let mut samples = vec![0.2f32; 200];
        for s in samples.iter_mut().step_by(10) {
            *s = 1.0;
        }
        let peak_before = samples.iter().fold(0.0f32, |m, &x| m.max(x.abs()));
        let declipped = apply_declipping(&samples);
        let peak_after = declipped.iter().fold(0.0f32, |m, &x| m.max(x.abs()));
        assert!(peak_after <= peak_before);
    }

    #[test]
    fn repair_clipping_round_trip_removes_clipping() {
        let dir = tempfile::tempdir().unwrap();
        let in_path = dir.path().join("clipped.wav");
        let out_path = dir.path().join("repaired.wav");

        let mut samples = vec![0.0f32; 4410];
        for (i, s) in samples.iter_mut().enumerate() {
            *s = if i % 50 < 4 { 1.0 } else { 0.1 };
        }
        io::encode_wav(&in_path, &samples, 44100).unwrap();

        repair_clipping(&in_path, &out_path, 0.95).unwrap();

        let repaired = io::load_audio(&out_path).unwrap();
        let report = detect_clipping(&repaired.samples);
        assert!(report.clipping_percentage < 1.0);
    }
}
