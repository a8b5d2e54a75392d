//! Rhythm capture mode (spec §4.7): onset-detect each buffer, then derive
//! tempo and a quantised beat grid on stop.

use crate::dsp;

/// Accumulates onsets across successive capture buffers. Owned by the single
/// producer thread that feeds it (spec §5); not `Sync`.
#[derive(Debug, Default)]
pub struct RhythmCapture {
    onsets: Vec<f64>,
    amplitudes: Vec<f32>,
    elapsed_secs: f64,
}

impl RhythmCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs onset detection on one buffer and appends any hits, offset by
    /// the capture's running clock.
    pub fn process_buffer(&mut self, buffer: &[f32], rate: f32) {
        let onsets = dsp::detect_onsets(buffer, rate, 0.5);
        for &onset_s in &onsets {
            let absolute = self.elapsed_secs + onset_s as f64;
            let start = (onset_s * rate) as usize;
            let peak = buffer.get(start..).map(|w| w.iter().fold(0.0f32, |m, &x| m.max(x.abs()))).unwrap_or(0.0);
            self.onsets.push(absolute);
            self.amplitudes.push(peak);
        }
        self.elapsed_secs += buffer.len() as f64 / rate as f64;
    }

    /// Finalises the capture: duration is the last onset time, tempo is 60
    /// over the median inter-onset interval, quantised to 4/4 by default.
    pub fn stop(&self) -> CapturedRhythm {
        let duration_secs = self.onsets.last().copied().unwrap_or(0.0);
        let tempo_bpm = median_tempo(&self.onsets);
        let beat_secs = if tempo_bpm > 0.0 { 60.0 / tempo_bpm as f64 } else { 1.0 };
        let quantized_beats: Vec<f32> =
            self.onsets.iter().map(|&t| quantize_to_16th((t / beat_secs) as f32)).collect();

        CapturedRhythm {
            onsets: self.onsets.clone(),
            amplitudes: self.amplitudes.clone(),
            duration_secs,
            tempo_bpm,
            quantized_beats,
            time_signature: (4, 4),
        }
    }
}

fn median_tempo(onsets: &[f64]) -> f32 {
    if onsets.len() < 2 {
        return 0.0;
    }
    let mut intervals: Vec<f64> = onsets.windows(2).map(|w| w[1] - w[0]).collect();
    intervals.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = intervals.len() / 2;
    let median = if intervals.len() % 2 == 0 {
        (intervals[mid - 1] + intervals[mid]) / 2.0
    } else {
        intervals[mid]
    };
    if median <= 0.0 {
        0.0
    } else {
        (60.0 / median) as f32
    }
}

fn quantize_to_16th(beats: f32) -> f32 {
    (beats * 4.0).round() / 4.0
}

#[derive(Debug, Clone)]
pub struct CapturedRhythm {
    pub onsets: Vec<f64>,
    pub amplitudes: Vec<f32>,
    pub duration_secs: f64,
    pub tempo_bpm: f32,
    pub quantized_beats: Vec<f32>,
    pub time_signature: (u8, u8),
}

impl CapturedRhythm {
    /// `0.3·tempo_similarity + 0.7·structural_match`.
    pub fn similarity_to(&self, other: &CapturedRhythm) -> f32 {
        let tempo_sim = tempo_similarity(self.tempo_bpm, other.tempo_bpm);
        let structural = structural_match(&self.quantized_beats, &other.quantized_beats);
        (0.3 * tempo_sim + 0.7 * structural).clamp(0.0, 1.0)
    }
}

fn tempo_similarity(a: f32, b: f32) -> f32 {
    let max = a.max(b).max(1e-6);
    (1.0 - (a - b).abs() / max).clamp(0.0, 1.0)
}

/// Fraction of `a`'s beats with a match in `b` within ±0.25 beats.
fn structural_match(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let matched = a.iter().filter(|&&beat| b.iter().any(|&other| (beat - other).abs() <= 0.25)).count();
    matched as f32 / a.len().max(b.len()) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_taps_are_highly_similar() {
        let rate = 44100.0;
        let onsets = [0.0, 0.5, 1.0, 1.5];
        let mut a = RhythmCapture::new();
        let mut b = RhythmCapture::new();
        for &t in &onsets {
            let mut buf = vec![0.0f32; (0.1 * rate) as usize];
            buf[0] = 0.9;
            a.elapsed_secs = t;
            a.process_buffer(&buf, rate);
            b.elapsed_secs = t;
            b.process_buffer(&buf, rate);
        }
        let cap_a = a.stop();
        let cap_b = b.stop();
        assert!(cap_a.similarity_to(&cap_b) >= 0.95, "{}", cap_a.similarity_to(&cap_b));
    }

    #[test]
    fn structural_match_ignores_tempo_when_grids_disagree() {
        let a = CapturedRhythm {
            onsets: vec![0.0, 0.5, 1.0],
            amplitudes: vec![0.9, 0.9, 0.9],
            duration_secs: 1.0,
            tempo_bpm: 120.0,
            quantized_beats: vec![0.0, 1.0, 2.0],
            time_signature: (4, 4),
        };
        let b = CapturedRhythm {
            onsets: vec![0.0, 0.5, 1.0],
            amplitudes: vec![0.9, 0.9, 0.9],
            duration_secs: 1.0,
            tempo_bpm: 120.0,
            quantized_beats: vec![0.1, 3.0, 5.0],
            time_signature: (4, 4),
        };
        assert!(a.similarity_to(&b) < 0.5);
    }

    #[test]
    fn median_tempo_handles_even_and_odd_counts() {
        assert_eq!(median_tempo(&[0.0, 0.5, 1.0]), 120.0);
        assert_eq!(median_tempo(&[0.0, 0.5, 1.0, 1.5]), 120.0);
    }
}
