//! Onset detection: 10ms windows, 50% overlap, energy-ratio trigger with a
//! 30ms refractory gap (spec §4.2).

const WINDOW_MS: f32 = 10.0;
const REFRACTORY_MS: f32 = 30.0;
const MIN_ABS_ENERGY: f32 = 0.01;

/// Returns onset times in seconds, given `onset_threshold` (a window fires
/// when its energy exceeds the previous window's by a factor of
/// `1 + onset_threshold`).
pub fn detect_onsets(samples: &[f32], rate: f32, onset_threshold: f32) -> Vec<f32> {
    let window_len = ((WINDOW_MS / 1000.0) * rate).round() as usize;
    let window_len = window_len.max(1);
    let hop = (window_len / 2).max(1);
    let refractory_samples = ((REFRACTORY_MS / 1000.0) * rate).round() as usize;

    let mut onsets = Vec::new();
    let mut prev_energy = 0.0f32;
    let mut last_onset_sample: Option<usize> = None;

    let mut start = 0usize;
    while start < samples.len() {
        let end = (start + window_len).min(samples.len());
        let window = &samples[start..end];
        let energy = window.iter().map(|x| x * x).sum::<f32>() / window.len().max(1) as f32;

        let fires = energy >= MIN_ABS_ENERGY
            && prev_energy > 0.0
            && energy >= prev_energy * (1.0 + onset_threshold);

        if fires {
            let in_refractory = last_onset_sample
                .map(|last| start.saturating_sub(last) < refractory_samples)
                .unwrap_or(false);
            if !in_refractory {
                onsets.push(start as f32 / rate);
                last_onset_sample = Some(start);
            }
        }

        prev_energy = energy;
        start += hop;
    }

    onsets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_has_no_onsets() {
        let samples = vec![0.0f32; 44100];
        assert!(detect_onsets(&samples, 44100.0, 0.5).is_empty());
    }

    #[test]
    fn single_loud_burst_is_an_onset() {
        let rate = 44100.0;
        let mut samples = vec![0.0f32; (rate * 0.5) as usize];
        let burst_start = (rate * 0.25) as usize;
        for s in &mut samples[burst_start..burst_start + 500] {
            *s = 0.9;
        }
        let onsets = detect_onsets(&samples, rate, 0.5);
        assert!(!onsets.is_empty());
        assert!((onsets[0] - 0.25).abs() < 0.05);
    }

    #[test]
    fn refractory_gap_suppresses_immediate_repeat() {
        let rate = 44100.0;
        let mut samples = vec![0.0f32; (rate * 0.1) as usize];
        for s in samples.iter_mut() {
            *s = 0.9;
        }
        let onsets = detect_onsets(&samples, rate, 0.1);
        // A sustained loud signal should not re-fire every window.
        assert!(onsets.len() <= 4);
    }
}
