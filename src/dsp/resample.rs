//! Linear resampling, used when synthesis and source material disagree on
//! sample rate.

/// Linear-interpolation resample from `from_rate` to `to_rate`.
pub fn linear_resample(samples: &[f32], from_rate: f32, to_rate: f32) -> Vec<f32> {
    if samples.is_empty() || from_rate <= 0.0 || to_rate <= 0.0 {
        return Vec::new();
    }
    if (from_rate - to_rate).abs() < f32::EPSILON {
        return samples.to_vec();
    }

    let ratio = from_rate / to_rate;
    let out_len = ((samples.len() as f32) / ratio).floor() as usize;

    (0..out_len)
        .map(|i| {
            let src_pos = i as f32 * ratio;
            let idx = src_pos.floor() as usize;
            let frac = src_pos - idx as f32;
            let a = samples.get(idx).copied().unwrap_or(0.0);
            let b = samples.get(idx + 1).copied().unwrap_or(a);
            a + (b - a) * frac
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_when_rates_match() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(linear_resample(&samples, 44100.0, 44100.0), samples);
    }

    #[test]
    fn halves_length_on_downsample() {
        let samples = vec![0.0f32; 1000];
        let out = linear_resample(&samples, 44100.0, 22050.0);
        assert!((out.len() as i64 - 500).abs() <= 2);
    }
}
