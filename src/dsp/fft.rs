use rustfft::{num_complex::Complex32, FftPlanner};

/// Upper bound on transform size when an accelerated FFT is available.
const MAX_FFT_SIZE_ACCELERATED: usize = 8192;
/// Upper bound when falling back to a naive transform.
const MAX_FFT_SIZE_NAIVE: usize = 2048;

/// Largest power of two ≤ `buffer_len`, capped per spec §4.2. `rustfft` is
/// always available in this build, so the accelerated cap applies.
pub fn fft_size_for(buffer_len: usize) -> usize {
    let cap = MAX_FFT_SIZE_ACCELERATED.min(buffer_len.max(1));
    let _ = MAX_FFT_SIZE_NAIVE; // documents the non-accelerated cap the spec names
    let mut n = 1usize;
    while n * 2 <= cap {
        n *= 2;
    }
    n
}

/// Real-input FFT magnitude spectrum, length `N/2+1` where `N = fft_size_for(samples.len())`.
/// Samples beyond `N` are dropped; a Hann window is applied to reduce spectral leakage.
pub fn fft_magnitude(samples: &[f32]) -> Vec<f32> {
    let n = fft_size_for(samples.len());
    let mut buf: Vec<Complex32> = (0..n)
        .map(|i| {
            let w = 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / (n as f32 - 1.0)).cos();
            Complex32::new(samples.get(i).copied().unwrap_or(0.0) * w, 0.0)
        })
        .collect();

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buf);

    buf[..=n / 2].iter().map(|c| c.norm()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_is_power_of_two_and_capped() {
        assert_eq!(fft_size_for(1000), 512);
        assert_eq!(fft_size_for(4096), 4096);
        assert_eq!(fft_size_for(100_000), 8192);
        assert_eq!(fft_size_for(0), 1);
    }

    #[test]
    fn magnitude_has_expected_length() {
        let samples = vec![0.0f32; 2000];
        let mag = fft_magnitude(&samples);
        assert_eq!(mag.len(), fft_size_for(2000) / 2 + 1);
    }

    #[test]
    fn sine_wave_peaks_near_expected_bin() {
        let rate = 44100.0f32;
        let freq = 1000.0f32;
        let n = 2048;
        let samples: Vec<f32> = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate).sin())
            .collect();
        let mag = fft_magnitude(&samples);
        let expected_bin = (freq * n as f32 / rate).round() as usize;
        let peak_bin = mag
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert!((peak_bin as i64 - expected_bin as i64).abs() <= 1);
    }
}
