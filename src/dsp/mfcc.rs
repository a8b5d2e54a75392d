//! MFCC extraction using a 26-channel linearly-spaced filterbank covering
//! 300-5500 Hz. Per spec §4.2 / §9 this is deliberately **not** true
//! perceptual mel-warping — preserved as-is to match existing feature
//! hashes.

use super::fft::fft_magnitude;

const NUM_FILTERS: usize = 26;
const LOW_HZ: f32 = 300.0;
const FILTER_STEP_HZ: f32 = 200.0;
const DEFAULT_COEFFS: usize = 13;

/// Triangular filter boundaries: `NUM_FILTERS + 2` points at `LOW_HZ + i*FILTER_STEP_HZ`.
fn filter_boundaries() -> Vec<f32> {
    (0..=NUM_FILTERS + 1)
        .map(|i| LOW_HZ + i as f32 * FILTER_STEP_HZ)
        .collect()
}

fn filterbank_energies(magnitude: &[f32], rate: f32) -> Vec<f32> {
    let n_fft = (magnitude.len() - 1) * 2;
    let bin_hz = rate / n_fft as f32;
    let boundaries = filter_boundaries();

    let power: Vec<f32> = magnitude.iter().map(|m| m * m).collect();

    (0..NUM_FILTERS)
        .map(|f| {
            let lo = boundaries[f];
            let center = boundaries[f + 1];
            let hi = boundaries[f + 2];
            let mut energy = 0.0f32;
            for (bin, &p) in power.iter().enumerate() {
                let hz = bin as f32 * bin_hz;
                let weight = if hz >= lo && hz <= center && center > lo {
                    (hz - lo) / (center - lo)
                } else if hz > center && hz <= hi && hi > center {
                    (hi - hz) / (hi - center)
                } else {
                    0.0
                };
                energy += p * weight;
            }
            (energy + 1e-10).ln()
        })
        .collect()
}

/// Type-II DCT, returning the first `num_coeffs` coefficients.
fn dct(input: &[f32], num_coeffs: usize) -> Vec<f32> {
    let n = input.len();
    (0..num_coeffs)
        .map(|k| {
            let mut sum = 0.0f32;
            for (i, &x) in input.iter().enumerate() {
                sum += x
                    * (std::f32::consts::PI * k as f32 * (2.0 * i as f32 + 1.0) / (2.0 * n as f32))
                        .cos();
            }
            sum
        })
        .collect()
}

/// MFCC vector of length `num_coeffs` (default 13) from a single analysis window.
pub fn mfcc(samples: &[f32], rate: f32, num_coeffs: usize) -> Vec<f32> {
    let num_coeffs = if num_coeffs == 0 {
        DEFAULT_COEFFS
    } else {
        num_coeffs
    };
    let magnitude = fft_magnitude(samples);
    let log_energies = filterbank_energies(&magnitude, rate);
    dct(&log_energies, num_coeffs.min(NUM_FILTERS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_length_is_thirteen() {
        let samples: Vec<f32> = (0..2048)
            .map(|i| (i as f32 * 0.01).sin())
            .collect();
        let coeffs = mfcc(&samples, 44100.0, 13);
        assert_eq!(coeffs.len(), 13);
    }

    #[test]
    fn silence_produces_finite_coefficients() {
        let samples = vec![0.0f32; 2048];
        let coeffs = mfcc(&samples, 44100.0, 13);
        assert!(coeffs.iter().all(|c| c.is_finite()));
    }
}
