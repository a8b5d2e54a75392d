//! Feature similarity (spec §4.6), in the teacher's normalize-then-cosine
//! idiom (`similarity.rs`).

/// Cosine similarity between two equal-or-mismatched-length vectors (the
/// shorter is zero-padded).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().max(b.len());
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for i in 0..n {
        let x = a.get(i).copied().unwrap_or(0.0);
        let y = b.get(i).copied().unwrap_or(0.0);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        0.0
    } else {
        dot / denom
    }
}

/// Normalise to unit L2 length.
fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt();
    if norm < 1e-10 {
        v.to_vec()
    } else {
        v.iter().map(|x| x / norm).collect()
    }
}

/// MFCC-only cosine similarity, both vectors L2-normalised first.
pub fn mfcc_similarity(mfcc_a: &[f32], mfcc_b: &[f32]) -> f32 {
    cosine_similarity(&normalize(mfcc_a), &normalize(mfcc_b))
}

/// `s = 0.6·cos(mfcc_A, mfcc_B) + 0.2·exp(-|bpm_A-bpm_B|/20) + 0.2·exp(-|centroid_A-centroid_B|/2000)`,
/// clamped to 0..1.
pub fn feature_similarity(
    mfcc_a: &[f32],
    bpm_a: f32,
    centroid_a: f32,
    mfcc_b: &[f32],
    bpm_b: f32,
    centroid_b: f32,
) -> f32 {
    let mfcc_sim = cosine_similarity(&normalize(mfcc_a), &normalize(mfcc_b));
    let bpm_sim = (-(bpm_a - bpm_b).abs() / 20.0).exp();
    let centroid_sim = (-(centroid_a - centroid_b).abs() / 2000.0).exp();
    (0.6 * mfcc_sim + 0.2 * bpm_sim + 0.2 * centroid_sim).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_features_are_maximally_similar() {
        let mfcc = vec![1.0, 2.0, 3.0, -1.0];
        let sim = feature_similarity(&mfcc, 120.0, 1500.0, &mfcc, 120.0, 1500.0);
        assert!((sim - 1.0).abs() < 1e-5);
    }

    #[test]
    fn distant_bpm_reduces_similarity() {
        let mfcc = vec![1.0, 2.0, 3.0, -1.0];
        let close = feature_similarity(&mfcc, 120.0, 1500.0, &mfcc, 122.0, 1500.0);
        let far = feature_similarity(&mfcc, 120.0, 1500.0, &mfcc, 200.0, 1500.0);
        assert!(close > far);
    }

    #[test]
    fn orthogonal_mfcc_still_bounded_in_0_1() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        let sim = feature_similarity(&a, 120.0, 1500.0, &b, 120.0, 1500.0);
        assert!(sim >= 0.0 && sim <= 1.0);
    }
}
