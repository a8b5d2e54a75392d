//! Genre classification rule table (spec §4.3), used when no learned model
//! is loaded. Tiered: first match wins.

/// `< 0.2` -> soft, `> 0.5` -> hard, else medium.
pub fn intensity(rms: f32) -> String {
    if rms < 0.2 {
        "soft".to_string()
    } else if rms > 0.5 {
        "hard".to_string()
    } else {
        "medium".to_string()
    }
}

/// `> 0.4` -> bass-heavy, `< 0.2` -> soft, else medium.
pub fn bass_level(bass_energy_ratio: f32) -> String {
    if bass_energy_ratio > 0.4 {
        "bass-heavy".to_string()
    } else if bass_energy_ratio < 0.2 {
        "soft".to_string()
    } else {
        "medium".to_string()
    }
}

/// `centroid_norm` is spectral centroid normalised by Nyquist (0..1ish).
pub fn classify_genre(
    bpm: f32,
    intensity: &str,
    bass_level: &str,
    centroid_norm: f32,
    zcr: f32,
) -> String {
    let bass_heavy = bass_level == "bass-heavy";
    let hard = intensity == "hard";
    let medium = intensity == "medium";
    let soft = intensity == "soft";

    if (130.0..=150.0).contains(&bpm) && bass_heavy {
        return "Trap".to_string();
    }
    if (120.0..=135.0).contains(&bpm) && hard {
        return "Techno".to_string();
    }
    if (130.0..=160.0).contains(&bpm) && centroid_norm > 0.5 {
        return "Trance".to_string();
    }
    if (120.0..=180.0).contains(&bpm) && hard && zcr > 0.15 {
        return "Metal".to_string();
    }
    if (90.0..=140.0).contains(&bpm) && medium {
        return "Rock".to_string();
    }
    if (100.0..=130.0).contains(&bpm) && (soft || medium) {
        return "Pop".to_string();
    }
    if bpm < 100.0 && soft {
        return "Classical".to_string();
    }
    if ((135.0..=145.0).contains(&bpm) || (65.0..=75.0).contains(&bpm)) && bass_heavy {
        return "Dubstep".to_string();
    }
    if (120.0..=130.0).contains(&bpm) {
        return "House".to_string();
    }
    "Electronic".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intensity_thresholds() {
        assert_eq!(intensity(0.1), "soft");
        assert_eq!(intensity(0.3), "medium");
        assert_eq!(intensity(0.6), "hard");
    }

    #[test]
    fn bass_level_thresholds() {
        assert_eq!(bass_level(0.5), "bass-heavy");
        assert_eq!(bass_level(0.1), "soft");
        assert_eq!(bass_level(0.3), "medium");
    }

    #[test]
    fn trap_tier_wins_first() {
        assert_eq!(classify_genre(140.0, "hard", "bass-heavy", 0.2, 0.05), "Trap");
    }

    #[test]
    fn techno_requires_hard_intensity() {
        assert_eq!(classify_genre(128.0, "hard", "medium", 0.2, 0.05), "Techno");
    }

    #[test]
    fn trance_requires_bright_centroid() {
        assert_eq!(classify_genre(150.0, "medium", "soft", 0.6, 0.05), "Trance");
    }

    #[test]
    fn metal_requires_hard_and_high_zcr() {
        assert_eq!(classify_genre(160.0, "hard", "medium", 0.1, 0.2), "Metal");
    }

    #[test]
    fn rock_requires_medium_intensity() {
        assert_eq!(classify_genre(110.0, "medium", "medium", 0.1, 0.05), "Rock");
    }

    #[test]
    fn pop_accepts_soft_or_medium() {
        assert_eq!(classify_genre(110.0, "soft", "soft", 0.1, 0.05), "Pop");
    }

    #[test]
    fn classical_is_slow_and_soft() {
        assert_eq!(classify_genre(70.0, "soft", "soft", 0.1, 0.05), "Classical");
    }

    #[test]
    fn dubstep_bass_heavy_bpm_bands() {
        assert_eq!(classify_genre(140.0, "soft", "bass-heavy", 0.1, 0.05), "Dubstep");
        assert_eq!(classify_genre(70.0, "hard", "bass-heavy", 0.6, 0.05), "Dubstep");
    }

    #[test]
    fn house_fallback_band() {
        assert_eq!(classify_genre(125.0, "medium", "soft", 0.1, 0.05), "House");
    }

    #[test]
    fn electronic_is_final_fallback() {
        assert_eq!(classify_genre(200.0, "soft", "soft", 0.1, 0.05), "Electronic");
    }

    #[test]
    fn trap_tier_beats_dubstep_tier() {
        // Overlapping bpm/bass-heavy band: Trap's tier comes first.
        assert_eq!(classify_genre(140.0, "medium", "bass-heavy", 0.1, 0.05), "Trap");
    }
}
