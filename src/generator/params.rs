//! Generator input configuration (spec §3, §4.10).

/// The generator's input configuration.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub genre: String,
    pub sub_genre: String,
    pub bpm: f32,
    pub intensity: String,
    pub bass_level: String,
    pub duration_secs: f32,
    pub use_vocals: bool,
    pub vocal_style: String,
    pub include_intro: bool,
    pub include_outro: bool,
    pub include_bridge: bool,
    pub include_breakdown: bool,
    pub verses: u32,
    pub choruses: u32,
    pub energy: f32,
    pub complexity: f32,
    pub variation: f32,
    pub source_track_ids: Vec<i64>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        GenerationParams {
            genre: "Pop".to_string(),
            sub_genre: String::new(),
            bpm: 120.0,
            intensity: "medium".to_string(),
            bass_level: "medium".to_string(),
            duration_secs: 180.0,
            use_vocals: false,
            vocal_style: String::new(),
            include_intro: true,
            include_outro: true,
            include_bridge: false,
            include_breakdown: false,
            verses: 2,
            choruses: 3,
            energy: 0.5,
            complexity: 0.5,
            variation: 0.5,
            source_track_ids: Vec::new(),
        }
    }
}

impl GenerationParams {
    /// BPM 60..200, duration 1..600 s, energy/complexity/variation 0..1
    /// (spec §4.10 failure semantics: out-of-range params return false
    /// without writing output).
    pub fn is_valid(&self) -> bool {
        (60.0..=200.0).contains(&self.bpm)
            && (1.0..=600.0).contains(&self.duration_secs)
            && (0.0..=1.0).contains(&self.energy)
            && (0.0..=1.0).contains(&self.complexity)
            && (0.0..=1.0).contains(&self.variation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_are_valid() {
        assert!(GenerationParams::default().is_valid());
    }

    #[test]
    fn bpm_out_of_range_is_invalid() {
        let mut p = GenerationParams::default();
        p.bpm = 40.0;
        assert!(!p.is_valid());
        p.bpm = 250.0;
        assert!(!p.is_valid());
    }

    #[test]
    fn duration_out_of_range_is_invalid() {
        let mut p = GenerationParams::default();
        p.duration_secs = 0.0;
        assert!(!p.is_valid());
        p.duration_secs = 900.0;
        assert!(!p.is_valid());
    }

    #[test]
    fn scalars_outside_unit_range_are_invalid() {
        let mut p = GenerationParams::default();
        p.energy = 1.5;
        assert!(!p.is_valid());
        p.energy = 0.5;
        p.complexity = -0.1;
        assert!(!p.is_valid());
        p.complexity = 0.5;
        p.variation = 2.0;
        assert!(!p.is_valid());
    }
}
