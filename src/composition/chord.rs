//! Chord Progression Engine (spec §4.8.1).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordType {
    Major,
    Minor,
    Dim,
    Aug,
    Maj7,
    Min7,
    Dom7,
    Dim7,
    Sus2,
    Sus4,
    Add9,
    Power,
}

impl ChordType {
    /// Semitone offsets from the root.
    fn intervals(self) -> &'static [i32] {
        match self {
            ChordType::Major => &[0, 4, 7],
            ChordType::Minor => &[0, 3, 7],
            ChordType::Dim => &[0, 3, 6],
            ChordType::Aug => &[0, 4, 8],
            ChordType::Maj7 => &[0, 4, 7, 11],
            ChordType::Min7 => &[0, 3, 7, 10],
            ChordType::Dom7 => &[0, 4, 7, 10],
            ChordType::Dim7 => &[0, 3, 6, 9],
            ChordType::Sus2 => &[0, 2, 7],
            ChordType::Sus4 => &[0, 5, 7],
            ChordType::Add9 => &[0, 4, 7, 14],
            ChordType::Power => &[0, 7],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarmonicFunction {
    Tonic,
    Subdominant,
    Dominant,
    LeadingTone,
    Other,
}

#[derive(Debug, Clone)]
pub struct Chord {
    pub root: u8,
    pub chord_type: ChordType,
    pub function: HarmonicFunction,
    pub duration_beats: f32,
    pub notes: Vec<u8>,
}

impl Chord {
    pub fn new(root: u8, chord_type: ChordType, function: HarmonicFunction, octave: i32, duration_beats: f32) -> Self {
        let base = (octave * 12) + root as i32;
        let notes = chord_type
            .intervals()
            .iter()
            .map(|&i| (base + i).clamp(0, 127) as u8)
            .collect();
        Chord {
            root,
            chord_type,
            function,
            duration_beats,
            notes,
        }
    }

    /// Dissonance/pull-to-resolve weight used by the generator to bias voicing choices.
    pub fn tension(&self) -> f32 {
        let base = match self.function {
            HarmonicFunction::Tonic => 0.0,
            HarmonicFunction::Subdominant => 0.3,
            HarmonicFunction::Dominant => 0.8,
            HarmonicFunction::LeadingTone => 0.9,
            HarmonicFunction::Other => 0.2,
        };
        let bonus = match self.chord_type {
            ChordType::Dom7 | ChordType::Dim7 => 0.2,
            _ => 0.0,
        };
        (base + bonus).min(1.0)
    }

    pub fn should_resolve(&self, next: &Chord) -> bool {
        matches!(self.function, HarmonicFunction::Dominant | HarmonicFunction::LeadingTone)
            && next.function == HarmonicFunction::Tonic
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    Major,
    Minor,
    MinorPentatonic,
    Blues,
    Phrygian,
}

impl Scale {
    pub fn intervals(self) -> &'static [i32] {
        match self {
            Scale::Major => &[0, 2, 4, 5, 7, 9, 11],
            Scale::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Scale::MinorPentatonic => &[0, 3, 5, 7, 10],
            Scale::Blues => &[0, 3, 5, 6, 7, 10],
            Scale::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
        }
    }

    /// Nth scale degree (0-indexed, wraps across octaves) as a pitch class 0..11.
    pub fn degree(self, root: u8, index: i32) -> u8 {
        let intervals = self.intervals();
        let len = intervals.len() as i32;
        let octave = index.div_euclid(len);
        let i = index.rem_euclid(len) as usize;
        (((root as i32 + intervals[i] + 12 * octave) % 12 + 12) % 12) as u8
    }
}

/// A scale-degree/chord-quality pair, e.g. (0, Major) for a tonic triad.
pub type DegreeEntry = (i32, ChordType, HarmonicFunction, f32);

fn genre_progression(genre: &str) -> Vec<DegreeEntry> {
    use ChordType::*;
    use HarmonicFunction::*;
    match genre {
        "Rock" => vec![
            (0, Major, Tonic, 4.0),
            (10, Major, Other, 4.0),
            (5, Major, Subdominant, 4.0),
            (0, Major, Tonic, 4.0),
        ],
        "Trap" | "Dubstep" => vec![
            (0, Minor, Tonic, 4.0),
            (8, Major, Other, 4.0),
            (3, Major, Other, 4.0),
            (10, Major, Other, 4.0),
        ],
        "Metal" => vec![
            (0, Power, Tonic, 2.0),
            (10, Power, Other, 2.0),
            (5, Power, Subdominant, 2.0),
            (0, Power, Tonic, 2.0),
        ],
        "Jazz" => vec![
            (2, Min7, Subdominant, 4.0),
            (7, Dom7, Dominant, 4.0),
            (0, Maj7, Tonic, 4.0),
            (9, Min7, Other, 4.0),
        ],
        "Blues" => vec![
            (0, Dom7, Tonic, 4.0),
            (0, Dom7, Tonic, 4.0),
            (0, Dom7, Tonic, 4.0),
            (0, Dom7, Tonic, 4.0),
            (5, Dom7, Subdominant, 4.0),
            (5, Dom7, Subdominant, 4.0),
            (0, Dom7, Tonic, 4.0),
            (0, Dom7, Tonic, 4.0),
            (7, Dom7, Dominant, 4.0),
            (5, Dom7, Subdominant, 4.0),
            (0, Dom7, Tonic, 4.0),
            (7, Dom7, Dominant, 4.0),
        ],
        "EDM" | "House" | "Techno" | "Trance" | "Electronic" => vec![
            (0, Minor, Tonic, 4.0),
            (10, Major, Other, 4.0),
            (8, Major, Other, 4.0),
            (10, Major, Other, 4.0),
        ],
        _ => vec![
            (0, Major, Tonic, 4.0),
            (7, Major, Dominant, 4.0),
            (9, Minor, Other, 4.0),
            (5, Major, Subdominant, 4.0),
        ],
    }
}

/// Generate a progression from a named genre's table-driven default.
pub fn generate_from_genre(genre: &str, root: u8, octave: i32) -> Vec<Chord> {
    genre_progression(genre)
        .into_iter()
        .map(|(degree, ty, func, dur)| {
            let chord_root = ((root as i32 + degree) % 12 + 12) % 12;
            Chord::new(chord_root as u8, ty, func, octave, dur)
        })
        .collect()
}

/// Generate a progression from an explicit degree/duration pattern.
pub fn generate_from_pattern(pattern: &[DegreeEntry], root: u8, octave: i32) -> Vec<Chord> {
    pattern
        .iter()
        .map(|&(degree, ty, func, dur)| {
            let chord_root = ((root as i32 + degree) % 12 + 12) % 12;
            Chord::new(chord_root as u8, ty, func, octave, dur)
        })
        .collect()
}

/// Transpose each voice of `chord` to the octave nearest `reference`,
/// within a ±6-semitone window, to minimise voice movement.
pub fn voice_lead(chord: &mut Chord, reference: &[u8]) {
    for (i, note) in chord.notes.iter_mut().enumerate() {
        let target = match reference.get(i) {
            Some(&t) => t,
            None => continue,
        };
        let mut best = *note;
        let mut best_dist = (*note as i32 - target as i32).abs();
        for octave_shift in [-24, -12, 0, 12, 24] {
            let candidate = *note as i32 + octave_shift;
            if !(0..=127).contains(&candidate) {
                continue;
            }
            let dist = (candidate - target as i32).abs();
            if dist < best_dist && dist <= 6 {
                best = candidate as u8;
                best_dist = dist;
            }
        }
        *note = best;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chord_notes_match_intervals() {
        let c = Chord::new(0, ChordType::Major, HarmonicFunction::Tonic, 4, 4.0);
        assert_eq!(c.notes, vec![48, 52, 55]);
    }

    #[test]
    fn dominant_seventh_tension_is_capped_sum() {
        let c = Chord::new(7, ChordType::Dom7, HarmonicFunction::Dominant, 4, 4.0);
        assert!((c.tension() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn tonic_has_zero_tension() {
        let c = Chord::new(0, ChordType::Major, HarmonicFunction::Tonic, 4, 4.0);
        assert_eq!(c.tension(), 0.0);
    }

    #[test]
    fn dominant_resolves_into_tonic() {
        let dominant = Chord::new(7, ChordType::Dom7, HarmonicFunction::Dominant, 4, 4.0);
        let tonic = Chord::new(0, ChordType::Major, HarmonicFunction::Tonic, 4, 4.0);
        assert!(dominant.should_resolve(&tonic));
    }

    #[test]
    fn pop_progression_is_i_v_vi_iv() {
        let chords = generate_from_genre("Pop", 0, 4);
        assert_eq!(chords.len(), 4);
        assert_eq!(chords[0].root, 0);
        assert_eq!(chords[1].root, 7);
    }

    #[test]
    fn blues_progression_has_twelve_bars() {
        let chords = generate_from_genre("Blues", 0, 4);
        assert_eq!(chords.len(), 12);
    }

    #[test]
    fn voice_leading_keeps_notes_within_window() {
        let mut c = Chord::new(0, ChordType::Major, HarmonicFunction::Tonic, 6, 4.0);
        let reference = vec![48u8, 52, 55];
        voice_lead(&mut c, &reference);
        for (note, target) in c.notes.iter().zip(reference.iter()) {
            assert!((*note as i32 - *target as i32).abs() <= 6);
        }
    }
}
