//! Bass Line Engine (spec §4.8.3).

use crate::composition::chord::Chord;
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BassStyle {
    Root,
    Walking,
    Syncopated,
    Pedal,
    Arpeggiated,
    OctaveJumps,
}

#[derive(Debug, Clone, Copy)]
pub struct BassNote {
    pub beat: f32,
    pub pitch: u8,
    pub velocity: f32,
}

fn range_for_genre(genre: &str) -> (u8, u8) {
    match genre {
        "Trap" => (24, 48),
        "Metal" => (28, 55),
        "EDM" | "House" | "Techno" | "Trance" | "Dubstep" => (28, 60),
        _ => (28, 67),
    }
}

fn clamp_to_range(pitch: i32, range: (u8, u8)) -> u8 {
    let mut p = pitch;
    while p < range.0 as i32 {
        p += 12;
    }
    while p > range.1 as i32 {
        p -= 12;
    }
    p.clamp(range.0 as i32, range.1 as i32) as u8
}

fn style_for(genre: &str, style: &str) -> BassStyle {
    if style != "auto" {
        return match style {
            "walking" => BassStyle::Walking,
            "syncopated" => BassStyle::Syncopated,
            "pedal" => BassStyle::Pedal,
            "arpeggiated" => BassStyle::Arpeggiated,
            "octave" => BassStyle::OctaveJumps,
            _ => BassStyle::Root,
        };
    }
    match genre {
        "Jazz" => BassStyle::Walking,
        "Funk" | "Trap" | "EDM" | "House" | "Techno" | "Trance" | "Dubstep" => BassStyle::Syncopated,
        _ => BassStyle::Root,
    }
}

/// Generate a bass line for a chord progression.
pub fn generate_from_chords(chords: &[Chord], genre: &str, style: &str) -> Vec<BassNote> {
    let range = range_for_genre(genre);
    let resolved_style = style_for(genre, style);
    let mut notes = Vec::new();
    let mut beat_cursor = 0.0f32;

    for (i, chord) in chords.iter().enumerate() {
        let root = clamp_to_range(48 + chord.root as i32, range);
        let third = clamp_to_range(48 + chord.root as i32 + if chord.notes.len() > 1 { 4 } else { 3 }, range);
        let fifth = clamp_to_range(48 + chord.root as i32 + 7, range);
        let next_root = chords.get(i + 1).map(|c| 48 + c.root as i32).unwrap_or(48 + chord.root as i32);

        match resolved_style {
            BassStyle::Root => {
                notes.push(BassNote { beat: beat_cursor, pitch: root, velocity: 0.8 });
            }
            BassStyle::Walking => {
                notes.push(BassNote { beat: beat_cursor, pitch: root, velocity: 0.8 });
                notes.push(BassNote { beat: beat_cursor + 1.0, pitch: third, velocity: 0.7 });
                notes.push(BassNote { beat: beat_cursor + 2.0, pitch: fifth, velocity: 0.7 });
                let approach = clamp_to_range(
                    next_root + if next_root >= 48 + chord.root as i32 { -1 } else { 1 },
                    range,
                );
                notes.push(BassNote { beat: beat_cursor + 3.0, pitch: approach, velocity: 0.65 });
            }
            BassStyle::Syncopated => {
                notes.push(BassNote { beat: beat_cursor, pitch: root, velocity: 0.85 });
                notes.push(BassNote { beat: beat_cursor + 1.5, pitch: fifth, velocity: 0.7 });
                notes.push(BassNote { beat: beat_cursor + 2.75, pitch: root, velocity: 0.7 });
            }
            BassStyle::Pedal => {
                for b in 0..4 {
                    notes.push(BassNote { beat: beat_cursor + b as f32, pitch: root, velocity: 0.75 });
                }
            }
            BassStyle::Arpeggiated => {
                let tones = [root, third, fifth, third];
                for (j, &pitch) in tones.iter().enumerate() {
                    notes.push(BassNote { beat: beat_cursor + j as f32 * 0.5, pitch, velocity: 0.7 });
                }
            }
            BassStyle::OctaveJumps => {
                let high = clamp_to_range(root as i32 + 12, range);
                notes.push(BassNote { beat: beat_cursor, pitch: root, velocity: 0.85 });
                notes.push(BassNote { beat: beat_cursor + 2.0, pitch: high, velocity: 0.8 });
            }
        }
        beat_cursor += chord.duration_beats;
    }
    notes
}

/// Slide into each note from a semitone below, inserting a short grace note.
pub fn add_slides(notes: &mut Vec<BassNote>) {
    let mut slid = Vec::with_capacity(notes.len() * 2);
    for note in notes.iter() {
        slid.push(BassNote {
            beat: (note.beat - 0.1).max(0.0),
            pitch: note.pitch.saturating_sub(1),
            velocity: note.velocity * 0.6,
        });
        slid.push(*note);
    }
    *notes = slid;
}

pub fn add_ghost_notes(notes: &mut Vec<BassNote>, probability: f32, rng: &mut impl Rng) {
    let mut ghosts = Vec::new();
    for pair in notes.windows(2) {
        if rng.gen::<f32>() < probability {
            ghosts.push(BassNote {
                beat: (pair[0].beat + pair[1].beat) / 2.0,
                pitch: pair[0].pitch,
                velocity: 0.3,
            });
        }
    }
    notes.extend(ghosts);
    notes.sort_by(|a, b| a.beat.partial_cmp(&b.beat).unwrap());
}

pub fn humanize(notes: &mut [BassNote], amount: f32, rng: &mut impl Rng) {
    for note in notes.iter_mut() {
        let time_jitter = (rng.gen::<f32>() - 0.5) * 2.0 * 0.02 * amount;
        let vel_jitter = (rng.gen::<f32>() - 0.5) * 2.0 * 0.1 * amount;
        note.beat = (note.beat + time_jitter).max(0.0);
        note.velocity = (note.velocity + vel_jitter).clamp(0.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::chord::{Chord, ChordType, HarmonicFunction};

    fn sample_chords() -> Vec<Chord> {
        vec![
            Chord::new(0, ChordType::Major, HarmonicFunction::Tonic, 4, 4.0),
            Chord::new(7, ChordType::Major, HarmonicFunction::Dominant, 4, 4.0),
        ]
    }

    #[test]
    fn jazz_defaults_to_walking() {
        assert_eq!(style_for("Jazz", "auto"), BassStyle::Walking);
    }

    #[test]
    fn trap_defaults_to_syncopated() {
        assert_eq!(style_for("Trap", "auto"), BassStyle::Syncopated);
    }

    #[test]
    fn default_genre_uses_root() {
        assert_eq!(style_for("Pop", "auto"), BassStyle::Root);
    }

    #[test]
    fn walking_bass_has_four_notes_per_chord() {
        let notes = generate_from_chords(&sample_chords(), "Jazz", "auto");
        assert_eq!(notes.len(), 8);
    }

    #[test]
    fn notes_stay_within_genre_range() {
        let notes = generate_from_chords(&sample_chords(), "Trap", "auto");
        for n in notes {
            assert!(n.pitch >= 24 && n.pitch <= 48);
        }
    }

    #[test]
    fn syncopated_offsets_match_spec() {
        let notes = generate_from_chords(&sample_chords(), "Trap", "auto");
        assert!((notes[1].beat - 1.5).abs() < 1e-6);
        assert!((notes[2].beat - 2.75).abs() < 1e-6);
    }
}
