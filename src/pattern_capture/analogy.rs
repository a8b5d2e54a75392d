//! Pure analogy transformations over captured patterns (spec §4.7).

use super::melody::{CapturedMelody, Note};
use super::rhythm::CapturedRhythm;

/// Swaps each onset's velocity `v` to `1 - v`.
pub fn invert_rhythm(r: &CapturedRhythm) -> CapturedRhythm {
    let mut out = r.clone();
    out.amplitudes = r.amplitudes.iter().map(|&v| 1.0 - v).collect();
    out
}

/// Doubles all onset/beat times.
pub fn augment(r: &CapturedRhythm) -> CapturedRhythm {
    scale_time(r, 2.0)
}

/// Halves all onset/beat times.
pub fn diminish(r: &CapturedRhythm) -> CapturedRhythm {
    scale_time(r, 0.5)
}

fn scale_time(r: &CapturedRhythm, factor: f64) -> CapturedRhythm {
    let mut out = r.clone();
    out.onsets = r.onsets.iter().map(|&t| t * factor).collect();
    out.duration_secs = r.duration_secs * factor;
    out.quantized_beats = r.quantized_beats.iter().map(|&b| b * factor as f32).collect();
    out
}

/// Time-reverses the onset sequence, preserving total duration.
pub fn reverse_rhythm(r: &CapturedRhythm) -> CapturedRhythm {
    let mut out = r.clone();
    out.onsets = r.onsets.iter().rev().map(|&t| r.duration_secs - t).collect();
    out.onsets.reverse();
    out.amplitudes = r.amplitudes.iter().rev().cloned().collect();
    let max_beat = r.quantized_beats.iter().cloned().fold(0.0f32, f32::max);
    out.quantized_beats = r.quantized_beats.iter().rev().map(|&b| max_beat - b).collect();
    out
}

/// Reflects every note's pitch about the first note's pitch.
pub fn invert_melody(m: &CapturedMelody) -> CapturedMelody {
    let mut out = m.clone();
    if let Some(first) = m.notes.first().map(|n| n.midi_note) {
        out.notes = m
            .notes
            .iter()
            .map(|n| Note { midi_note: 2 * first - n.midi_note, duration_secs: n.duration_secs })
            .collect();
    }
    out
}

/// Time-reverses the note sequence (pitches and durations both reversed).
pub fn retrograde(m: &CapturedMelody) -> CapturedMelody {
    let mut out = m.clone();
    out.notes = m.notes.iter().rev().cloned().collect();
    out
}

/// Shifts every note by `semitones`.
pub fn transpose(m: &CapturedMelody, semitones: i32) -> CapturedMelody {
    let mut out = m.clone();
    out.notes = m.notes.iter().map(|n| Note { midi_note: n.midi_note + semitones, duration_secs: n.duration_secs }).collect();
    out
}

/// Scales the interval between each consecutive pair of notes by `factor`,
/// about the first note's pitch.
pub fn expand_intervals(m: &CapturedMelody, factor: f32) -> CapturedMelody {
    let mut out = m.clone();
    if let Some(first) = m.notes.first().map(|n| n.midi_note) {
        let mut pitch = first as f32;
        let mut notes = Vec::with_capacity(m.notes.len());
        for (i, n) in m.notes.iter().enumerate() {
            if i == 0 {
                notes.push(n.clone());
                continue;
            }
            let interval = (n.midi_note - m.notes[i - 1].midi_note) as f32 * factor;
            pitch += interval;
            notes.push(Note { midi_note: pitch.round() as i32, duration_secs: n.duration_secs });
        }
        out.notes = notes;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rhythm() -> CapturedRhythm {
        CapturedRhythm {
            onsets: vec![0.0, 0.5, 1.0],
            amplitudes: vec![0.2, 0.6, 0.9],
            duration_secs: 1.0,
            tempo_bpm: 120.0,
            quantized_beats: vec![0.0, 1.0, 2.0],
            time_signature: (4, 4),
        }
    }

    fn melody() -> CapturedMelody {
        CapturedMelody {
            notes: vec![
                Note { midi_note: 60, duration_secs: 0.5 },
                Note { midi_note: 64, duration_secs: 0.5 },
                Note { midi_note: 67, duration_secs: 0.5 },
            ],
            key: "C".to_string(),
            mode: "major".to_string(),
        }
    }

    #[test]
    fn invert_rhythm_is_involutive() {
        let r = rhythm();
        let twice = invert_rhythm(&invert_rhythm(&r));
        for (a, b) in r.amplitudes.iter().zip(twice.amplitudes.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn reverse_rhythm_is_involutive() {
        let r = rhythm();
        let twice = reverse_rhythm(&reverse_rhythm(&r));
        for (a, b) in r.onsets.iter().zip(twice.onsets.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn augment_then_diminish_round_trips() {
        let r = rhythm();
        let round_tripped = diminish(&augment(&r));
        for (a, b) in r.onsets.iter().zip(round_tripped.onsets.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn invert_melody_preserves_first_note() {
        let m = melody();
        let inverted = invert_melody(&m);
        assert_eq!(inverted.notes[0].midi_note, m.notes[0].midi_note);
        assert_eq!(inverted.notes[1].midi_note, 2 * m.notes[0].midi_note - m.notes[1].midi_note);
    }

    #[test]
    fn transpose_shifts_every_note() {
        let m = melody();
        let up = transpose(&m, 12);
        for (a, b) in m.notes.iter().zip(up.notes.iter()) {
            assert_eq!(b.midi_note, a.midi_note + 12);
        }
    }

    #[test]
    fn expand_intervals_scales_gaps_from_first_note() {
        let m = melody();
        let expanded = expand_intervals(&m, 2.0);
        assert_eq!(expanded.notes[0].midi_note, m.notes[0].midi_note);
        assert_eq!(expanded.notes[1].midi_note - expanded.notes[0].midi_note, 8);
    }
}
