//! Melody capture mode (spec §4.7): autocorrelation pitch per buffer, note
//! segmentation, and key/mode inference.

use crate::dsp;

const MIN_FREQ_HZ: f32 = 50.0;
const MAX_FREQ_HZ: f32 = 2000.0;

fn freq_to_midi(freq: f32) -> i32 {
    (69.0 + 12.0 * (freq / 440.0).log2()).round() as i32
}

#[derive(Debug, Clone)]
pub struct Note {
    pub midi_note: i32,
    pub duration_secs: f64,
}

#[derive(Debug, Default)]
pub struct MelodyCapture {
    notes: Vec<Note>,
    current_note: Option<i32>,
    buffer_secs: f64,
}

impl MelodyCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs autocorrelation pitch detection on one buffer; a MIDI note equal
    /// to the previous buffer's extends the current note, otherwise a new
    /// note begins. Frequencies outside `[50, 2000] Hz` are silence.
    pub fn process_buffer(&mut self, buffer: &[f32], rate: f32) {
        let buffer_secs = buffer.len() as f64 / rate as f64;
        let freq = dsp::autocorrelation_pitch(buffer, rate);
        let midi_note = if freq >= MIN_FREQ_HZ && freq <= MAX_FREQ_HZ { Some(freq_to_midi(freq)) } else { None };

        match (self.current_note, midi_note) {
            (Some(current), Some(next)) if current == next => {
                if let Some(last) = self.notes.last_mut() {
                    last.duration_secs += buffer_secs;
                }
            }
            (_, Some(next)) => {
                self.notes.push(Note { midi_note: next, duration_secs: buffer_secs });
                self.current_note = Some(next);
            }
            (_, None) => {
                self.current_note = None;
            }
        }
        self.buffer_secs += buffer_secs;
    }

    pub fn stop(&self) -> CapturedMelody {
        let (key, mode) = infer_key_and_mode(&self.notes);
        CapturedMelody { notes: self.notes.clone(), key, mode }
    }
}

/// Major if the major third over the tonic is present and the minor third
/// isn't; minor if the reverse; modal otherwise. The tonic is the most
/// frequent pitch class.
fn infer_key_and_mode(notes: &[Note]) -> (String, String) {
    if notes.is_empty() {
        return ("C".to_string(), "modal".to_string());
    }
    let mut histogram = [0u32; 12];
    for n in notes {
        histogram[n.midi_note.rem_euclid(12) as usize] += 1;
    }
    let tonic = histogram.iter().enumerate().max_by_key(|&(_, count)| *count).map(|(pc, _)| pc).unwrap_or(0);
    let major_third = histogram[(tonic + 4) % 12] > 0;
    let minor_third = histogram[(tonic + 3) % 12] > 0;

    let mode = if major_third && !minor_third {
        "major"
    } else if minor_third && !major_third {
        "minor"
    } else {
        "modal"
    };

    const NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
    (NAMES[tonic].to_string(), mode.to_string())
}

#[derive(Debug, Clone)]
pub struct CapturedMelody {
    pub notes: Vec<Note>,
    pub key: String,
    pub mode: String,
}

impl CapturedMelody {
    fn intervals(&self) -> Vec<i32> {
        self.notes.windows(2).map(|w| w[1].midi_note - w[0].midi_note).collect()
    }

    fn contour(&self) -> Vec<char> {
        self.intervals()
            .into_iter()
            .map(|i| if i > 0 { 'U' } else if i < 0 { 'D' } else { 'S' })
            .collect()
    }

    /// `0.6·interval_match + 0.4·contour_match`; intervals allowed ±1 semitone.
    pub fn similarity_to(&self, other: &CapturedMelody) -> f32 {
        let a_intervals = self.intervals();
        let b_intervals = other.intervals();
        if a_intervals.is_empty() || b_intervals.is_empty() {
            return 0.0;
        }
        let n = a_intervals.len().min(b_intervals.len());
        let interval_match = (0..n).filter(|&i| (a_intervals[i] - b_intervals[i]).abs() <= 1).count() as f32 / n as f32;

        let a_contour = self.contour();
        let b_contour = other.contour();
        let contour_match =
            (0..n).filter(|&i| a_contour[i] == b_contour[i]).count() as f32 / n as f32;

        (0.6 * interval_match + 0.4 * contour_match).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notes(midi: &[i32]) -> CapturedMelody {
        CapturedMelody {
            notes: midi.iter().map(|&m| Note { midi_note: m, duration_secs: 0.25 }).collect(),
            key: "C".to_string(),
            mode: "major".to_string(),
        }
    }

    #[test]
    fn identical_melodies_are_maximally_similar() {
        let a = notes(&[60, 62, 64, 65]);
        let b = notes(&[60, 62, 64, 65]);
        assert!((a.similarity_to(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn major_third_without_minor_infers_major_mode() {
        let melody_notes = vec![
            Note { midi_note: 60, duration_secs: 0.5 },
            Note { midi_note: 64, duration_secs: 0.5 },
            Note { midi_note: 67, duration_secs: 0.5 },
        ];
        let (key, mode) = infer_key_and_mode(&melody_notes);
        assert_eq!(key, "C");
        assert_eq!(mode, "major");
    }

    #[test]
    fn minor_third_without_major_infers_minor_mode() {
        let melody_notes = vec![
            Note { midi_note: 60, duration_secs: 0.5 },
            Note { midi_note: 63, duration_secs: 0.5 },
            Note { midi_note: 67, duration_secs: 0.5 },
        ];
        let (_, mode) = infer_key_and_mode(&melody_notes);
        assert_eq!(mode, "minor");
    }

    #[test]
    fn repeated_pitch_extends_the_current_note() {
        let mut capture = MelodyCapture::new();
        let rate = 44100.0;
        let n = 4096;
        let samples: Vec<f32> =
            (0..n).map(|i| (2.0 * std::f32::consts::PI * 220.0 * i as f32 / rate).sin()).collect();
        capture.process_buffer(&samples, rate);
        capture.process_buffer(&samples, rate);
        let captured = capture.stop();
        assert_eq!(captured.notes.len(), 1);
    }
}
