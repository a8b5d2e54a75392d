//! Pattern library: plain-text persistence keyed by pattern id, tolerant of
//! schema drift (spec §4.7), in the same key=value idiom as
//! `instruments::InstrumentExtractor`'s learned-parameter file.

use super::melody::{CapturedMelody, Note};
use super::rhythm::CapturedRhythm;
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::Path;

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone)]
pub enum Pattern {
    Rhythm(CapturedRhythm),
    Melody(CapturedMelody),
}

#[derive(Debug, Default)]
pub struct PatternLibrary {
    patterns: HashMap<String, Pattern>,
}

impl PatternLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, pattern: Pattern) {
        self.patterns.insert(id.into(), pattern);
    }

    pub fn get(&self, id: &str) -> Option<&Pattern> {
        self.patterns.get(id)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let mut file = std::fs::File::create(path)?;
        for (id, pattern) in &self.patterns {
            writeln!(file, "[pattern:{id}]")?;
            writeln!(file, "version={SCHEMA_VERSION}")?;
            match pattern {
                Pattern::Rhythm(r) => {
                    writeln!(file, "type=rhythm")?;
                    writeln!(file, "onsets={}", join_f64(&r.onsets))?;
                    writeln!(file, "amplitudes={}", join_f32(&r.amplitudes))?;
                    writeln!(file, "duration_secs={}", r.duration_secs)?;
                    writeln!(file, "tempo_bpm={}", r.tempo_bpm)?;
                    writeln!(file, "quantized_beats={}", join_f32(&r.quantized_beats))?;
                    writeln!(file, "time_signature={},{}", r.time_signature.0, r.time_signature.1)?;
                }
                Pattern::Melody(m) => {
                    writeln!(file, "type=melody")?;
                    let notes: Vec<String> =
                        m.notes.iter().map(|n| format!("{}:{}", n.midi_note, n.duration_secs)).collect();
                    writeln!(file, "notes={}", notes.join(","))?;
                    writeln!(file, "key={}", m.key)?;
                    writeln!(file, "mode={}", m.mode)?;
                }
            }
            writeln!(file)?;
        }
        Ok(())
    }

    /// Entries whose `version` does not match the current schema are
    /// skipped, not treated as a parse error.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::open(path)?;
        let mut library = PatternLibrary::new();
        let mut current_id: Option<String> = None;
        let mut fields: HashMap<String, String> = HashMap::new();

        for line in std::io::BufReader::new(file).lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                flush_block(&mut library, &mut current_id, &mut fields);
                continue;
            }
            if let Some(stripped) = line.strip_prefix("[pattern:").and_then(|s| s.strip_suffix(']')) {
                flush_block(&mut library, &mut current_id, &mut fields);
                current_id = Some(stripped.to_string());
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                fields.insert(key.to_string(), value.to_string());
            }
        }
        flush_block(&mut library, &mut current_id, &mut fields);
        Ok(library)
    }
}

fn flush_block(library: &mut PatternLibrary, current_id: &mut Option<String>, fields: &mut HashMap<String, String>) {
    let Some(id) = current_id.take() else {
        fields.clear();
        return;
    };
    if let Some(pattern) = parse_block(fields) {
        library.insert(id, pattern);
    }
    fields.clear();
}

fn parse_block(fields: &HashMap<String, String>) -> Option<Pattern> {
    let version: u32 = fields.get("version")?.parse().ok()?;
    if version != SCHEMA_VERSION {
        return None;
    }
    match fields.get("type").map(String::as_str)? {
        "rhythm" => Some(Pattern::Rhythm(CapturedRhythm {
            onsets: parse_f64_list(fields.get("onsets")?),
            amplitudes: parse_f32_list(fields.get("amplitudes")?),
            duration_secs: fields.get("duration_secs")?.parse().ok()?,
            tempo_bpm: fields.get("tempo_bpm")?.parse().ok()?,
            quantized_beats: parse_f32_list(fields.get("quantized_beats")?),
            time_signature: {
                let (a, b) = fields.get("time_signature")?.split_once(',')?;
                (a.parse().ok()?, b.parse().ok()?)
            },
        })),
        "melody" => Some(Pattern::Melody(CapturedMelody {
            notes: fields
                .get("notes")?
                .split(',')
                .filter(|s| !s.is_empty())
                .filter_map(|entry| {
                    let (note, dur) = entry.split_once(':')?;
                    Some(Note { midi_note: note.parse().ok()?, duration_secs: dur.parse().ok()? })
                })
                .collect(),
            key: fields.get("key")?.clone(),
            mode: fields.get("mode")?.clone(),
        })),
        _ => None,
    }
}

fn join_f64(v: &[f64]) -> String {
    v.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(",")
}

fn join_f32(v: &[f32]) -> String {
    v.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(",")
}

fn parse_f64_list(s: &str) -> Vec<f64> {
    s.split(',').filter(|s| !s.is_empty()).filter_map(|x| x.parse().ok()).collect()
}

fn parse_f32_list(s: &str) -> Vec<f32> {
    s.split(',').filter(|s| !s.is_empty()).filter_map(|x| x.parse().ok()).collect()
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

    #[test]
    fn round_trips_a_rhythm_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patterns.txt");
        let mut library = PatternLibrary::new();
        library.insert("r1", Pattern::Rhythm(rhythm()));
        library.save(&path).unwrap();

        let loaded = PatternLibrary::load(&path).unwrap();
        match loaded.get("r1").unwrap() {
            Pattern::Rhythm(r) => assert_eq!(r.tempo_bpm, 120.0),
            _ => panic!("expected rhythm pattern"),
        }
    }

    #[test]
    fn mismatched_schema_version_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patterns.txt");
        std::fs::write(&path, "[pattern:old]\nversion=99\ntype=rhythm\n\n").unwrap();
        let loaded = PatternLibrary::load(&path).unwrap();
        assert!(loaded.is_empty());
    }
}
