//! Shared `SongStructure` / `Section` data model (spec §3), used both by the
//! Feature Extractor's `analyze_song_structure` and by this module's own
//! `generate_structure`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionType {
    Intro,
    Verse,
    PreChorus,
    Chorus,
    Bridge,
    Breakdown,
    BuildUp,
    Drop,
    Outro,
    Instrumental,
    Solo,
    Break,
}

impl SectionType {
    /// Single uppercase letter used when building an arrangement string.
    pub fn letter(self) -> char {
        match self {
            SectionType::Intro => 'I',
            SectionType::Verse => 'V',
            SectionType::PreChorus => 'P',
            SectionType::Chorus => 'C',
            SectionType::Bridge => 'B',
            SectionType::Breakdown => 'X',
            SectionType::BuildUp => 'U',
            SectionType::Drop => 'D',
            SectionType::Outro => 'O',
            SectionType::Instrumental => 'N',
            SectionType::Solo => 'S',
            SectionType::Break => 'K',
        }
    }

    /// Default (energy, complexity) pair from the fixed spec table.
    pub fn default_energy_complexity(self) -> (f32, f32) {
        match self {
            SectionType::Intro => (0.3, 0.3),
            SectionType::Verse => (0.5, 0.4),
            SectionType::PreChorus => (0.6, 0.5),
            SectionType::Chorus => (0.85, 0.7),
            SectionType::Bridge => (0.6, 0.7),
            SectionType::Breakdown => (0.3, 0.3),
            SectionType::BuildUp => (0.5, 0.6),
            SectionType::Drop => (1.0, 0.8),
            SectionType::Outro => (0.2, 0.3),
            SectionType::Instrumental => (0.8, 0.9),
            SectionType::Solo => (0.8, 0.9),
            SectionType::Break => (0.3, 0.3),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionType {
    Fill,
    Direct,
    Breakdown,
    Build,
    Fade,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub section_type: SectionType,
    pub start_beat: f32,
    pub duration_beats: f32,
    pub energy: f32,
    pub complexity: f32,
    pub incoming: Option<TransitionType>,
    pub outgoing: Option<TransitionType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongStructure {
    pub sections: Vec<Section>,
    pub arrangement: String,
    pub complexity_score: f32,
}

impl SongStructure {
    pub fn total_beats(&self) -> f32 {
        self.sections
            .iter()
            .map(|s| s.duration_beats)
            .sum()
    }

    /// Count of sections per type, in the order first encountered.
    pub fn section_type_counts(&self) -> Vec<(SectionType, usize)> {
        let mut counts: Vec<(SectionType, usize)> = Vec::new();
        for section in &self.sections {
            if let Some(entry) = counts.iter_mut().find(|(t, _)| *t == section.section_type) {
                entry.1 += 1;
            } else {
                counts.push((section.section_type, 1));
            }
        }
        counts
    }
}

fn transition_for(from: SectionType, to: SectionType) -> TransitionType {
    if matches!(to, SectionType::Breakdown) {
        return TransitionType::Breakdown;
    }
    if matches!(to, SectionType::Outro) {
        return TransitionType::Fade;
    }
    if matches!(from, SectionType::BuildUp) && matches!(to, SectionType::Drop) {
        return TransitionType::Direct;
    }
    if matches!(from, SectionType::Verse) && matches!(to, SectionType::Chorus) {
        return TransitionType::Fill;
    }
    if matches!(from, SectionType::Bridge) {
        return TransitionType::Build;
    }
    TransitionType::Direct
}

/// Default section-type arrangement for a genre, bars-per-section fixed at 8
/// (i.e. 32 beats in 4/4) unless scaled to fit `target_duration_s`.
fn default_arrangement(genre: &str) -> Vec<SectionType> {
    use SectionType::*;
    match genre {
        "EDM" | "Electronic" | "House" | "Techno" | "Trance" | "Dubstep" => {
            vec![Intro, BuildUp, Drop, Break, BuildUp, Drop, Outro]
        }
        "Rock" => vec![Intro, Verse, Chorus, Verse, Chorus, Solo, Chorus, Outro],
        "Metal" => vec![Intro, Verse, Breakdown, Chorus, Solo, Breakdown, Chorus, Outro],
        "Jazz" => vec![Verse, Solo, Solo, Solo, Verse],
        _ => vec![Intro, Verse, Chorus, Verse, Chorus, Bridge, Chorus, Outro],
    }
}

/// Generate a `SongStructure` for `genre`, fitting `target_duration_s` at `tempo` BPM.
pub fn generate_structure(genre: &str, target_duration_s: f32, tempo: f32) -> SongStructure {
    let types = default_arrangement(genre);
    let total_beats_target = (target_duration_s / 60.0 * tempo).max(1.0);
    let beats_per_section = total_beats_target / types.len() as f32;

    let mut sections = Vec::with_capacity(types.len());
    let mut cursor = 0.0f32;
    for (i, &t) in types.iter().enumerate() {
        let (energy, complexity) = t.default_energy_complexity();
        let incoming = if i == 0 {
            None
        } else {
            Some(transition_for(types[i - 1], t))
        };
        sections.push(Section {
            section_type: t,
            start_beat: cursor,
            duration_beats: beats_per_section,
            energy,
            complexity,
            incoming,
            outgoing: None,
        });
        cursor += beats_per_section;
    }
    for i in 0..sections.len().saturating_sub(1) {
        let next_type = sections[i + 1].section_type;
        sections[i].outgoing = Some(transition_for(sections[i].section_type, next_type));
    }

    let arrangement: String = types.iter().map(|t| t.letter()).collect();
    let complexity_score = if sections.is_empty() {
        0.0
    } else {
        sections.iter().map(|s| s.complexity).sum::<f32>() / sections.len() as f32
    };

    SongStructure {
        sections,
        arrangement,
        complexity_score,
    }
}
