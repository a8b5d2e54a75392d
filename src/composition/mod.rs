//! Composition Engines (spec §4.8): chord progressions, rhythm, bass lines,
//! and song structure generation.

pub mod bassline;
pub mod chord;
pub mod rhythm;
pub mod song_structure;

pub use bassline::{generate_from_chords, BassStyle};
pub use chord::{Chord, ChordType, HarmonicFunction, Scale};
pub use rhythm::{generate as generate_rhythm, RhythmArrangement, RhythmGenre};
pub use song_structure::{generate_structure, Section, SectionType, SongStructure, TransitionType};
