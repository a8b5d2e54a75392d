//! Pattern Capture (spec §4.7): rhythm and melody capture modes, similarity
//! scoring, analogy transformations, and a text-based pattern library.
//!
//! The audio input device itself is an external collaborator and is not
//! modelled here; `RhythmCapture`/`MelodyCapture` consume plain `&[f32]`
//! buffers however they are sourced.

pub mod analogy;
pub mod library;
pub mod melody;
pub mod rhythm;

pub use library::{Pattern, PatternLibrary};
pub use melody::{CapturedMelody, MelodyCapture, Note};
pub use rhythm::{CapturedRhythm, RhythmCapture};
