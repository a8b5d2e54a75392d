//! Generator Orchestrator (spec §4.10): binds the Media Store, Learning
//! Engine, Composition Engines, and Mix & Master into a single pipeline
//! producing a finished waveform file for a prompt.

pub mod params;
pub mod pipeline;

pub use params::GenerationParams;
pub use pipeline::{generate, select_source_samples};
