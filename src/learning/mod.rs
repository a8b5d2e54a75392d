//! Learning Engine (spec §4.6): genre-to-id map, on-demand training-feature
//! table, correction history, VAE-style model, and learned correction
//! patterns.

pub mod engine;
pub mod model;
pub mod similarity;

pub use engine::Engine;
pub use model::{ModelError, VaeModel};
