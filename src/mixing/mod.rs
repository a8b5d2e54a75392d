//! Mix & Master (spec §4.9).

pub mod chain;
pub mod effect;

pub use chain::{apply_master, limit_and_normalize, master_chain, Chain};
pub use effect::{Effect, EffectKind};
