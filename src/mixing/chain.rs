//! Effect chains (spec §4.9): ordered enabled effects applied in sequence,
//! `reset()` propagated to every member.

use super::effect::{Effect, EffectKind};

#[derive(Debug, Default)]
pub struct Chain {
    effects: Vec<Effect>,
}

impl Chain {
    pub fn new() -> Self {
        Chain::default()
    }

    pub fn push(&mut self, effect: Effect) -> &mut Self {
        self.effects.push(effect);
        self
    }

    pub fn process(&mut self, buffer: &mut [f32], rate: f32) {
        for effect in self.effects.iter_mut() {
            effect.process(buffer, rate);
        }
    }

    pub fn reset(&mut self) {
        for effect in self.effects.iter_mut() {
            effect.reset();
        }
    }

    pub fn effects_mut(&mut self) -> &mut [Effect] {
        &mut self.effects
    }
}

/// EQ -> Compressor -> Reverb -> Limiter (hard clip) -> peak-normalise to 0.95.
pub fn master_chain(rate: f32) -> Chain {
    let mut chain = Chain::new();
    chain
        .push(Effect::new(EffectKind::eq(150.0, 6000.0, 2.0, 1.0)))
        .push(Effect::new(EffectKind::compressor(-18.0, 3.0, 0.01, 0.15, 3.0)))
        .push(Effect::new(EffectKind::reverb(0.25, 0.5, rate)));
    if let Some(reverb) = chain.effects_mut().last_mut() {
        reverb.mix = 0.12;
    }
    chain
}

const LIMITER_THRESHOLD: f32 = 0.98;
const NORMALIZE_PEAK: f32 = 0.95;

/// Applies the fixed limiter + peak-normalise tail of the master chain that
/// doesn't fit the per-sample `Effect` model (it needs the whole buffer's peak).
pub fn limit_and_normalize(buffer: &mut [f32]) {
    for sample in buffer.iter_mut() {
        *sample = sample.clamp(-LIMITER_THRESHOLD, LIMITER_THRESHOLD);
    }
    let peak = buffer.iter().fold(0.0f32, |m, &x| m.max(x.abs()));
    if peak > 0.0 {
        let gain = NORMALIZE_PEAK / peak;
        for sample in buffer.iter_mut() {
            *sample *= gain;
        }
    }
}

/// Runs the full master sequence: chain (EQ/Compressor/Reverb) then limiter + normalise.
pub fn apply_master(chain: &mut Chain, buffer: &mut [f32], rate: f32) {
    chain.process(buffer, rate);
    limit_and_normalize(buffer);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_chain_normalizes_peak_to_0_95() {
        let mut chain = master_chain(44100.0);
        let mut buffer = vec![0.0f32; 2048];
        for (i, s) in buffer.iter_mut().enumerate() {
            *s = (i as f32 * 0.1).sin() * 1.5;
        }
        apply_master(&mut chain, &mut buffer, 44100.0);
        let peak = buffer.iter().fold(0.0f32, |m, &x| m.max(x.abs()));
        assert!((peak - NORMALIZE_PEAK).abs() < 1e-3 || peak <= NORMALIZE_PEAK);
    }

    #[test]
    fn reset_propagates_to_every_effect() {
        let mut chain = Chain::new();
        chain.push(Effect::new(EffectKind::delay(0.01, 0.5, 44100.0)));
        let mut buffer = vec![1.0; 256];
        chain.process(&mut buffer, 44100.0);
        chain.reset();
        let mut silence = vec![0.0f32; 16];
        chain.process(&mut silence, 44100.0);
        assert!(silence.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn limiter_hard_clips_above_threshold() {
        let mut buffer = vec![2.0, -2.0, 0.1];
        limit_and_normalize(&mut buffer);
        assert!(buffer.iter().all(|&s| s.abs() <= NORMALIZE_PEAK + 1e-6));
    }
}
