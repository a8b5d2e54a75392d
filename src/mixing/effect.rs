//! Individual effects (spec §4.9). Modelled as a tagged enum per the
//! REDESIGN FLAGS guidance (spec §9) rather than a trait-object hierarchy:
//! each effect is owned by exactly one chain, no shared ownership needed.

const COMB_TUNINGS_MS: [f32; 4] = [29.7, 37.1, 41.1, 43.7];
const ALLPASS_TUNINGS_MS: [f32; 2] = [5.0, 1.7];

#[derive(Debug, Clone)]
struct CombFilter {
    buffer: Vec<f32>,
    pos: usize,
    feedback_store: f32,
}

impl CombFilter {
    fn new(delay_samples: usize) -> Self {
        CombFilter { buffer: vec![0.0; delay_samples.max(1)], pos: 0, feedback_store: 0.0 }
    }

    fn process(&mut self, input: f32, feedback: f32, damping: f32) -> f32 {
        let out = self.buffer[self.pos];
        self.feedback_store = out * (1.0 - damping) + self.feedback_store * damping;
        self.buffer[self.pos] = input + self.feedback_store * feedback;
        self.pos = (self.pos + 1) % self.buffer.len();
        out
    }

    fn reset(&mut self) {
        self.buffer.iter_mut().for_each(|s| *s = 0.0);
        self.feedback_store = 0.0;
        self.pos = 0;
    }
}

#[derive(Debug, Clone)]
struct AllpassFilter {
    buffer: Vec<f32>,
    pos: usize,
}

impl AllpassFilter {
    fn new(delay_samples: usize) -> Self {
        AllpassFilter { buffer: vec![0.0; delay_samples.max(1)], pos: 0 }
    }

    fn process(&mut self, input: f32) -> f32 {
        let buffered = self.buffer[self.pos];
        let out = -input + buffered;
        self.buffer[self.pos] = input + buffered * 0.5;
        self.pos = (self.pos + 1) % self.buffer.len();
        out
    }

    fn reset(&mut self) {
        self.buffer.iter_mut().for_each(|s| *s = 0.0);
        self.pos = 0;
    }
}

/// One-pole shelf, `+/-12 dB` range, applied below `low_freq` or above `high_freq`.
#[derive(Debug, Clone, Copy, Default)]
struct ShelfState {
    prev_in: f32,
    prev_out: f32,
}

impl ShelfState {
    fn reset(&mut self) {
        *self = ShelfState::default();
    }
}

fn shelf_coeff(freq: f32, rate: f32) -> f32 {
    let x = (-2.0 * std::f32::consts::PI * freq / rate).exp();
    x.clamp(0.0, 0.999)
}

fn apply_low_shelf(state: &mut ShelfState, input: f32, freq: f32, gain_db: f32, rate: f32) -> f32 {
    let a = shelf_coeff(freq, rate);
    let low_passed = (1.0 - a) * input + a * state.prev_out;
    state.prev_out = low_passed;
    state.prev_in = input;
    let gain = db_to_linear(gain_db) - 1.0;
    input + gain * low_passed
}

fn apply_high_shelf(state: &mut ShelfState, input: f32, freq: f32, gain_db: f32, rate: f32) -> f32 {
    let a = shelf_coeff(freq, rate);
    let low_passed = (1.0 - a) * input + a * state.prev_out;
    let high_passed = input - low_passed;
    state.prev_out = low_passed;
    state.prev_in = input;
    let gain = db_to_linear(gain_db) - 1.0;
    input + gain * high_passed
}

fn db_to_linear(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

#[derive(Debug, Clone)]
pub enum EffectKind {
    /// 3-band EQ collapses to shelves at `low_freq`/`high_freq` with ±12 dB gains.
    Eq { low_freq: f32, high_freq: f32, low_gain_db: f32, high_gain_db: f32, low_state: ShelfState, high_state: ShelfState },
    Compressor { threshold_db: f32, ratio: f32, attack_s: f32, release_s: f32, makeup_db: f32, envelope: f32 },
    Reverb { room_size: f32, damping: f32, combs: Vec<CombFilter>, allpasses: Vec<AllpassFilter> },
    Delay { time_s: f32, feedback: f32, buffer: Vec<f32>, write_pos: usize },
    Distortion { drive: f32, tone_cutoff_hz: f32, lp_state: f32 },
    Chorus { rate_hz: f32, depth_ms: f32, buffer: Vec<f32>, write_pos: usize, phase: f32 },
    /// Equal-power pan over an interleaved L/R buffer.
    Panner { pan: f32 },
}

impl EffectKind {
    pub fn eq(low_freq: f32, high_freq: f32, low_gain_db: f32, high_gain_db: f32) -> Self {
        EffectKind::Eq {
            low_freq,
            high_freq,
            low_gain_db: low_gain_db.clamp(-12.0, 12.0),
            high_gain_db: high_gain_db.clamp(-12.0, 12.0),
            low_state: ShelfState::default(),
            high_state: ShelfState::default(),
        }
    }

    pub fn compressor(threshold_db: f32, ratio: f32, attack_s: f32, release_s: f32, makeup_db: f32) -> Self {
        EffectKind::Compressor { threshold_db, ratio: ratio.max(1.0), attack_s, release_s, makeup_db, envelope: 0.0 }
    }

    pub fn reverb(room_size: f32, damping: f32, rate: f32) -> Self {
        let scale = 1.0 + room_size.clamp(0.0, 1.0) * 2.0;
        let combs = COMB_TUNINGS_MS.iter().map(|&ms| CombFilter::new(((ms / 1000.0) * rate * scale) as usize)).collect();
        let allpasses = ALLPASS_TUNINGS_MS.iter().map(|&ms| AllpassFilter::new(((ms / 1000.0) * rate) as usize)).collect();
        EffectKind::Reverb { room_size: room_size.clamp(0.0, 1.0), damping: damping.clamp(0.0, 1.0), combs, allpasses }
    }

    pub fn delay(time_s: f32, feedback: f32, rate: f32) -> Self {
        let len = (time_s.max(0.001) * rate) as usize;
        EffectKind::Delay { time_s, feedback: feedback.clamp(0.0, 0.95), buffer: vec![0.0; len.max(1)], write_pos: 0 }
    }

    pub fn distortion(drive: f32, tone_cutoff_hz: f32) -> Self {
        EffectKind::Distortion { drive: drive.clamp(1.0, 10.0), tone_cutoff_hz, lp_state: 0.0 }
    }

    pub fn chorus(rate_hz: f32, depth_ms: f32, sample_rate: f32) -> Self {
        let max_delay_samples = ((depth_ms / 1000.0) * sample_rate * 2.0) as usize + 8;
        EffectKind::Chorus { rate_hz, depth_ms, buffer: vec![0.0; max_delay_samples], write_pos: 0, phase: 0.0 }
    }

    pub fn panner(pan: f32) -> Self {
        EffectKind::Panner { pan: pan.clamp(-1.0, 1.0) }
    }
}

/// An effect owned by exactly one chain; `enabled` gates processing, `mix`
/// blends dry/wet (0 dry, 1 wet).
#[derive(Debug, Clone)]
pub struct Effect {
    pub enabled: bool,
    pub mix: f32,
    kind: EffectKind,
}

impl Effect {
    pub fn new(kind: EffectKind) -> Self {
        Effect { enabled: true, mix: 1.0, kind }
    }

    pub fn reset(&mut self) {
        match &mut self.kind {
            EffectKind::Eq { low_state, high_state, .. } => {
                low_state.reset();
                high_state.reset();
            }
            EffectKind::Compressor { envelope, .. } => *envelope = 0.0,
            EffectKind::Reverb { combs, allpasses, .. } => {
                combs.iter_mut().for_each(CombFilter::reset);
                allpasses.iter_mut().for_each(AllpassFilter::reset);
            }
            EffectKind::Delay { buffer, write_pos, .. } => {
                buffer.iter_mut().for_each(|s| *s = 0.0);
                *write_pos = 0;
            }
            EffectKind::Distortion { lp_state, .. } => *lp_state = 0.0,
            EffectKind::Chorus { buffer, write_pos, phase, .. } => {
                buffer.iter_mut().for_each(|s| *s = 0.0);
                *write_pos = 0;
                *phase = 0.0;
            }
            EffectKind::Panner { .. } => {}
        }
    }

    pub fn process(&mut self, buffer: &mut [f32], rate: f32) {
        if !self.enabled {
            return;
        }
        let mix = self.mix.clamp(0.0, 1.0);
        match &mut self.kind {
            EffectKind::Eq { low_freq, high_freq, low_gain_db, high_gain_db, low_state, high_state } => {
                for sample in buffer.iter_mut() {
                    let dry = *sample;
                    let after_low = apply_low_shelf(low_state, dry, *low_freq, *low_gain_db, rate);
                    let wet = apply_high_shelf(high_state, after_low, *high_freq, *high_gain_db, rate);
                    *sample = dry * (1.0 - mix) + wet * mix;
                }
            }
            EffectKind::Compressor { threshold_db, ratio, attack_s, release_s, makeup_db, envelope } => {
                let attack_coeff = (-1.0 / (attack_s.max(0.0001) * rate)).exp();
                let release_coeff = (-1.0 / (release_s.max(0.0001) * rate)).exp();
                let threshold = db_to_linear(*threshold_db);
                let makeup = db_to_linear(*makeup_db);
                for sample in buffer.iter_mut() {
                    let dry = *sample;
                    let input_level = dry.abs();
                    let coeff = if input_level > *envelope { attack_coeff } else { release_coeff };
                    *envelope = coeff * *envelope + (1.0 - coeff) * input_level;
                    let gain = if *envelope > threshold {
                        let excess_db = 20.0 * (*envelope / threshold).log10();
                        db_to_linear(-excess_db * (1.0 - 1.0 / *ratio))
                    } else {
                        1.0
                    };
                    let wet = dry * gain * makeup;
                    *sample = dry * (1.0 - mix) + wet * mix;
                }
            }
            EffectKind::Reverb { damping, combs, allpasses, .. } => {
                for sample in buffer.iter_mut() {
                    let dry = *sample;
                    let mut wet: f32 = combs.iter_mut().map(|c| c.process(dry, 0.84, *damping)).sum::<f32>() / combs.len() as f32;
                    for ap in allpasses.iter_mut() {
                        wet = ap.process(wet);
                    }
                    *sample = dry * (1.0 - mix) + wet * mix;
                }
            }
            EffectKind::Delay { feedback, buffer: delay_buf, write_pos, .. } => {
                for sample in buffer.iter_mut() {
                    let dry = *sample;
                    let delayed = delay_buf[*write_pos];
                    delay_buf[*write_pos] = dry + delayed * *feedback;
                    *write_pos = (*write_pos + 1) % delay_buf.len();
                    *sample = dry * (1.0 - mix) + delayed * mix;
                }
            }
            EffectKind::Distortion { drive, tone_cutoff_hz, lp_state } => {
                let a = shelf_coeff(*tone_cutoff_hz, rate);
                let unity = drive.tanh().max(1e-6);
                for sample in buffer.iter_mut() {
                    let dry = *sample;
                    let driven = (dry * *drive).tanh() / unity;
                    let toned = (1.0 - a) * driven + a * *lp_state;
                    *lp_state = toned;
                    *sample = dry * (1.0 - mix) + toned * mix;
                }
            }
            EffectKind::Chorus { rate_hz, depth_ms, buffer: delay_buf, write_pos, phase } => {
                let depth_samples = (*depth_ms / 1000.0) * rate;
                let len = delay_buf.len();
                for sample in buffer.iter_mut() {
                    let dry = *sample;
                    delay_buf[*write_pos] = dry;
                    let lfo = (*phase).sin();
                    *phase += 2.0 * std::f32::consts::PI * *rate_hz / rate;
                    let delay_samples = depth_samples * (1.0 + lfo) / 2.0 + 2.0;
                    let read_pos = (*write_pos as f32 - delay_samples).rem_euclid(len as f32);
                    let idx0 = read_pos as usize % len;
                    let idx1 = (idx0 + 1) % len;
                    let frac = read_pos.fract();
                    let wet = delay_buf[idx0] * (1.0 - frac) + delay_buf[idx1] * frac;
                    *write_pos = (*write_pos + 1) % len;
                    *sample = dry * (1.0 - mix) + wet * mix;
                }
            }
            EffectKind::Panner { pan } => {
                let angle = (*pan * 0.5 + 0.5) * std::f32::consts::FRAC_PI_2;
                let left_gain = angle.cos();
                let right_gain = angle.sin();
                for frame in buffer.chunks_mut(2) {
                    if frame.len() == 2 {
                        let (l, r) = (frame[0], frame[1]);
                        frame[0] = l * (1.0 - mix) + l * left_gain * mix;
                        frame[1] = r * (1.0 - mix) + r * right_gain * mix;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_effect_leaves_buffer_untouched() {
        let mut effect = Effect::new(EffectKind::distortion(5.0, 4000.0));
        effect.enabled = false;
        let mut buffer = vec![0.1, -0.2, 0.3];
        let original = buffer.clone();
        effect.process(&mut buffer, 44100.0);
        assert_eq!(buffer, original);
    }

    #[test]
    fn zero_mix_is_transparent() {
        let mut effect = Effect::new(EffectKind::distortion(8.0, 4000.0));
        effect.mix = 0.0;
        let mut buffer = vec![0.1, -0.2, 0.3, 0.5];
        let original = buffer.clone();
        effect.process(&mut buffer, 44100.0);
        for (a, b) in buffer.iter().zip(original.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn compressor_reduces_level_above_threshold() {
        let mut effect = Effect::new(EffectKind::compressor(-12.0, 4.0, 0.005, 0.05, 0.0));
        let mut buffer = vec![0.9f32; 2048];
        effect.process(&mut buffer, 44100.0);
        assert!(buffer.last().unwrap().abs() < 0.9);
    }

    #[test]
    fn reset_clears_delay_buffer() {
        let mut effect = Effect::new(EffectKind::delay(0.01, 0.5, 44100.0));
        let mut buffer = vec![1.0; 512];
        effect.process(&mut buffer, 44100.0);
        effect.reset();
        if let EffectKind::Delay { buffer: delay_buf, .. } = &effect.kind {
            assert!(delay_buf.iter().all(|&s| s == 0.0));
        }
    }
}
