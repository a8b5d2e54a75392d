//! One-pole attack/release envelope follower (spec §4.2).

pub struct EnvelopeFollower {
    attack_coeff: f32,
    release_coeff: f32,
    level: f32,
}

impl EnvelopeFollower {
    pub fn new(attack_time_s: f32, release_time_s: f32, rate: f32) -> Self {
        Self {
            attack_coeff: (-1.0 / (attack_time_s.max(1e-6) * rate)).exp(),
            release_coeff: (-1.0 / (release_time_s.max(1e-6) * rate)).exp(),
            level: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.level = 0.0;
    }

    /// Feed one sample, return the current envelope level.
    pub fn process(&mut self, input: f32) -> f32 {
        let rectified = input.abs();
        let coeff = if rectified > self.level {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.level = coeff * self.level + (1.0 - coeff) * rectified;
        self.level
    }

    pub fn process_buffer(&mut self, samples: &[f32]) -> Vec<f32> {
        samples.iter().map(|&s| self.process(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_a_step_input() {
        let mut env = EnvelopeFollower::new(0.01, 0.1, 44100.0);
        let samples = vec![1.0f32; 4410];
        let out = env.process_buffer(&samples);
        assert!(out.last().unwrap() > &0.9);
    }

    #[test]
    fn decays_after_signal_stops() {
        let mut env = EnvelopeFollower::new(0.01, 0.05, 44100.0);
        env.process_buffer(&vec![1.0f32; 2000]);
        let after = env.process_buffer(&vec![0.0f32; 4000]);
        assert!(after.last().unwrap() < &0.1);
    }
}
