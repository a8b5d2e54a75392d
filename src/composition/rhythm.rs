//! Rhythm Engine (spec §4.8.2): genre-parameterised 16th-note grids plus
//! humanisation operators.

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RhythmGenre {
    FourOnTheFloor,
    Trap,
    Rock,
    Dnb,
    House,
    Jazz,
    Metal,
    Breakbeat,
}

impl RhythmGenre {
    /// Humanisation amount applied by `generate` (spec §4.8.2 table).
    pub fn humanize_amount(self) -> f32 {
        match self {
            RhythmGenre::Trap => 0.35,
            RhythmGenre::House => 0.1,
            RhythmGenre::Rock => 0.55,
            RhythmGenre::Jazz => 0.66,
            RhythmGenre::Metal => 0.2,
            RhythmGenre::Breakbeat => 0.4,
            RhythmGenre::FourOnTheFloor => 0.1,
            RhythmGenre::Dnb => 0.4,
        }
    }
}

/// A single struck note: beat position (in 16th-note grid units from 0) and velocity 0..1.
#[derive(Debug, Clone, Copy)]
pub struct Hit {
    pub beat: f32,
    pub velocity: f32,
}

#[derive(Debug, Clone, Default)]
pub struct RhythmPattern {
    pub hits: Vec<Hit>,
}

impl RhythmPattern {
    pub fn new(hits: Vec<Hit>) -> Self {
        RhythmPattern { hits }
    }

    /// Delay off-beat 8th-note hits (odd 8th-note slots) by `amount * 0.1` beats.
    pub fn apply_swing(&mut self, amount: f32) {
        for hit in &mut self.hits {
            let eighth_index = (hit.beat * 2.0).round() as i64;
            if eighth_index % 2 != 0 {
                hit.beat += amount * 0.1;
            }
        }
    }

    /// Gaussian-ish jitter of time (±0.02·amount beats) and velocity (±0.1·amount).
    pub fn humanize(&mut self, amount: f32, rng: &mut impl Rng) {
        for hit in &mut self.hits {
            let time_jitter = (rng.gen::<f32>() - 0.5) * 2.0 * 0.02 * amount;
            let vel_jitter = (rng.gen::<f32>() - 0.5) * 2.0 * 0.1 * amount;
            hit.beat = (hit.beat + time_jitter).max(0.0);
            hit.velocity = (hit.velocity + vel_jitter).clamp(0.0, 1.0);
        }
    }

    /// Snap every hit to the nearest multiple of `grid` beats.
    pub fn quantize(&mut self, grid: f32) {
        if grid <= 0.0 {
            return;
        }
        for hit in &mut self.hits {
            hit.beat = (hit.beat / grid).round() * grid;
        }
    }

    /// Insert a velocity-0.3 ghost note at the midpoint between each pair of hits.
    pub fn add_ghost_notes(&mut self, probability: f32, rng: &mut impl Rng) {
        let mut ghosts = Vec::new();
        for pair in self.hits.windows(2) {
            if rng.gen::<f32>() < probability {
                ghosts.push(Hit {
                    beat: (pair[0].beat + pair[1].beat) / 2.0,
                    velocity: 0.3,
                });
            }
        }
        self.hits.extend(ghosts);
        self.hits.sort_by(|a, b| a.beat.partial_cmp(&b.beat).unwrap());
    }

    /// Boost velocity by 0.2 on hits falling on any of `beats`.
    pub fn apply_accents(&mut self, beats: &[f32]) {
        for hit in &mut self.hits {
            if beats.iter().any(|b| (b - hit.beat).abs() < 1e-3) {
                hit.velocity = (hit.velocity + 0.2).min(1.0);
            }
        }
    }
}

/// Superimpose an `over`-against-`under` polyrhythm across `bars` bars of 4/4.
pub fn create_polyrhythm(over: u32, under: u32, bars: u32) -> RhythmPattern {
    let mut hits = Vec::new();
    let total_beats = bars as f32 * 4.0;
    let step = total_beats * under as f32 / (over as f32 * under as f32).max(1.0);
    let mut beat = 0.0f32;
    while beat < total_beats {
        hits.push(Hit { beat, velocity: 0.8 });
        beat += step;
    }
    RhythmPattern::new(hits)
}

fn basic_kick(genre: RhythmGenre, bars: u32) -> RhythmPattern {
    let mut hits = Vec::new();
    for bar in 0..bars {
        let base = bar as f32 * 4.0;
        match genre {
            RhythmGenre::FourOnTheFloor | RhythmGenre::House => {
                for beat in 0..4 {
                    hits.push(Hit { beat: base + beat as f32, velocity: 0.9 });
                }
            }
            RhythmGenre::Trap => {
                hits.push(Hit { beat: base, velocity: 0.9 });
                hits.push(Hit { beat: base + 1.75, velocity: 0.8 });
                hits.push(Hit { beat: base + 2.5, velocity: 0.8 });
            }
            RhythmGenre::Dnb | RhythmGenre::Breakbeat => {
                hits.push(Hit { beat: base, velocity: 0.9 });
                hits.push(Hit { beat: base + 2.25, velocity: 0.7 });
            }
            RhythmGenre::Metal => {
                for i in 0..8 {
                    hits.push(Hit { beat: base + i as f32 * 0.5, velocity: 0.85 });
                }
            }
            RhythmGenre::Jazz => {
                hits.push(Hit { beat: base, velocity: 0.7 });
            }
            RhythmGenre::Rock => {
                hits.push(Hit { beat: base, velocity: 0.9 });
                hits.push(Hit { beat: base + 2.0, velocity: 0.85 });
            }
        }
    }
    RhythmPattern::new(hits)
}

fn basic_snare(genre: RhythmGenre, bars: u32) -> RhythmPattern {
    let mut hits = Vec::new();
    for bar in 0..bars {
        let base = bar as f32 * 4.0;
        match genre {
            RhythmGenre::Jazz => {
                hits.push(Hit { beat: base + 1.0, velocity: 0.6 });
                hits.push(Hit { beat: base + 3.0, velocity: 0.6 });
            }
            _ => {
                hits.push(Hit { beat: base + 1.0, velocity: 0.85 });
                hits.push(Hit { beat: base + 3.0, velocity: 0.85 });
            }
        }
    }
    RhythmPattern::new(hits)
}

fn basic_hihat(genre: RhythmGenre, bars: u32) -> RhythmPattern {
    let mut hits = Vec::new();
    let step: f32 = match genre {
        RhythmGenre::Trap | RhythmGenre::Metal => 0.25,
        _ => 0.5,
    };
    for bar in 0..bars {
        let base = bar as f32 * 4.0;
        let mut beat = 0.0f32;
        while beat < 4.0 {
            hits.push(Hit { beat: base + beat, velocity: 0.5 });
            beat += step;
        }
    }
    RhythmPattern::new(hits)
}

#[derive(Debug, Clone)]
pub struct RhythmArrangement {
    pub kick: RhythmPattern,
    pub snare: RhythmPattern,
    pub hihat: RhythmPattern,
    pub percussion: RhythmPattern,
    pub bass_rhythm: RhythmPattern,
    pub tempo: f32,
    pub time_signature: (u8, u8),
}

/// Compose kick + snare + hihat with genre-specific humanisation.
pub fn generate(genre: RhythmGenre, tempo: f32, bars: u32) -> RhythmArrangement {
    let mut rng = rand::thread_rng();
    let amount = genre.humanize_amount();

    let mut kick = basic_kick(genre, bars);
    let mut snare = basic_snare(genre, bars);
    let mut hihat = basic_hihat(genre, bars);
    kick.humanize(amount, &mut rng);
    snare.humanize(amount, &mut rng);
    hihat.humanize(amount, &mut rng);

    if genre == RhythmGenre::Jazz {
        hihat.apply_swing(0.66);
    }

    RhythmArrangement {
        kick,
        snare,
        hihat,
        percussion: RhythmPattern::default(),
        bass_rhythm: RhythmPattern::default(),
        tempo,
        time_signature: (4, 4),
    }
}

/// A short genre-appropriate drum fill covering `beats` beats.
pub fn generate_fill(genre: RhythmGenre, beats: f32) -> RhythmPattern {
    let step = match genre {
        RhythmGenre::Metal | RhythmGenre::Trap => 0.25,
        _ => 0.5,
    };
    let mut hits = Vec::new();
    let mut beat = 0.0f32;
    let mut velocity = 0.6f32;
    while beat < beats {
        hits.push(Hit { beat, velocity });
        velocity = (velocity + 0.05).min(1.0);
        beat += step;
    }
    RhythmPattern::new(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn four_on_the_floor_has_one_kick_per_beat() {
        let kick = basic_kick(RhythmGenre::FourOnTheFloor, 1);
        assert_eq!(kick.hits.len(), 4);
    }

    #[test]
    fn swing_only_delays_offbeat_eighths() {
        let mut pattern = RhythmPattern::new(vec![
            Hit { beat: 0.0, velocity: 0.8 },
            Hit { beat: 0.5, velocity: 0.8 },
        ]);
        pattern.apply_swing(1.0);
        assert_eq!(pattern.hits[0].beat, 0.0);
        assert!((pattern.hits[1].beat - 0.6).abs() < 1e-6);
    }

    #[test]
    fn quantize_snaps_to_grid() {
        let mut pattern = RhythmPattern::new(vec![Hit { beat: 0.23, velocity: 0.5 }]);
        pattern.quantize(0.25);
        assert!((pattern.hits[0].beat - 0.25).abs() < 1e-6);
    }

    #[test]
    fn humanize_stays_within_bounds() {
        let mut rng = rand_pcg::Pcg32::seed_from_u64(42);
        let mut pattern = RhythmPattern::new(vec![Hit { beat: 1.0, velocity: 0.5 }]);
        pattern.humanize(1.0, &mut rng);
        assert!((pattern.hits[0].beat - 1.0).abs() <= 0.02);
        assert!((pattern.hits[0].velocity - 0.5).abs() <= 0.1);
    }

    #[test]
    fn accents_boost_matching_beats() {
        let mut pattern = RhythmPattern::new(vec![Hit { beat: 0.0, velocity: 0.5 }]);
        pattern.apply_accents(&[0.0]);
        assert!((pattern.hits[0].velocity - 0.7).abs() < 1e-6);
    }

    #[test]
    fn generate_produces_expected_time_signature() {
        let arrangement = generate(RhythmGenre::Rock, 120.0, 4);
        assert_eq!(arrangement.time_signature, (4, 4));
        assert!(!arrangement.kick.hits.is_empty());
    }
}
