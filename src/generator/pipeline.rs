//! Generator Orchestrator (spec §4.10): binds the Media Store, Learning
//! Engine, Composition Engines, and Mix & Master into the `generate`
//! pipeline. Phase progress fractions (0.2/0.4/0.6/0.75/0.85/0.95/1.0) are
//! part of the external contract and must stay in this order.

use std::path::Path;

use rand::Rng;

use super::params::GenerationParams;
use crate::composition::chord::Scale;
use crate::composition::rhythm::Hit;
use crate::io;
use crate::learning::VaeModel;
use crate::mixing;
use crate::store::models::Track;
use crate::store::Store;

const SAMPLE_RATE: u32 = 44100;
const MELODY_ROOT_MIDI: i32 = 60;
const DEFAULT_MP3_KBPS: u32 = 192;
const FADE_IN_MS: f32 = 100.0;

fn midi_to_freq(midi: i32) -> f32 {
    440.0 * 2f32.powf((midi as f32 - 69.0) / 12.0)
}

/// Box-Muller standard normal sample, avoiding a dependency on `rand_distr`
/// for the one place the pipeline needs a Gaussian (the latent draw).
fn standard_normal(rng: &mut impl Rng) -> f32 {
    let u1: f32 = rng.gen::<f32>().max(1e-9);
    let u2: f32 = rng.gen::<f32>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos()
}

/// Attack/decay/sustain/release gain envelope, `len` samples long.
fn adsr_envelope(len: usize, rate: u32, attack_s: f32, decay_s: f32, sustain: f32, release_s: f32) -> Vec<f32> {
    let rate = rate as f32;
    let attack_n = (attack_s * rate) as usize;
    let decay_n = (decay_s * rate) as usize;
    let release_n = (release_s * rate) as usize;
    (0..len)
        .map(|i| {
            if i < attack_n {
                i as f32 / attack_n.max(1) as f32
            } else if i < attack_n + decay_n {
                let t = (i - attack_n) as f32 / decay_n.max(1) as f32;
                1.0 - t * (1.0 - sustain)
            } else if i + release_n >= len {
                let t = (len - i) as f32 / release_n.max(1) as f32;
                sustain * t
            } else {
                sustain
            }
        })
        .collect()
}

/// A single-oscillator sine tone with a short ADSR envelope.
fn synth_tone(freq: f32, duration_secs: f32, velocity: f32, rate: u32) -> Vec<f32> {
    let len = ((duration_secs.max(0.0) * rate as f32) as usize).max(1);
    let env = adsr_envelope(len, rate, 0.01, 0.05, 0.7, 0.03);
    (0..len)
        .map(|i| {
            let t = i as f32 / rate as f32;
            (2.0 * std::f32::consts::PI * freq * t).sin() * env[i] * velocity
        })
        .collect()
}

fn white_noise(len: usize, rng: &mut impl Rng) -> Vec<f32> {
    (0..len).map(|_| rng.gen::<f32>() * 2.0 - 1.0).collect()
}

fn synth_kick(velocity: f32, rate: u32) -> Vec<f32> {
    let len = ((0.15 * rate as f32) as usize).max(1);
    (0..len)
        .map(|i| {
            let t = i as f32 / rate as f32;
            let freq = 150.0 - (100.0 * (t / 0.15).min(1.0));
            let env = (-t * 25.0).exp();
            (2.0 * std::f32::consts::PI * freq * t).sin() * env * velocity
        })
        .collect()
}

fn synth_snare(velocity: f32, rate: u32, rng: &mut impl Rng) -> Vec<f32> {
    let len = ((0.1 * rate as f32) as usize).max(1);
    let noise = white_noise(len, rng);
    (0..len)
        .map(|i| {
            let t = i as f32 / rate as f32;
            let env = (-t * 30.0).exp();
            let tone = (2.0 * std::f32::consts::PI * 200.0 * t).sin() * 0.4;
            (noise[i] * 0.6 + tone) * env * velocity
        })
        .collect()
}

fn synth_hihat(velocity: f32, rate: u32, rng: &mut impl Rng) -> Vec<f32> {
    let len = ((0.05 * rate as f32) as usize).max(1);
    let noise = white_noise(len, rng);
    (0..len)
        .map(|i| {
            let t = i as f32 / rate as f32;
            let env = (-t * 80.0).exp();
            noise[i] * env * velocity
        })
        .collect()
}

fn synth_clap(velocity: f32, rate: u32, rng: &mut impl Rng) -> Vec<f32> {
    let len = ((0.06 * rate as f32) as usize).max(1);
    let burst = (0.01 * rate as f32) as usize;
    let mut out = vec![0.0f32; len];
    for offset in [0usize, burst, burst * 2] {
        let noise = white_noise(len, rng);
        for i in offset..len {
            let t = (i - offset) as f32 / rate as f32;
            out[i] += noise[i] * (-t * 60.0).exp() * velocity;
        }
    }
    out
}

fn beat_to_frame(beat: f32, bpm: f32, rate: u32) -> usize {
    ((beat.max(0.0) * 60.0 / bpm) * rate as f32) as usize
}

fn mix_add(buffer: &mut [f32], start_frame: usize, sound: &[f32], gain: f32) {
    for (i, &s) in sound.iter().enumerate() {
        let frame = start_frame + i;
        if frame >= buffer.len() {
            break;
        }
        buffer[frame] += s * gain;
    }
}

/// Combines a scale's pitch-class intervals with a degree's own octave
/// offset into an absolute MIDI note — `Scale::degree` only reports the
/// pitch class, which loses the octave the melody phase actually needs.
fn degree_to_midi(intervals: &[i32], root_midi: i32, degree: i32) -> i32 {
    let len = intervals.len() as i32;
    let octave = degree.div_euclid(len);
    let idx = degree.rem_euclid(len) as usize;
    root_midi + intervals[idx] + 12 * octave
}

fn scale_intervals_for_genre(genre: &str) -> Vec<i32> {
    match genre {
        "Trap" => Scale::MinorPentatonic.intervals().to_vec(),
        "Techno" => vec![0, 7],
        "Pop" | "Rock" => Scale::Major.intervals().to_vec(),
        "Metal" => Scale::Phrygian.intervals().to_vec(),
        _ => (0..12).collect(),
    }
}

fn note_length_pattern(genre: &str) -> [f32; 4] {
    match genre {
        "Trap" => [0.25, 0.25, 0.5, 1.0],
        "Techno" => [0.5, 0.5, 0.5, 0.5],
        "Metal" => [0.25, 0.25, 0.25, 1.25],
        "Pop" | "Rock" => [1.0, 1.0, 1.0, 1.0],
        _ => [0.5, 0.5, 1.0, 1.0],
    }
}

/// Phase 0.2: trained-model latent-sample path if a model is loaded,
/// otherwise a genre-scale random-walk path with an ADSR envelope per note.
fn generate_melody(params: &GenerationParams, model: Option<&VaeModel>, total_frames: usize, rate: u32, rng: &mut impl Rng) -> Vec<f32> {
    let mut buffer = vec![0.0f32; total_frames];
    let sixteenth_s = 60.0 / params.bpm / 4.0;

    if let Some(model) = model.filter(|m| m.trained) {
        let latent: Vec<f32> = (0..crate::learning::model::LATENT_DIM).map(|_| standard_normal(rng)).collect();
        let features = model.generate(&latent, &params.genre, params.bpm);
        let mut cursor = 0usize;
        let mut step = 0usize;
        while cursor < total_frames {
            let modulation = features[step % features.len()];
            let freq = (220.0 * (1.0 + 0.1 * modulation)).abs().max(20.0);
            let tone = synth_tone(freq, sixteenth_s, 0.8, rate);
            mix_add(&mut buffer, cursor, &tone, 1.0);
            cursor += tone.len().max(1);
            step += 1;
        }
        return buffer;
    }

    let intervals = scale_intervals_for_genre(&params.genre);
    let pattern = note_length_pattern(&params.genre);
    let mut degree = 0i32;
    let mut cursor = 0usize;
    let mut note_idx = 0usize;
    while cursor < total_frames {
        for _ in 0..4 {
            if cursor >= total_frames {
                break;
            }
            let midi = degree_to_midi(&intervals, MELODY_ROOT_MIDI, degree);
            let freq = midi_to_freq(midi);
            let beats = pattern[note_idx % 4];
            let duration_secs = beats * 60.0 / params.bpm;
            let tone = synth_tone(freq, duration_secs, 0.8, rate);
            mix_add(&mut buffer, cursor, &tone, 1.0);
            cursor += tone.len().max(1);
            note_idx += 1;
            degree += rng.gen_range(-2..=2);
        }
    }
    buffer
}

/// Phase 0.4: kick on 1 & 3 with occasional 16th-fills, snare on 2 & 4,
/// genre-conditional hihats and claps (spec §4.10 literal rules).
fn generate_rhythm(params: &GenerationParams, total_frames: usize, rate: u32, rng: &mut impl Rng) -> Vec<f32> {
    let mut buffer = vec![0.0f32; total_frames];
    let total_beats = (params.duration_secs * params.bpm / 60.0).ceil() as i64;

    let mut kicks: Vec<Hit> = Vec::new();
    let mut snares: Vec<Hit> = Vec::new();
    let mut hihats: Vec<Hit> = Vec::new();
    let mut claps: Vec<Hit> = Vec::new();

    let mut window_start = 0i64;
    while window_start < total_beats {
        for bar in 0..4i64 {
            let bar_start = window_start + bar * 4;
            if bar_start >= total_beats {
                break;
            }
            kicks.push(Hit { beat: bar_start as f32, velocity: 0.9 });
            kicks.push(Hit { beat: (bar_start + 2) as f32, velocity: 0.85 });
            snares.push(Hit { beat: (bar_start + 1) as f32, velocity: 0.85 });
            snares.push(Hit { beat: (bar_start + 3) as f32, velocity: 0.85 });
        }
        let fill_start = window_start + 12;
        for step in 0..16 {
            let beat = fill_start as f32 + step as f32 * 0.25;
            if beat as i64 >= total_beats {
                break;
            }
            if rng.gen::<f32>() < 0.3 {
                kicks.push(Hit { beat, velocity: 0.6 });
            }
        }
        window_start += 16;
    }

    if matches!(params.genre.as_str(), "Techno" | "Trap" | "Trance") {
        let mut beat = 0.5f32;
        while (beat as i64) < total_beats {
            hihats.push(Hit { beat, velocity: 0.5 });
            beat += 1.0;
        }
    }
    if params.genre == "Trap" {
        for beat in 0..total_beats {
            if beat % 8 == 4 {
                claps.push(Hit { beat: beat as f32, velocity: 0.8 });
            }
        }
    }

    for hit in &kicks {
        let sound = synth_kick(hit.velocity, rate);
        mix_add(&mut buffer, beat_to_frame(hit.beat, params.bpm, rate), &sound, 1.0);
    }
    for hit in &snares {
        let sound = synth_snare(hit.velocity, rate, rng);
        mix_add(&mut buffer, beat_to_frame(hit.beat, params.bpm, rate), &sound, 1.0);
    }
    for hit in &hihats {
        let sound = synth_hihat(hit.velocity, rate, rng);
        mix_add(&mut buffer, beat_to_frame(hit.beat, params.bpm, rate), &sound, 1.0);
    }
    for hit in &claps {
        let sound = synth_clap(hit.velocity, rate, rng);
        mix_add(&mut buffer, beat_to_frame(hit.beat, params.bpm, rate), &sound, 1.0);
    }

    buffer
}

fn bass_roots_for_genre(genre: &str) -> [i32; 4] {
    match genre {
        "Techno" | "Trap" => [36, 38, 40, 36],
        "Metal" | "Rock" => [40, 38, 37, 35],
        _ => [36, 37, 38, 36],
    }
}

fn bass_mix_level(bass_level: &str) -> f32 {
    match bass_level {
        "bass-heavy" => 0.6,
        "soft" => 0.2,
        _ => 0.4,
    }
}

/// Phase 0.6: genre root table, alternating 1/2-beat note lengths, level by bass tag.
fn generate_bass(params: &GenerationParams, total_frames: usize, rate: u32) -> Vec<f32> {
    let mut buffer = vec![0.0f32; total_frames];
    let roots = bass_roots_for_genre(&params.genre);
    let lengths = [1.0f32, 2.0, 1.0, 2.0];
    let level = bass_mix_level(&params.bass_level);

    let mut cursor = 0usize;
    let mut i = 0usize;
    while cursor < total_frames {
        let freq = midi_to_freq(roots[i % roots.len()]);
        let duration_secs = lengths[i % lengths.len()] * 60.0 / params.bpm;
        let tone = synth_tone(freq, duration_secs, 0.9, rate);
        mix_add(&mut buffer, cursor, &tone, level);
        cursor += tone.len().max(1);
        i += 1;
    }
    buffer
}

/// `select_source_samples(params, count=20)`: matching genre, BPM within ±20.
pub fn select_source_samples(store: &Store, params: &GenerationParams, count: usize) -> Vec<Track> {
    let mut tracks = store.search_by_genre(&params.genre).unwrap_or_default();
    tracks.retain(|t| (t.bpm - params.bpm).abs() <= 20.0);
    tracks.truncate(count);
    tracks
}

/// Phase 0.75: up to `5·complexity` decoded source layers at `0.1/(layer+1)`.
/// Decode failures are skipped and logged, never fatal to generation.
fn layer_instruments(store: &Store, params: &GenerationParams, total_frames: usize, rate: u32) -> Vec<f32> {
    let mut buffer = vec![0.0f32; total_frames];
    let tracks = select_source_samples(store, params, 20);
    let layer_count = ((5.0 * params.complexity).round() as usize).min(tracks.len());

    for (layer, track) in tracks.iter().take(layer_count).enumerate() {
        match io::load_audio(Path::new(&track.path)) {
            Ok(audio) if !audio.samples.is_empty() => {
                let resampled = if audio.rate != rate {
                    crate::dsp::linear_resample(&audio.samples, audio.rate as f32, rate as f32)
                } else {
                    audio.samples
                };
                if resampled.is_empty() {
                    continue;
                }
                let level = 0.1 / (layer as f32 + 1.0);
                for (i, sample) in buffer.iter_mut().enumerate() {
                    *sample += resampled[i % resampled.len()] * level;
                }
            }
            Ok(_) => {}
            Err(e) => {
                log::warn!("skipping unreadable source sample {}: {e}", track.path);
            }
        }
    }
    buffer
}

const VOWEL_FORMANTS: [[f32; 3]; 5] = [
    [730.0, 1090.0, 2440.0], // a
    [530.0, 1840.0, 2480.0], // e
    [270.0, 2290.0, 3010.0], // i
    [570.0, 840.0, 2410.0],  // o
    [300.0, 870.0, 2240.0],  // u
];

/// Phase 0.85: only when `use_vocals`; a formant triad every second measure.
fn generate_vocals(params: &GenerationParams, total_frames: usize, rate: u32, rng: &mut impl Rng) -> Vec<f32> {
    let mut buffer = vec![0.0f32; total_frames];
    if !params.use_vocals {
        return buffer;
    }
    let measure_secs = 4.0 * 60.0 / params.bpm;
    let measure_frames = (measure_secs * rate as f32) as usize;
    if measure_frames == 0 {
        return buffer;
    }

    let mut measure = 0usize;
    let mut cursor = 0usize;
    while cursor < total_frames {
        if measure % 2 == 1 {
            let vowel = &VOWEL_FORMANTS[rng.gen_range(0..VOWEL_FORMANTS.len())];
            let len = measure_frames.min(total_frames - cursor);
            let env = adsr_envelope(len, rate, 0.05, 0.1, 0.8, 0.2);
            for formant in vowel {
                for i in 0..len {
                    let t = i as f32 / rate as f32;
                    buffer[cursor + i] += (2.0 * std::f32::consts::PI * formant * t).sin() * env[i] * 0.15 * 0.2;
                }
            }
        }
        cursor += measure_frames;
        measure += 1;
    }
    buffer
}

fn apply_fade_in(buffer: &mut [f32], rate: u32) {
    let len = ((FADE_IN_MS / 1000.0) * rate as f32) as usize;
    let len = len.min(buffer.len());
    for i in 0..len {
        buffer[i] *= i as f32 / len.max(1) as f32;
    }
}

/// `generate(params, output_path, progress_sink) → bool` (spec §4.10).
/// Invalid params return `false` without touching the filesystem; decode
/// failures on source samples are skipped, not fatal; encoder failure
/// returns `false`.
pub fn generate(
    store: &Store,
    model: Option<&VaeModel>,
    params: &GenerationParams,
    output_path: &Path,
    mut progress_sink: impl FnMut(f32),
) -> bool {
    if !params.is_valid() {
        return false;
    }

    let rate = SAMPLE_RATE;
    let total_frames = ((params.duration_secs * rate as f32) as usize).max(1);
    let mut rng = rand::thread_rng();
    let mut mix = vec![0.0f32; total_frames];

    let melody = generate_melody(params, model, total_frames, rate, &mut rng);
    add_into(&mut mix, &melody);
    progress_sink(0.2);

    let rhythm = generate_rhythm(params, total_frames, rate, &mut rng);
    add_into(&mut mix, &rhythm);
    progress_sink(0.4);

    let bass = generate_bass(params, total_frames, rate);
    add_into(&mut mix, &bass);
    progress_sink(0.6);

    let layers = layer_instruments(store, params, total_frames, rate);
    add_into(&mut mix, &layers);
    progress_sink(0.75);

    let vocals = generate_vocals(params, total_frames, rate, &mut rng);
    add_into(&mut mix, &vocals);
    progress_sink(0.85);

    let mut chain = mixing::master_chain(rate as f32);
    mixing::apply_master(&mut chain, &mut mix, rate as f32);
    progress_sink(0.95);

    apply_fade_in(&mut mix, rate);

    let encoded = if output_path.extension().and_then(|e| e.to_str()) == Some("wav") {
        io::encode_wav(output_path, &mix, rate).is_ok()
    } else {
        io::encode_mp3(output_path, &mix, rate, DEFAULT_MP3_KBPS).is_ok()
    };
    if !encoded {
        return false;
    }
    progress_sink(1.0);
    true
}

fn add_into(dest: &mut [f32], src: &[f32]) {
    for (d, s) in dest.iter_mut().zip(src.iter()) {
        *d += s;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use rand::SeedableRng;

    #[test]
    fn degree_to_midi_advances_octave_beyond_scale_length() {
        let intervals = Scale::Major.intervals();
        let root = degree_to_midi(intervals, 60, 0);
        let octave_up = degree_to_midi(intervals, 60, intervals.len() as i32);
        assert_eq!(octave_up - root, 12);
    }

    #[test]
    fn invalid_params_return_false_without_writing_output() {
        let store = Store::open_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.wav");
        let mut params = GenerationParams::default();
        params.bpm = 10.0;
        let ok = generate(&store, None, &params, &out, |_| {});
        assert!(!ok);
        assert!(!out.exists());
    }

    #[test]
    fn untrained_generation_writes_a_wav_file() {
        let store = Store::open_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.wav");
        let mut params = GenerationParams::default();
        params.duration_secs = 2.0;
        let ok = generate(&store, None, &params, &out, |_| {});
        assert!(ok);
        assert!(out.exists());
    }

    #[test]
    fn melody_random_walk_stays_bounded_per_step() {
        let mut rng = rand_pcg::Pcg32::seed_from_u64(7);
        let params = GenerationParams { bpm: 120.0, duration_secs: 1.0, ..GenerationParams::default() };
        let buf = generate_melody(&params, None, (1.0 * 44100.0) as usize, 44100, &mut rng);
        assert_eq!(buf.len(), 44100);
    }

    #[test]
    fn vocals_are_silent_unless_requested() {
        let mut rng = rand_pcg::Pcg32::seed_from_u64(3);
        let params = GenerationParams { use_vocals: false, ..GenerationParams::default() };
        let buf = generate_vocals(&params, 44100, 44100, &mut rng);
        assert!(buf.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn select_source_samples_filters_by_bpm_window() {
        let store = Store::open_in_memory().unwrap();
        let mut params = GenerationParams::default();
        params.genre = "Rock".to_string();
        params.bpm = 120.0;
        let tracks = select_source_samples(&store, &params, 20);
        assert!(tracks.is_empty());
    }
}
