//! Instrument Extractor (spec §4.4): isolates kick/snare/hihat/bass/lead
//! samples from a track and learns per-class band/clarity thresholds from
//! user feedback.

use crate::dsp;
use crate::io::{self, DecodeError};
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentClass {
    Kick,
    Snare,
    Hihat,
    Clap,
    Bass,
    Lead,
    Pad,
    Fx,
    Unknown,
}

impl InstrumentClass {
    fn as_str(self) -> &'static str {
        match self {
            InstrumentClass::Kick => "kick",
            InstrumentClass::Snare => "snare",
            InstrumentClass::Hihat => "hihat",
            InstrumentClass::Clap => "clap",
            InstrumentClass::Bass => "bass",
            InstrumentClass::Lead => "lead",
            InstrumentClass::Pad => "pad",
            InstrumentClass::Fx => "fx",
            InstrumentClass::Unknown => "unknown",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "kick" => InstrumentClass::Kick,
            "snare" => InstrumentClass::Snare,
            "hihat" => InstrumentClass::Hihat,
            "clap" => InstrumentClass::Clap,
            "bass" => InstrumentClass::Bass,
            "lead" => InstrumentClass::Lead,
            "pad" => InstrumentClass::Pad,
            "fx" => InstrumentClass::Fx,
            "unknown" => InstrumentClass::Unknown,
            _ => return None,
        })
    }

    fn drum_classes() -> &'static [InstrumentClass] {
        &[InstrumentClass::Kick, InstrumentClass::Snare, InstrumentClass::Hihat, InstrumentClass::Clap]
    }
}

#[derive(Debug, Clone)]
pub struct InstrumentSample {
    pub class: InstrumentClass,
    pub origin_path: String,
    pub start_secs: f64,
    pub duration_secs: f64,
    pub sample_rate: u32,
    pub samples: Vec<f32>,
    pub dominant_frequency: f32,
    pub spectral_centroid: f32,
    pub energy: f32,
    pub clarity: f32,
    pub time_since_last_hit: f64,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy)]
struct ClassParams {
    low_hz: f32,
    high_hz: f32,
    min_clarity: f32,
    cut_ms: f32,
    ioi_mean: f32,
    ioi_variance: f32,
}

fn default_params(class: InstrumentClass) -> ClassParams {
    match class {
        InstrumentClass::Kick => ClassParams { low_hz: 20.0, high_hz: 150.0, min_clarity: 0.5, cut_ms: 200.0, ioi_mean: 0.5, ioi_variance: 0.0 },
        InstrumentClass::Snare => ClassParams { low_hz: 150.0, high_hz: 4000.0, min_clarity: 0.45, cut_ms: 100.0, ioi_mean: 1.0, ioi_variance: 0.0 },
        InstrumentClass::Hihat => ClassParams { low_hz: 4000.0, high_hz: 16000.0, min_clarity: 0.4, cut_ms: 50.0, ioi_mean: 0.25, ioi_variance: 0.0 },
        InstrumentClass::Clap => ClassParams { low_hz: 1000.0, high_hz: 6000.0, min_clarity: 0.45, cut_ms: 100.0, ioi_mean: 1.0, ioi_variance: 0.0 },
        InstrumentClass::Bass => ClassParams { low_hz: 40.0, high_hz: 400.0, min_clarity: 0.5, cut_ms: 800.0, ioi_mean: 0.5, ioi_variance: 0.0 },
        InstrumentClass::Lead => ClassParams { low_hz: 400.0, high_hz: 5000.0, min_clarity: 0.5, cut_ms: 800.0, ioi_mean: 0.5, ioi_variance: 0.0 },
        InstrumentClass::Pad => ClassParams { low_hz: 200.0, high_hz: 3000.0, min_clarity: 0.3, cut_ms: 1000.0, ioi_mean: 2.0, ioi_variance: 0.0 },
        InstrumentClass::Fx => ClassParams { low_hz: 20.0, high_hz: 20000.0, min_clarity: 0.3, cut_ms: 500.0, ioi_mean: 2.0, ioi_variance: 0.0 },
        InstrumentClass::Unknown => ClassParams { low_hz: 20.0, high_hz: 20000.0, min_clarity: 0.3, cut_ms: 500.0, ioi_mean: 1.0, ioi_variance: 0.0 },
    }
}

pub struct InstrumentExtractor {
    params: HashMap<InstrumentClass, ClassParams>,
    history: Vec<(f32, InstrumentClass, f32)>,
    high_quality: HashMap<InstrumentClass, Vec<(f32, f32)>>,
    appends_since_optimize: u32,
}

impl Default for InstrumentExtractor {
    fn default() -> Self {
        let classes = [
            InstrumentClass::Kick,
            InstrumentClass::Snare,
            InstrumentClass::Hihat,
            InstrumentClass::Clap,
            InstrumentClass::Bass,
            InstrumentClass::Lead,
            InstrumentClass::Pad,
            InstrumentClass::Fx,
            InstrumentClass::Unknown,
        ];
        let params = classes.iter().map(|&c| (c, default_params(c))).collect();
        InstrumentExtractor {
            params,
            history: Vec::new(),
            high_quality: HashMap::new(),
            appends_since_optimize: 0,
        }
    }
}

impl InstrumentExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Band-pass, detect onsets, cut fixed-length excerpts per class, keep
    /// those clearing the class's clarity threshold. Caps per file at 10
    /// drums, 5 bass, 5 lead.
    pub fn extract(&self, path: &Path, min_quality: f32) -> Result<Vec<InstrumentSample>, DecodeError> {
        let buf = io::load_audio(path)?;
        let rate = buf.rate as f32;
        let origin = path.to_string_lossy().to_string();

        let mut out = Vec::new();
        let mut drum_count = 0usize;
        let mut bass_count = 0usize;
        let mut lead_count = 0usize;

        for &class in &[
            InstrumentClass::Kick,
            InstrumentClass::Snare,
            InstrumentClass::Hihat,
            InstrumentClass::Clap,
            InstrumentClass::Bass,
            InstrumentClass::Lead,
        ] {
            let cap = match class {
                InstrumentClass::Bass => &mut bass_count,
                InstrumentClass::Lead => &mut lead_count,
                _ => &mut drum_count,
            };
            let limit = match class {
                InstrumentClass::Bass => 5,
                InstrumentClass::Lead => 5,
                _ => 10,
            };
            if *cap >= limit {
                continue;
            }

            let p = self.params[&class];
            let filtered = dsp::band_pass(&buf.samples, p.low_hz, p.high_hz.min(rate / 2.0 - 1.0), rate);
            let onsets = dsp::detect_onsets(&filtered, rate, 0.5);

            let mut last_onset = 0.0f64;
            for &onset_s in &onsets {
                if *cap >= limit {
                    break;
                }
                let start = (onset_s * rate) as usize;
                let len = ((p.cut_ms / 1000.0) * rate) as usize;
                if start >= filtered.len() {
                    continue;
                }
                let end = (start + len).min(filtered.len());
                let window = &filtered[start..end];
                if window.is_empty() {
                    continue;
                }

                let energy = (window.iter().map(|x| x * x).sum::<f32>() / window.len() as f32).sqrt();
                let peak = window.iter().fold(0.0f32, |m, &x| m.max(x.abs()));
                let mean = window.iter().map(|x| x.abs()).sum::<f32>() / window.len() as f32;
                let clarity = if peak > 0.0 { (peak - mean) / peak } else { 0.0 };

                if energy < 0.001 || clarity < p.min_clarity {
                    continue;
                }

                let magnitude = dsp::fft_magnitude(window);
                let centroid = spectral_centroid_local(&magnitude, rate);
                let dominant = dominant_frequency_local(&magnitude, rate);
                let confidence = (clarity.min(1.0) * min_quality.clamp(0.0, 1.0)).clamp(0.0, 1.0);

                out.push(InstrumentSample {
                    class,
                    origin_path: origin.clone(),
                    start_secs: onset_s as f64,
                    duration_secs: (end - start) as f64 / rate as f64,
                    sample_rate: buf.rate,
                    samples: window.to_vec(),
                    dominant_frequency: dominant,
                    spectral_centroid: centroid,
                    energy,
                    clarity,
                    time_since_last_hit: onset_s as f64 - last_onset,
                    confidence,
                });
                last_onset = onset_s as f64;
                *cap += 1;
            }
        }

        Ok(out)
    }

    /// Append to the training history; when `user_quality >= 0.8` moves the
    /// class's range/threshold toward the observed sample. Never mutates
    /// stored samples. Runs `optimize()` every 10 appends.
    pub fn train(&mut self, sample: &InstrumentSample, class: InstrumentClass, user_quality: f32) {
        self.history.push((sample.dominant_frequency, class, user_quality));

        if user_quality >= 0.8 {
            let entry = self.high_quality.entry(class).or_default();
            entry.push((sample.dominant_frequency, sample.clarity));

            let p = self.params.get_mut(&class).unwrap();
            p.low_hz = p.low_hz * 0.9 + sample.dominant_frequency.min(p.low_hz) * 0.1;
            p.high_hz = p.high_hz * 0.9 + sample.dominant_frequency.max(p.high_hz) * 0.1;
            p.min_clarity = p.min_clarity * 0.9 + sample.clarity * 0.1;
        }

        self.appends_since_optimize += 1;
        if self.appends_since_optimize >= 10 {
            self.optimize();
            self.appends_since_optimize = 0;
        }
    }

    /// For each class with enough high-quality samples, tighten its range to
    /// `[0.8*min, 1.2*max]` and its clarity floor to `0.8*mean`, without
    /// widening into a neighbouring class by more than 10% of its span.
    pub fn optimize(&mut self) {
        let snapshot: HashMap<InstrumentClass, Vec<(f32, f32)>> = self.high_quality.clone();
        for (class, samples) in snapshot {
            if samples.len() < 3 {
                continue;
            }
            let freqs: Vec<f32> = samples.iter().map(|(f, _)| *f).collect();
            let clarities: Vec<f32> = samples.iter().map(|(_, c)| *c).collect();
            let min_f = freqs.iter().cloned().fold(f32::MAX, f32::min);
            let max_f = freqs.iter().cloned().fold(f32::MIN, f32::max);
            let mean_clarity = clarities.iter().sum::<f32>() / clarities.len() as f32;

            let p = self.params.get_mut(&class).unwrap();
            let span = (p.high_hz - p.low_hz).max(1.0);
            let new_low = (0.8 * min_f).max(p.low_hz - 0.1 * span);
            let new_high = (1.2 * max_f).min(p.high_hz + 0.1 * span);
            p.low_hz = new_low;
            p.high_hz = new_high;
            p.min_clarity = 0.8 * mean_clarity;
        }
    }

    pub fn save_learned_parameters(&self, path: &Path) -> std::io::Result<()> {
        let mut file = std::fs::File::create(path)?;
        for (&class, p) in &self.params {
            writeln!(
                file,
                "{}.low_hz={}\n{}.high_hz={}\n{}.min_clarity={}\n{}.cut_ms={}\n{}.ioi_mean={}\n{}.ioi_variance={}",
                class.as_str(), p.low_hz,
                class.as_str(), p.high_hz,
                class.as_str(), p.min_clarity,
                class.as_str(), p.cut_ms,
                class.as_str(), p.ioi_mean,
                class.as_str(), p.ioi_variance,
            )?;
        }
        Ok(())
    }

    pub fn load_learned_parameters(&mut self, path: &Path) -> std::io::Result<()> {
        let file = std::fs::File::open(path)?;
        for line in std::io::BufReader::new(file).lines() {
            let line = line?;
            let Some((key, value)) = line.split_once('=') else { continue };
            let Some((class_name, field)) = key.split_once('.') else { continue };
            let Some(class) = InstrumentClass::from_str(class_name) else { continue };
            let Ok(value) = value.parse::<f32>() else { continue };
            let p = self.params.entry(class).or_insert_with(|| default_params(class));
            match field {
                "low_hz" => p.low_hz = value,
                "high_hz" => p.high_hz = value,
                "min_clarity" => p.min_clarity = value,
                "cut_ms" => p.cut_ms = value,
                "ioi_mean" => p.ioi_mean = value,
                "ioi_variance" => p.ioi_variance = value,
                _ => {} // unknown keys ignored
            }
        }
        Ok(())
    }
}

fn spectral_centroid_local(magnitude: &[f32], rate: f32) -> f32 {
    let n_fft = magnitude.len().saturating_sub(1) * 2;
    if n_fft == 0 {
        return 0.0;
    }
    let bin_hz = rate / n_fft as f32;
    let weighted: f32 = magnitude.iter().enumerate().map(|(i, &m)| i as f32 * bin_hz * m).sum();
    let total: f32 = magnitude.iter().sum();
    if total <= 0.0 {
        0.0
    } else {
        weighted / total
    }
}

fn dominant_frequency_local(magnitude: &[f32], rate: f32) -> f32 {
    let n_fft = magnitude.len().saturating_sub(1) * 2;
    if n_fft == 0 {
        return 0.0;
    }
    let bin_hz = rate / n_fft as f32;
    let (idx, _) = magnitude
        .iter()
        .enumerate()
        .fold((0usize, 0.0f32), |best, (i, &m)| if m > best.1 { (i, m) } else { best });
    idx as f32 * bin_hz
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(class: InstrumentClass, freq: f32, clarity: f32) -> InstrumentSample {
        InstrumentSample {
            class,
            origin_path: "test.wav".to_string(),
            start_secs: 0.0,
            duration_secs: 0.2,
            sample_rate: 44100,
            samples: vec![0.0; 100],
            dominant_frequency: freq,
            spectral_centroid: freq,
            energy: 0.5,
            clarity,
            time_since_last_hit: 0.5,
            confidence: 0.8,
        }
    }

    #[test]
    fn training_moves_threshold_toward_observed_clarity_on_high_quality_sample() {
        let mut extractor = InstrumentExtractor::new();
        let before = extractor.params[&InstrumentClass::Kick];
        extractor.train(&sample(InstrumentClass::Kick, 60.0, 0.95), InstrumentClass::Kick, 0.9);
        let after = extractor.params[&InstrumentClass::Kick];
        assert_ne!(before.min_clarity, after.min_clarity);
        assert!(after.min_clarity > before.min_clarity);
    }

    #[test]
    fn low_quality_training_does_not_move_range() {
        let mut extractor = InstrumentExtractor::new();
        let before = extractor.params[&InstrumentClass::Kick];
        extractor.train(&sample(InstrumentClass::Kick, 60.0, 0.9), InstrumentClass::Kick, 0.3);
        let after = extractor.params[&InstrumentClass::Kick];
        assert_eq!(before.low_hz, after.low_hz);
        assert_eq!(before.high_hz, after.high_hz);
    }

    #[test]
    fn optimize_runs_automatically_every_ten_appends() {
        let mut extractor = InstrumentExtractor::new();
        for i in 0..10 {
            extractor.train(&sample(InstrumentClass::Snare, 500.0 + i as f32, 0.85), InstrumentClass::Snare, 0.85);
        }
        assert_eq!(extractor.appends_since_optimize, 0);
    }

    #[test]
    fn save_and_load_round_trips_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.txt");
        let mut extractor = InstrumentExtractor::new();
        extractor.train(&sample(InstrumentClass::Bass, 80.0, 0.9), InstrumentClass::Bass, 0.9);
        extractor.save_learned_parameters(&path).unwrap();

        let mut loaded = InstrumentExtractor::new();
        loaded.load_learned_parameters(&path).unwrap();
        assert_eq!(loaded.params[&InstrumentClass::Bass].low_hz, extractor.params[&InstrumentClass::Bass].low_hz);
    }

    #[test]
    fn unknown_keys_in_parameter_file_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.txt");
        std::fs::write(&path, "kick.low_hz=55\nkick.future_field=123\n").unwrap();
        let mut extractor = InstrumentExtractor::new();
        extractor.load_learned_parameters(&path).unwrap();
        assert_eq!(extractor.params[&InstrumentClass::Kick].low_hz, 55.0);
    }
}
