//! VAE-style latent model (spec §4.6). A small linear encoder/decoder pair
//! over plain `Vec<f32>` feature vectors, trained by hand-rolled
//! backpropagation — no ML framework, matching the teacher's manual-numerics
//! idiom (`similarity.rs`).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;

const MODEL_MAGIC: &[u8; 4] = b"SGML";
// Spec external-interface prefix is `CKPT` · epoch(i32) · loss(f32); the encoder/decoder
// weights and genre map that follow are a private continuation needed to actually resume.
const CHECKPOINT_MAGIC: &[u8; 4] = b"CKPT";
const MODEL_VERSION: i32 = 1;
pub const LATENT_DIM: usize = 32;
pub const MFCC_DIM: usize = 13;
pub const SPECTRAL_DIM: usize = 3;
pub const BPM_DIM: usize = 1;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid model magic")]
    InvalidMagic,
    #[error("corrupt model data")]
    Corrupt,
}

type ModelResult<T> = std::result::Result<T, ModelError>;

/// A single fully-connected layer: `y = W·x + b`.
#[derive(Debug, Clone)]
struct Linear {
    weights: Vec<Vec<f32>>, // [out][in]
    bias: Vec<f32>,
}

impl Linear {
    fn new(out_dim: usize, in_dim: usize, rng: &mut impl Rng) -> Self {
        let scale = (1.0 / in_dim.max(1) as f32).sqrt();
        Linear {
            weights: (0..out_dim)
                .map(|_| (0..in_dim).map(|_| (rng.gen::<f32>() * 2.0 - 1.0) * scale).collect())
                .collect(),
            bias: vec![0.0; out_dim],
        }
    }

    fn forward(&self, x: &[f32]) -> Vec<f32> {
        self.weights
            .iter()
            .zip(self.bias.iter())
            .map(|(row, &b)| row.iter().zip(x.iter()).map(|(w, xi)| w * xi).sum::<f32>() + b)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct VaeModel {
    pub genre_map: HashMap<String, u32>,
    pub trained: bool,
    encoder: Linear,
    decoder: Linear,
    input_dim: usize,
    output_dim: usize,
}

impl VaeModel {
    /// `feature_dim` is the flat length of an (MFCC+spectral+bpm) input vector.
    pub fn new(feature_dim: usize, genre_map: HashMap<String, u32>) -> Self {
        let mut rng = StdRng::seed_from_u64(1337);
        let output_dim = MFCC_DIM + SPECTRAL_DIM + BPM_DIM + genre_map.len();
        VaeModel {
            encoder: Linear::new(LATENT_DIM, feature_dim, &mut rng),
            decoder: Linear::new(output_dim, LATENT_DIM + genre_map.len(), &mut rng),
            input_dim: feature_dim,
            output_dim,
            genre_map,
            trained: false,
        }
    }

    fn encode(&self, features: &[f32]) -> Vec<f32> {
        self.encoder.forward(features).into_iter().map(|v| v.tanh()).collect()
    }

    fn decode(&self, latent: &[f32], genre_onehot: &[f32]) -> Vec<f32> {
        let mut input = latent.to_vec();
        input.extend_from_slice(genre_onehot);
        self.decoder.forward(&input)
    }

    fn genre_onehot(&self, genre: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.genre_map.len()];
        if let Some(&id) = self.genre_map.get(genre) {
            if let Some(slot) = v.get_mut(id as usize) {
                *slot = 1.0;
            }
        }
        v
    }

    /// A single incremental update from one corrected sample (spec §4.6 online learning).
    pub fn incremental_step(&mut self, features: &[f32], genre: &str, learning_rate: f32) -> f32 {
        let onehot = self.genre_onehot(genre);
        self.train_step(features, &onehot, learning_rate)
    }

    /// One SGD step of autoencoder backprop over `features`; returns the MSE loss.
    fn train_step(&mut self, features: &[f32], genre_onehot: &[f32], learning_rate: f32) -> f32 {
        let pre_latent = self.encoder.forward(features);
        let latent: Vec<f32> = pre_latent.iter().map(|v| v.tanh()).collect();

        let mut decoder_input = latent.clone();
        decoder_input.extend_from_slice(genre_onehot);
        let output = self.decoder.forward(&decoder_input);

        let mut target = features.to_vec();
        target.truncate(self.output_dim.min(target.len()));
        target.resize(self.output_dim, 0.0);
        for (i, g) in genre_onehot.iter().enumerate() {
            let idx = MFCC_DIM + SPECTRAL_DIM + BPM_DIM + i;
            if idx < target.len() {
                target[idx] = *g;
            }
        }

        let n_out = output.len() as f32;
        let d_output: Vec<f32> = output.iter().zip(target.iter()).map(|(o, t)| 2.0 * (o - t) / n_out).collect();
        let loss = output.iter().zip(target.iter()).map(|(o, t)| (o - t).powi(2)).sum::<f32>() / n_out;

        // decoder gradients
        let mut d_decoder_input = vec![0.0f32; decoder_input.len()];
        for (i, row) in self.decoder.weights.iter_mut().enumerate() {
            let d_out_i = d_output[i];
            for (j, w) in row.iter_mut().enumerate() {
                d_decoder_input[j] += *w * d_out_i;
                *w -= learning_rate * d_out_i * decoder_input[j];
            }
            self.decoder.bias[i] -= learning_rate * d_out_i;
        }

        // encoder gradients (through tanh)
        let d_latent = &d_decoder_input[..latent.len()];
        let d_pre_latent: Vec<f32> = d_latent
            .iter()
            .zip(latent.iter())
            .map(|(dl, z)| dl * (1.0 - z * z))
            .collect();

        for (i, row) in self.encoder.weights.iter_mut().enumerate() {
            let d_pre_i = d_pre_latent[i];
            for (j, w) in row.iter_mut().enumerate() {
                *w -= learning_rate * d_pre_i * features[j];
            }
            self.encoder.bias[i] -= learning_rate * d_pre_i;
        }

        loss
    }

    /// Trains over `dataset` (feature vector, genre label) pairs. Resumable via a
    /// checkpoint written every 10 epochs at `checkpoint_path`, deleted on completion.
    pub fn train(
        &mut self,
        dataset: &[(Vec<f32>, String)],
        epochs: u32,
        batch_size: usize,
        learning_rate: f32,
        checkpoint_path: &Path,
        mut progress_sink: impl FnMut(u32, f32),
        mut should_continue: impl FnMut() -> bool,
    ) -> ModelResult<bool> {
        if dataset.is_empty() {
            return Ok(false);
        }

        let mut start_epoch = 0u32;
        if checkpoint_path.exists() {
            if let Ok((epoch, _loss, model)) = load_checkpoint(checkpoint_path) {
                *self = model;
                start_epoch = epoch;
            }
        }

        let mut last_loss = f32::MAX;
        for epoch in start_epoch..epochs {
            if !should_continue() {
                save_checkpoint(checkpoint_path, epoch, last_loss, self)?;
                return Ok(false);
            }

            let mut epoch_loss = 0.0f32;
            let mut count = 0usize;
            for chunk in dataset.chunks(batch_size.max(1)) {
                for (features, genre) in chunk {
                    let onehot = self.genre_onehot(genre);
                    epoch_loss += self.train_step(features, &onehot, learning_rate);
                    count += 1;
                }
            }
            last_loss = if count > 0 { epoch_loss / count as f32 } else { 0.0 };
            progress_sink(epoch + 1, last_loss);

            if (epoch + 1) % 10 == 0 {
                save_checkpoint(checkpoint_path, epoch + 1, last_loss, self)?;
            }
        }

        if checkpoint_path.exists() {
            std::fs::remove_file(checkpoint_path).ok();
        }
        self.trained = true;
        Ok(true)
    }

    /// Returns a normalised feature vector of dimension `13 + 3 + 1 + |genres|`.
    pub fn generate(&self, latent: &[f32], genre: &str, bpm: f32) -> Vec<f32> {
        if self.trained {
            let onehot = self.genre_onehot(genre);
            return self.decode(latent, &onehot);
        }

        let mut mfcc_block: Vec<f32> = (0..MFCC_DIM)
            .map(|i| (latent.get(i).copied().unwrap_or(0.0) * 1.2).tanh())
            .collect();
        mfcc_block.resize(MFCC_DIM, 0.0);

        let genre_hash = genre.bytes().fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
        let centroid = 500.0 + (genre_hash % 4000) as f32;
        let rolloff = 0.5 + ((genre_hash >> 8) % 50) as f32 / 100.0;
        let zcr = ((genre_hash >> 16) % 30) as f32 / 100.0;

        let mut out = mfcc_block;
        out.push(centroid);
        out.push(rolloff);
        out.push(zcr);
        out.push((bpm / 200.0).clamp(0.0, 1.0));
        out.extend(self.genre_onehot(genre));
        out
    }

    pub fn save_model(&self, path: &Path) -> ModelResult<()> {
        let mut file = std::fs::File::create(path)?;
        file.write_all(MODEL_MAGIC)?;
        file.write_all(&MODEL_VERSION.to_le_bytes())?;
        file.write_all(&(self.genre_map.len() as u32).to_le_bytes())?;
        let mut sorted: Vec<(&String, &u32)> = self.genre_map.iter().collect();
        sorted.sort_by_key(|(_, id)| **id);
        for (name, id) in sorted {
            file.write_all(&(name.len() as u32).to_le_bytes())?;
            file.write_all(name.as_bytes())?;
            file.write_all(&id.to_le_bytes())?;
        }
        file.write_all(&[self.trained as u8])?;
        write_linear(&mut file, &self.encoder)?;
        write_linear(&mut file, &self.decoder)?;
        file.write_all(&(self.input_dim as u32).to_le_bytes())?;
        file.write_all(&(self.output_dim as u32).to_le_bytes())?;
        Ok(())
    }

    pub fn load_model(path: &Path) -> ModelResult<Self> {
        let mut file = std::fs::File::open(path)?;
        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != MODEL_MAGIC {
            return Err(ModelError::InvalidMagic);
        }
        let _version = read_i32(&mut file)?;
        let genre_count = read_u32(&mut file)?;
        let mut genre_map = HashMap::new();
        for _ in 0..genre_count {
            let len = read_u32(&mut file)? as usize;
            let mut buf = vec![0u8; len];
            file.read_exact(&mut buf)?;
            let name = String::from_utf8(buf).map_err(|_| ModelError::Corrupt)?;
            let id = read_u32(&mut file)?;
            genre_map.insert(name, id);
        }
        let mut trained_byte = [0u8; 1];
        file.read_exact(&mut trained_byte)?;
        let trained = trained_byte[0] != 0;
        let encoder = read_linear(&mut file)?;
        let decoder = read_linear(&mut file)?;
        let input_dim = read_u32(&mut file)? as usize;
        let output_dim = read_u32(&mut file)? as usize;

        Ok(VaeModel {
            genre_map,
            trained,
            encoder,
            decoder,
            input_dim,
            output_dim,
        })
    }
}

fn write_linear(file: &mut std::fs::File, layer: &Linear) -> ModelResult<()> {
    file.write_all(&(layer.weights.len() as u32).to_le_bytes())?;
    file.write_all(&(layer.weights.first().map(|r| r.len()).unwrap_or(0) as u32).to_le_bytes())?;
    for row in &layer.weights {
        for w in row {
            file.write_all(&w.to_le_bytes())?;
        }
    }
    for b in &layer.bias {
        file.write_all(&b.to_le_bytes())?;
    }
    Ok(())
}

fn read_linear(file: &mut std::fs::File) -> ModelResult<Linear> {
    let rows = read_u32(file)? as usize;
    let cols = read_u32(file)? as usize;
    let mut weights = Vec::with_capacity(rows);
    for _ in 0..rows {
        let mut row = Vec::with_capacity(cols);
        for _ in 0..cols {
            row.push(read_f32(file)?);
        }
        weights.push(row);
    }
    let mut bias = Vec::with_capacity(rows);
    for _ in 0..rows {
        bias.push(read_f32(file)?);
    }
    Ok(Linear { weights, bias })
}

fn read_u32(file: &mut std::fs::File) -> ModelResult<u32> {
    let mut buf = [0u8; 4];
    file.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_i32(file: &mut std::fs::File) -> ModelResult<i32> {
    let mut buf = [0u8; 4];
    file.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_f32(file: &mut std::fs::File) -> ModelResult<f32> {
    let mut buf = [0u8; 4];
    file.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

fn save_checkpoint(path: &Path, epoch: u32, loss: f32, model: &VaeModel) -> ModelResult<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(CHECKPOINT_MAGIC)?;
    file.write_all(&epoch.to_le_bytes())?;
    file.write_all(&loss.to_le_bytes())?;
    file.write_all(&(model.genre_map.len() as u32).to_le_bytes())?;
    let mut sorted: Vec<(&String, &u32)> = model.genre_map.iter().collect();
    sorted.sort_by_key(|(_, id)| **id);
    for (name, id) in sorted {
        file.write_all(&(name.len() as u32).to_le_bytes())?;
        file.write_all(name.as_bytes())?;
        file.write_all(&id.to_le_bytes())?;
    }
    file.write_all(&(model.trained as u8).to_le_bytes())?;
    write_linear(&mut file, &model.encoder)?;
    write_linear(&mut file, &model.decoder)?;
    file.write_all(&(model.input_dim as u32).to_le_bytes())?;
    file.write_all(&(model.output_dim as u32).to_le_bytes())?;
    Ok(())
}

fn load_checkpoint(path: &Path) -> ModelResult<(u32, f32, VaeModel)> {
    let mut file = std::fs::File::open(path)?;
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)?;
    if &magic != CHECKPOINT_MAGIC {
        return Err(ModelError::InvalidMagic);
    }
    let epoch = read_u32(&mut file)?;
    let loss = read_f32(&mut file)?;
    let genre_count = read_u32(&mut file)?;
    let mut genre_map = HashMap::new();
    for _ in 0..genre_count {
        let len = read_u32(&mut file)? as usize;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf)?;
        let name = String::from_utf8(buf).map_err(|_| ModelError::Corrupt)?;
        let id = read_u32(&mut file)?;
        genre_map.insert(name, id);
    }
    let mut trained_byte = [0u8; 1];
    file.read_exact(&mut trained_byte)?;
    let trained = trained_byte[0] != 0;
    let encoder = read_linear(&mut file)?;
    let decoder = read_linear(&mut file)?;
    let input_dim = read_u32(&mut file)? as usize;
    let output_dim = read_u32(&mut file)? as usize;

    Ok((
        epoch,
        loss,
        VaeModel {
            genre_map,
            trained,
            encoder,
            decoder,
            input_dim,
            output_dim,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genre_map() -> HashMap<String, u32> {
        [("Rock".to_string(), 0), ("Pop".to_string(), 1)].into_iter().collect()
    }

    #[test]
    fn untrained_generate_has_expected_dimension() {
        let model = VaeModel::new(17, genre_map());
        let latent = vec![0.1; LATENT_DIM];
        let out = model.generate(&latent, "Rock", 120.0);
        assert_eq!(out.len(), MFCC_DIM + SPECTRAL_DIM + BPM_DIM + 2);
    }

    #[test]
    fn generate_is_deterministic_for_same_inputs() {
        let model = VaeModel::new(17, genre_map());
        let latent = vec![0.2; LATENT_DIM];
        let a = model.generate(&latent, "Pop", 128.0);
        let b = model.generate(&latent, "Pop", 128.0);
        assert_eq!(a, b);
    }

    #[test]
    fn save_and_load_round_trips_genre_map_and_trained_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let mut model = VaeModel::new(17, genre_map());
        model.trained = true;
        model.save_model(&path).unwrap();

        let loaded = VaeModel::load_model(&path).unwrap();
        assert!(loaded.trained);
        assert_eq!(loaded.genre_map.get("Rock"), Some(&0));
    }

    #[test]
    fn load_model_rejects_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.bin");
        std::fs::write(&path, b"NOPE1234").unwrap();
        let err = VaeModel::load_model(&path).unwrap_err();
        assert!(matches!(err, ModelError::InvalidMagic));
    }

    #[test]
    fn training_reduces_loss_and_honours_checkpoint_resume() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint_path = dir.path().join("checkpoint.bin");
        let mut model = VaeModel::new(17, genre_map());

        let dataset: Vec<(Vec<f32>, String)> = (0..20)
            .map(|i| {
                let v: Vec<f32> = (0..17).map(|j| ((i + j) as f32 * 0.05).sin()).collect();
                (v, if i % 2 == 0 { "Rock".to_string() } else { "Pop".to_string() })
            })
            .collect();

        let mut losses = Vec::new();
        model
            .train(&dataset, 5, 4, 0.05, &checkpoint_path, |_epoch, loss| losses.push(loss), || true)
            .unwrap();

        assert!(losses.first().unwrap() >= losses.last().unwrap());
        assert!(!checkpoint_path.exists());
        assert!(model.trained);
    }

    #[test]
    fn cancelled_training_leaves_a_resumable_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint_path = dir.path().join("checkpoint.bin");
        let mut model = VaeModel::new(17, genre_map());
        let dataset: Vec<(Vec<f32>, String)> =
            (0..8).map(|i| (vec![i as f32 * 0.1; 17], "Rock".to_string())).collect();

        let completed = model
            .train(&dataset, 20, 4, 0.05, &checkpoint_path, |_, _| {}, || false)
            .unwrap();
        assert!(!completed);
        assert!(checkpoint_path.exists());
    }
}
