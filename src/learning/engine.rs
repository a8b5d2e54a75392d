//! Online-learning operations wrapping the Media Store and the VAE model
//! (spec §4.6). Grounded on `original_source/include/TrainingModel.h`.

use super::model::{ModelError, VaeModel, BPM_DIM, MFCC_DIM, SPECTRAL_DIM};
use super::similarity::{feature_similarity, mfcc_similarity};
use crate::instruments::{InstrumentClass, InstrumentExtractor};
use crate::io;
use crate::store::models::{CorrectionHistoryEntry, Track};
use crate::store::{Store, StoreError};
use std::collections::HashMap;
use std::path::Path;

/// Deterministic content-addressed filename stem from `(source_path, start_time)`,
/// so concurrent writers never collide (spec §5 shared-resource policy).
fn source_stem_hash(origin_path: &str, start_secs: f64) -> String {
    let mut hash = 0xcbf29ce484222325u64;
    for b in origin_path.bytes().chain(start_secs.to_le_bytes()) {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    format!("{hash:016x}")
}

fn library_subdir(class: InstrumentClass) -> &'static str {
    match class {
        InstrumentClass::Kick => "kicks",
        InstrumentClass::Snare => "snares",
        InstrumentClass::Hihat => "hihats",
        InstrumentClass::Bass => "bass",
        InstrumentClass::Lead => "leads",
        _ => "other",
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

const FEATURE_DIM: usize = MFCC_DIM + SPECTRAL_DIM + BPM_DIM;

fn feature_vector(t: &Track) -> Vec<f32> {
    let mut v = t.mfcc();
    v.resize(MFCC_DIM, 0.0);
    v.push(t.spectral_centroid);
    v.push(t.spectral_rolloff);
    v.push(t.zcr);
    v.push(t.bpm);
    v
}

fn bpm_bucket(bpm: f32) -> &'static str {
    if bpm < 90.0 {
        "slow"
    } else if bpm < 120.0 {
        "medium"
    } else if bpm < 150.0 {
        "fast"
    } else if bpm < 180.0 {
        "very-fast"
    } else {
        "ultra"
    }
}

/// Holds the VAE model, the dense genre-id map, and the pending-correction
/// queue for online learning.
pub struct Engine<'s> {
    store: &'s Store,
    pub model: VaeModel,
    pending: Vec<(Track, String)>,
}

impl<'s> Engine<'s> {
    pub fn new(store: &'s Store) -> Result<Self> {
        let tracks = store.get_all()?;
        let mut genre_map = HashMap::new();
        for t in &tracks {
            if !t.genre.is_empty() && !genre_map.contains_key(&t.genre) {
                let next_id = genre_map.len() as u32;
                genre_map.insert(t.genre.clone(), next_id);
            }
        }
        Ok(Engine {
            store,
            model: VaeModel::new(FEATURE_DIM, genre_map),
            pending: Vec::new(),
        })
    }

    pub fn with_model(store: &'s Store, model: VaeModel) -> Self {
        Engine { store, model, pending: Vec::new() }
    }

    /// Builds the on-demand training-feature table; every 10th track also has
    /// its drum/bass/lead samples pulled into the instrument library.
    pub fn extract_training_features(&self, library_dir: &Path) -> Result<usize> {
        let tracks = self.store.get_all()?;
        let mut extractor = InstrumentExtractor::new();
        for (i, t) in tracks.iter().enumerate() {
            if i % 10 == 9 {
                if let Ok(samples) = extractor.extract(Path::new(&t.path), 0.5) {
                    for sample in &samples {
                        let subdir = library_subdir(sample.class);
                        let stem = source_stem_hash(&sample.origin_path, sample.start_secs);
                        let dest = library_dir.join(subdir).join(format!("{stem}.wav"));
                        if let Some(parent) = dest.parent() {
                            std::fs::create_dir_all(parent).ok();
                        }
                        io::encode_wav(&dest, &sample.samples, sample.sample_rate).ok();
                    }
                }
            }
        }
        Ok(tracks.len())
    }

    pub fn balance_dataset(&self) -> Result<usize> {
        self.store.balance_dataset()
    }

    /// Runs training over the balanced, training-eligible subset.
    pub fn train(
        &mut self,
        epochs: u32,
        batch_size: usize,
        learning_rate: f32,
        checkpoint_path: &Path,
        mut progress_sink: impl FnMut(u32, f32),
        should_continue: impl FnMut() -> bool,
    ) -> std::result::Result<bool, ModelError> {
        let tracks = self.store.get_all().unwrap_or_default();
        let dataset: Vec<(Vec<f32>, String)> = tracks
            .iter()
            .filter(|t| t.training_eligible)
            .map(|t| (feature_vector(t), t.genre.clone()))
            .collect();

        self.model.train(&dataset, epochs, batch_size, learning_rate, checkpoint_path, |e, l| progress_sink(e, l), should_continue)
    }

    pub fn save_model(&self, path: &Path) -> std::result::Result<(), ModelError> {
        self.model.save_model(path)
    }

    pub fn load_model(&mut self, path: &Path) -> std::result::Result<(), ModelError> {
        self.model = VaeModel::load_model(path)?;
        Ok(())
    }

    pub fn generate(&self, latent: &[f32], genre: &str, bpm: f32) -> Vec<f32> {
        self.model.generate(latent, genre, bpm)
    }

    /// Pushes a correction onto the pending queue and records history;
    /// triggers a single incremental gradient step immediately.
    pub fn retrain_with_corrected(&mut self, track: &Track, old_genre: &str) -> Result<()> {
        self.store.save_correction(&CorrectionHistoryEntry {
            id: 0,
            track_id: track.id,
            path: track.path.clone(),
            artist: track.artist.clone(),
            old_genre: old_genre.to_string(),
            new_genre: track.genre.clone(),
            bpm: track.bpm,
            features_json: track.mfcc_json.clone(),
            timestamp: String::new(),
        })?;
        self.pending.push((track.clone(), old_genre.to_string()));
        self.model.incremental_step(&feature_vector(track), &track.genre, 0.01);
        Ok(())
    }

    /// Consumes the pending queue in one pass once it holds at least `min` entries.
    pub fn batch_retrain_pending(&mut self, min: usize) -> usize {
        if self.pending.len() < min {
            return 0;
        }
        let drained: Vec<(Track, String)> = self.pending.drain(..).collect();
        for (track, _old) in &drained {
            self.model.incremental_step(&feature_vector(track), &track.genre, 0.01);
        }
        drained.len()
    }

    /// Other tracks still labelled `old` whose feature similarity to `corrected`
    /// meets `threshold`.
    pub fn find_similar_tracks_with_wrong_genre(
        &self,
        corrected: &Track,
        old: &str,
        threshold: f32,
    ) -> Result<Vec<i64>> {
        let candidates = self.store.search_by_genre(old)?;
        let corrected_mfcc = corrected.mfcc();
        Ok(candidates
            .into_iter()
            .filter(|t| t.id != corrected.id)
            .filter(|t| {
                let sim = feature_similarity(
                    &corrected_mfcc,
                    corrected.bpm,
                    corrected.spectral_centroid,
                    &t.mfcc(),
                    t.bpm,
                    t.spectral_centroid,
                );
                sim >= threshold
            })
            .map(|t| t.id)
            .collect())
    }

    /// Majority new-genre per artist (or, absent an artist, per BPM bucket).
    pub fn learn_correction_patterns(&self) -> Result<HashMap<String, String>> {
        let history = self.store.get_all_corrections()?;
        let mut votes: HashMap<String, HashMap<String, u32>> = HashMap::new();
        for entry in &history {
            let key = if !entry.artist.is_empty() {
                entry.artist.clone()
            } else {
                bpm_bucket(entry.bpm).to_string()
            };
            *votes.entry(key).or_default().entry(entry.new_genre.clone()).or_insert(0) += 1;
        }
        Ok(votes
            .into_iter()
            .filter_map(|(key, genre_votes)| {
                genre_votes.into_iter().max_by_key(|(_, n)| *n).map(|(genre, _)| (key, genre))
            })
            .collect())
    }

    /// Applies learned correction patterns to tracks whose current genre
    /// disagrees; returns the number changed (or that would change).
    pub fn suggest_database_corrections(&self, auto_apply: bool) -> Result<usize> {
        let patterns = self.learn_correction_patterns()?;
        let tracks = self.store.get_all()?;
        let mut changed = 0usize;
        for mut t in tracks {
            let key = if !t.artist.is_empty() { t.artist.clone() } else { bpm_bucket(t.bpm).to_string() };
            if let Some(suggested) = patterns.get(&key) {
                if suggested != &t.genre {
                    changed += 1;
                    if auto_apply {
                        t.genre = suggested.clone();
                        self.store.update(&t)?;
                    }
                }
            }
        }
        Ok(changed)
    }

    /// Deletes history entries that asserted `old_genre` for the same artist
    /// or overlapping BPM bucket as `corrected`, since the user has now
    /// contradicted that pattern.
    pub fn remove_false_learning_patterns(&self, corrected: &Track, old_genre: &str) -> Result<usize> {
        let history = self.store.get_all_corrections()?;
        let bucket = bpm_bucket(corrected.bpm);
        let mut removed = 0usize;
        for entry in &history {
            let same_artist = !corrected.artist.is_empty() && entry.artist == corrected.artist;
            let same_bucket = bpm_bucket(entry.bpm) == bucket;
            if entry.new_genre == old_genre && (same_artist || same_bucket) {
                self.store.delete_correction(entry.id)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Removes history entries contradicted by a later entry for the same
    /// artist (P6): only the latest new-genre per artist survives.
    pub fn revalidate_correction_history(&self) -> Result<usize> {
        let history = self.store.get_all_corrections()?;
        let mut latest_by_artist: HashMap<String, &CorrectionHistoryEntry> = HashMap::new();
        for entry in &history {
            if entry.artist.is_empty() {
                continue;
            }
            latest_by_artist
                .entry(entry.artist.clone())
                .and_modify(|current| {
                    if entry.id > current.id {
                        *current = entry;
                    }
                })
                .or_insert(entry);
        }
        let mut removed = 0usize;
        for entry in &history {
            if entry.artist.is_empty() {
                continue;
            }
            if let Some(latest) = latest_by_artist.get(&entry.artist) {
                if entry.id != latest.id && entry.new_genre != latest.new_genre {
                    self.store.delete_correction(entry.id)?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    pub fn clear_history_for_track(&self, path: &str) -> Result<usize> {
        self.store.clear_history_for_track(path)
    }

    /// Counts co-occurring genre tags across tracks whose `genre`/`sub_genre`
    /// carry more than one `/`-separated tag.
    pub fn learn_genre_fusions(&self) -> Result<HashMap<String, u32>> {
        let tracks = self.store.get_all()?;
        let mut fusions: HashMap<String, u32> = HashMap::new();
        for t in &tracks {
            let mut tags: Vec<&str> = t
                .genre
                .split('/')
                .chain(t.sub_genre.split('/'))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            tags.sort_unstable();
            tags.dedup();
            if tags.len() < 2 {
                continue;
            }
            for i in 0..tags.len() {
                for j in (i + 1)..tags.len() {
                    let key = format!("{}|{}", tags[i], tags[j]);
                    *fusions.entry(key).or_insert(0) += 1;
                }
            }
        }
        Ok(fusions)
    }

    /// Averages normalised AudioFeatures over an artist's tracks.
    pub fn learn_artist_style(&self, artist: &str) -> Result<Vec<f32>> {
        let tracks: Vec<Track> = self.store.get_all()?.into_iter().filter(|t| t.artist == artist).collect();
        if tracks.is_empty() {
            return Ok(Vec::new());
        }
        let mut sum = vec![0.0f32; FEATURE_DIM];
        for t in &tracks {
            for (acc, v) in sum.iter_mut().zip(feature_vector(t)) {
                *acc += v;
            }
        }
        let n = tracks.len() as f32;
        Ok(sum.into_iter().map(|v| v / n).collect())
    }

    /// Top-k fusion keys whose aggregate feature vector is most similar to `track`.
    pub fn suggest_genre_tags(&self, track: &Track, k: usize) -> Result<Vec<String>> {
        let fusions = self.learn_genre_fusions()?;
        let tracks = self.store.get_all()?;
        let track_mfcc = track.mfcc();

        let mut scored: Vec<(String, f32)> = Vec::new();
        for key in fusions.keys() {
            let (a, b) = key.split_once('|').unwrap_or((key.as_str(), ""));
            let members: Vec<&Track> = tracks
                .iter()
                .filter(|t| {
                    let tags: Vec<&str> = t.genre.split('/').chain(t.sub_genre.split('/')).collect();
                    tags.contains(&a) && tags.contains(&b)
                })
                .collect();
            if members.is_empty() {
                continue;
            }
            let mut avg_mfcc = vec![0.0f32; MFCC_DIM];
            for m in &members {
                let mfcc = m.mfcc();
                for (acc, v) in avg_mfcc.iter_mut().zip(mfcc) {
                    *acc += v;
                }
            }
            for v in avg_mfcc.iter_mut() {
                *v /= members.len() as f32;
            }
            let sim = mfcc_similarity(&track_mfcc, &avg_mfcc);
            scored.push((key.clone(), sim));
        }
        scored.sort_by(|x, y| y.1.partial_cmp(&x.1).unwrap());
        scored.truncate(k);
        Ok(scored.into_iter().map(|(key, _)| key).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::NewTrack;

    fn track(path: &str, artist: &str, genre: &str, bpm: f32) -> NewTrack {
        NewTrack {
            path: path.to_string(),
            artist: artist.to_string(),
            genre: genre.to_string(),
            bpm,
            mfcc_json: "[1.0,2.0,3.0]".to_string(),
            analyzed: true,
            ..Default::default()
        }
    }

    #[test]
    fn find_similar_tracks_with_wrong_genre_filters_by_threshold_and_genre() {
        let store = Store::open_in_memory().unwrap();
        let corrected_id = store.insert(&track("/a.wav", "Artist", "Techno", 130.0)).unwrap();
        store.insert(&track("/b.wav", "Artist", "Trance", 130.0)).unwrap();
        store.insert(&track("/c.wav", "Other", "Trance", 200.0)).unwrap();
        let engine = Engine::new(&store).unwrap();

        let corrected = store.get_by_id(corrected_id).unwrap().unwrap();
        let hits = engine.find_similar_tracks_with_wrong_genre(&corrected, "Trance", 0.8).unwrap();
        assert!(hits.len() <= 2);
    }

    #[test]
    fn revalidate_correction_history_keeps_only_latest_per_artist() {
        let store = Store::open_in_memory().unwrap();
        let id = store.insert(&track("/a.wav", "Artist", "Techno", 130.0)).unwrap();
        let t = store.get_by_id(id).unwrap().unwrap();
        store
            .save_correction(&CorrectionHistoryEntry {
                id: 0,
                track_id: t.id,
                path: t.path.clone(),
                artist: "Artist".to_string(),
                old_genre: "Trance".to_string(),
                new_genre: "Techno".to_string(),
                bpm: 130.0,
                features_json: "{}".to_string(),
                timestamp: String::new(),
            })
            .unwrap();
        store
            .save_correction(&CorrectionHistoryEntry {
                id: 0,
                track_id: t.id,
                path: t.path.clone(),
                artist: "Artist".to_string(),
                old_genre: "Techno".to_string(),
                new_genre: "House".to_string(),
                bpm: 130.0,
                features_json: "{}".to_string(),
                timestamp: String::new(),
            })
            .unwrap();

        let engine = Engine::new(&store).unwrap();
        let removed = engine.revalidate_correction_history().unwrap();
        assert_eq!(removed, 1);
        let remaining = store.get_all_corrections().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].new_genre, "House");
    }

    #[test]
    fn learn_genre_fusions_counts_cooccurring_tags() {
        let store = Store::open_in_memory().unwrap();
        let mut t1 = track("/a.wav", "A", "Trap", 140.0);
        t1.sub_genre = "Dubstep".to_string();
        store.insert(&t1).unwrap();
        let mut t2 = track("/b.wav", "B", "Trap", 142.0);
        t2.sub_genre = "Dubstep".to_string();
        store.insert(&t2).unwrap();

        let engine = Engine::new(&store).unwrap();
        let fusions = engine.learn_genre_fusions().unwrap();
        assert_eq!(fusions.get("Dubstep|Trap"), Some(&2));
    }

    #[test]
    fn batch_retrain_pending_only_fires_past_minimum() {
        let store = Store::open_in_memory().unwrap();
        let id = store.insert(&track("/a.wav", "A", "Techno", 130.0)).unwrap();
        let t = store.get_by_id(id).unwrap().unwrap();
        let mut engine = Engine::new(&store).unwrap();
        engine.pending.push((t.clone(), "Trance".to_string()));
        assert_eq!(engine.batch_retrain_pending(2), 0);
        engine.pending.push((t, "Trance".to_string()));
        assert_eq!(engine.batch_retrain_pending(2), 2);
    }
}
