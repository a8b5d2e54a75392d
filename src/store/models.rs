//! Row types for the Media Store (spec §3).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default)]
pub struct Track {
    pub id: i64,
    pub path: String,
    pub content_hash: String,
    pub title: String,
    pub artist: String,
    pub duration_secs: f64,
    pub bpm: f32,
    pub genre: String,
    pub sub_genre: String,
    pub intensity: String,
    pub bass_level: String,
    pub mood_tags: String,
    pub instruments: String,
    pub spectral_centroid: f32,
    pub spectral_rolloff: f32,
    pub zcr: f32,
    pub mfcc_json: String,
    pub mfcc_signature: f32,
    pub analyzed: bool,
    pub training_eligible: bool,
    pub use_count: i64,
}

/// Fields supplied on insert; `id` is assigned by the store.
#[derive(Debug, Clone, Default)]
pub struct NewTrack {
    pub path: String,
    pub content_hash: String,
    pub title: String,
    pub artist: String,
    pub duration_secs: f64,
    pub bpm: f32,
    pub genre: String,
    pub sub_genre: String,
    pub intensity: String,
    pub bass_level: String,
    pub mood_tags: String,
    pub instruments: String,
    pub spectral_centroid: f32,
    pub spectral_rolloff: f32,
    pub zcr: f32,
    pub mfcc_json: String,
    pub mfcc_signature: f32,
    pub analyzed: bool,
}

impl Track {
    pub fn mfcc(&self) -> Vec<f32> {
        serde_json::from_str(&self.mfcc_json).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionHistoryEntry {
    pub id: i64,
    pub track_id: i64,
    pub path: String,
    pub artist: String,
    pub old_genre: String,
    pub new_genre: String,
    pub bpm: f32,
    pub features_json: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingDecision {
    pub id: i64,
    pub question: String,
    pub options: Vec<String>,
    pub answer: Option<String>,
    pub confidence: f32,
    pub context_json: String,
    pub timestamp: String,
    pub decision_type: String,
    pub answered: bool,
    pub audio_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingStats {
    pub total: i64,
    pub analyzed: i64,
    pub duplicates: i64,
    pub genre_histogram: Vec<(String, i64)>,
    pub intensity_histogram: Vec<(String, i64)>,
    pub avg_bpm: f32,
    pub avg_duration: f64,
    pub count_without_genre: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataQualityReport {
    pub total_tracks: i64,
    pub missing_genre: i64,
    pub missing_bpm: i64,
    pub zero_duration: i64,
    pub unanalyzed: i64,
    pub duplicate_paths: i64,
    pub duplicate_hashes: i64,
}
