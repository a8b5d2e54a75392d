use super::models::{
    CorrectionHistoryEntry, DataQualityReport, NewTrack, Track, TrainingDecision, TrainingStats,
};
use super::{Result, Store, StoreError};
use crate::learning::similarity::{feature_similarity, mfcc_similarity};
use rusqlite::{params, OptionalExtension};
use std::collections::HashMap;

fn row_to_track(row: &rusqlite::Row) -> rusqlite::Result<Track> {
    Ok(Track {
        id: row.get(0)?,
        path: row.get(1)?,
        content_hash: row.get(2)?,
        title: row.get(3)?,
        artist: row.get(4)?,
        duration_secs: row.get(5)?,
        bpm: row.get(6)?,
        genre: row.get(7)?,
        sub_genre: row.get(8)?,
        intensity: row.get(9)?,
        bass_level: row.get(10)?,
        mood_tags: row.get(11)?,
        instruments: row.get(12)?,
        spectral_centroid: row.get(13)?,
        spectral_rolloff: row.get(14)?,
        zcr: row.get(15)?,
        mfcc_json: row.get(16)?,
        mfcc_signature: row.get(17)?,
        analyzed: row.get::<_, i64>(18)? != 0,
        training_eligible: row.get::<_, i64>(19)? != 0,
        use_count: row.get(20)?,
    })
}

const TRACK_COLUMNS: &str = "id, path, content_hash, title, artist, duration_secs, bpm, genre,
     sub_genre, intensity, bass_level, mood_tags, instruments, spectral_centroid,
     spectral_rolloff, zcr, mfcc_json, mfcc_signature, analyzed, training_eligible, use_count";

impl Store {
    pub fn insert(&self, t: &NewTrack) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        if conn
            .query_row("SELECT 1 FROM tracks WHERE path = ?1", params![t.path], |_| Ok(()))
            .optional()?
            .is_some()
        {
            return Err(StoreError::Duplicate(t.path.clone()));
        }
        conn.execute(
            "INSERT INTO tracks (
                path, content_hash, title, artist, duration_secs, bpm, genre, sub_genre,
                intensity, bass_level, mood_tags, instruments, spectral_centroid,
                spectral_rolloff, zcr, mfcc_json, mfcc_signature, analyzed
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18)",
            params![
                t.path, t.content_hash, t.title, t.artist, t.duration_secs, t.bpm, t.genre,
                t.sub_genre, t.intensity, t.bass_level, t.mood_tags, t.instruments,
                t.spectral_centroid, t.spectral_rolloff, t.zcr, t.mfcc_json, t.mfcc_signature,
                t.analyzed as i64,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Update a track; if `track.id` does not exist, falls back to insert (spec S2).
    pub fn update(&self, track: &Track) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "UPDATE tracks SET
                path=?2, content_hash=?3, title=?4, artist=?5, duration_secs=?6, bpm=?7,
                genre=?8, sub_genre=?9, intensity=?10, bass_level=?11, mood_tags=?12,
                instruments=?13, spectral_centroid=?14, spectral_rolloff=?15, zcr=?16,
                mfcc_json=?17, mfcc_signature=?18, analyzed=?19, training_eligible=?20,
                use_count=?21
             WHERE id=?1",
            params![
                track.id, track.path, track.content_hash, track.title, track.artist,
                track.duration_secs, track.bpm, track.genre, track.sub_genre, track.intensity,
                track.bass_level, track.mood_tags, track.instruments, track.spectral_centroid,
                track.spectral_rolloff, track.zcr, track.mfcc_json, track.mfcc_signature,
                track.analyzed as i64, track.training_eligible as i64, track.use_count,
            ],
        )?;
        drop(conn);
        if rows == 0 {
            let new_track = NewTrack {
                path: track.path.clone(),
                content_hash: track.content_hash.clone(),
                title: track.title.clone(),
                artist: track.artist.clone(),
                duration_secs: track.duration_secs,
                bpm: track.bpm,
                genre: track.genre.clone(),
                sub_genre: track.sub_genre.clone(),
                intensity: track.intensity.clone(),
                bass_level: track.bass_level.clone(),
                mood_tags: track.mood_tags.clone(),
                instruments: track.instruments.clone(),
                spectral_centroid: track.spectral_centroid,
                spectral_rolloff: track.spectral_rolloff,
                zcr: track.zcr,
                mfcc_json: track.mfcc_json.clone(),
                mfcc_signature: track.mfcc_signature,
                analyzed: track.analyzed,
            };
            self.insert(&new_track)
        } else {
            Ok(track.id)
        }
    }

    pub fn delete(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM tracks WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn exists_by_path(&self, path: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row("SELECT 1 FROM tracks WHERE path = ?1", params![path], |_| Ok(()))
            .optional()?
            .is_some())
    }

    pub fn get_by_id(&self, id: i64) -> Result<Option<Track>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE id = ?1");
        conn.query_row(&sql, params![id], row_to_track).optional().map_err(Into::into)
    }

    pub fn get_by_path(&self, path: &str) -> Result<Option<Track>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE path = ?1");
        conn.query_row(&sql, params![path], row_to_track).optional().map_err(Into::into)
    }

    pub fn get_all(&self) -> Result<Vec<Track>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("SELECT {TRACK_COLUMNS} FROM tracks ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_track)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn get_unanalyzed(&self) -> Result<Vec<Track>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE analyzed = 0 ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_track)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn search_by_genre(&self, genre: &str) -> Result<Vec<Track>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE genre = ?1 ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![genre], row_to_track)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn search_by_bpm_range(&self, min: f32, max: f32) -> Result<Vec<Track>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE bpm BETWEEN ?1 AND ?2 ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![min, max], row_to_track)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn search_by_instruments(&self, instrument: &str) -> Result<Vec<Track>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE instruments LIKE ?1 ORDER BY id");
        let pattern = format!("%{instrument}%");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![pattern], row_to_track)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn search_by_intensity(&self, intensity: &str) -> Result<Vec<Track>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE intensity = ?1 ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![intensity], row_to_track)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn search_by_bass_level(&self, bass_level: &str) -> Result<Vec<Track>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE bass_level = ?1 ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![bass_level], row_to_track)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn search_advanced(
        &self,
        genre: Option<&str>,
        intensity: Option<&str>,
        bass_level: Option<&str>,
        bpm_min: Option<f32>,
        bpm_max: Option<f32>,
    ) -> Result<Vec<Track>> {
        let conn = self.conn.lock().unwrap();
        let mut clauses = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(g) = genre {
            clauses.push(format!("genre = ?{}", values.len() + 1));
            values.push(Box::new(g.to_string()));
        }
        if let Some(i) = intensity {
            clauses.push(format!("intensity = ?{}", values.len() + 1));
            values.push(Box::new(i.to_string()));
        }
        if let Some(b) = bass_level {
            clauses.push(format!("bass_level = ?{}", values.len() + 1));
            values.push(Box::new(b.to_string()));
        }
        if let Some(min) = bpm_min {
            clauses.push(format!("bpm >= ?{}", values.len() + 1));
            values.push(Box::new(min));
        }
        if let Some(max) = bpm_max {
            clauses.push(format!("bpm <= ?{}", values.len() + 1));
            values.push(Box::new(max));
        }
        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!("SELECT {TRACK_COLUMNS} FROM tracks {where_clause} ORDER BY id");
        let params_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|b| b.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_refs.as_slice(), row_to_track)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Tracks most similar to `reference`, ranked descending, capped at `limit`.
    pub fn find_similar(&self, reference: &Track, limit: usize) -> Result<Vec<(Track, f32)>> {
        let all = self.get_all()?;
        let ref_mfcc = reference.mfcc();
        let mut scored: Vec<(Track, f32)> = all
            .into_iter()
            .filter(|t| t.id != reference.id)
            .map(|t| {
                let sim = feature_similarity(
                    &ref_mfcc,
                    reference.bpm,
                    reference.spectral_centroid,
                    &t.mfcc(),
                    t.bpm,
                    t.spectral_centroid,
                );
                (t, sim)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        scored.truncate(limit);
        Ok(scored)
    }

    /// Pairs of tracks whose feature similarity is at least `threshold`.
    pub fn find_duplicates(&self, threshold: f32) -> Result<Vec<(i64, i64, f32)>> {
        let all = self.get_all()?;
        let mut pairs = Vec::new();
        for i in 0..all.len() {
            for j in (i + 1)..all.len() {
                let sim = feature_similarity(
                    &all[i].mfcc(),
                    all[i].bpm,
                    all[i].spectral_centroid,
                    &all[j].mfcc(),
                    all[j].bpm,
                    all[j].spectral_centroid,
                );
                if sim >= threshold {
                    pairs.push((all[i].id, all[j].id, sim));
                }
            }
        }
        Ok(pairs)
    }

    /// Tracks sharing the same path or content hash.
    pub fn find_identical_files(&self) -> Result<Vec<(i64, i64)>> {
        let all = self.get_all()?;
        let mut by_hash: HashMap<&str, Vec<i64>> = HashMap::new();
        for t in &all {
            if !t.content_hash.is_empty() {
                by_hash.entry(t.content_hash.as_str()).or_default().push(t.id);
            }
        }
        let mut pairs = Vec::new();
        for ids in by_hash.values() {
            for i in 0..ids.len() {
                for j in (i + 1)..ids.len() {
                    pairs.push((ids[i], ids[j]));
                }
            }
        }
        Ok(pairs)
    }

    /// Pairs whose MFCC cosine similarity alone (ignoring bpm/centroid) exceeds `mfcc_threshold`.
    pub fn find_audio_duplicates(&self, mfcc_threshold: f32) -> Result<Vec<(i64, i64, f32)>> {
        let all = self.get_all()?;
        let mut pairs = Vec::new();
        for i in 0..all.len() {
            for j in (i + 1)..all.len() {
                let sim = mfcc_similarity(&all[i].mfcc(), &all[j].mfcc());
                if sim >= mfcc_threshold {
                    pairs.push((all[i].id, all[j].id, sim));
                }
            }
        }
        Ok(pairs)
    }

    pub fn get_training_stats(&self) -> Result<TrainingStats> {
        let all = self.get_all()?;
        let total = all.len() as i64;
        let analyzed = all.iter().filter(|t| t.analyzed).count() as i64;
        let identical = self.find_identical_files()?;
        let duplicates = identical.len() as i64;

        let mut genre_counts: HashMap<String, i64> = HashMap::new();
        let mut intensity_counts: HashMap<String, i64> = HashMap::new();
        let mut bpm_sum = 0.0f32;
        let mut duration_sum = 0.0f64;
        let mut without_genre = 0i64;

        for t in &all {
            *genre_counts.entry(t.genre.clone()).or_insert(0) += 1;
            *intensity_counts.entry(t.intensity.clone()).or_insert(0) += 1;
            bpm_sum += t.bpm;
            duration_sum += t.duration_secs;
            if t.genre.is_empty() {
                without_genre += 1;
            }
        }

        Ok(TrainingStats {
            total,
            analyzed,
            duplicates,
            genre_histogram: genre_counts.into_iter().collect(),
            intensity_histogram: intensity_counts.into_iter().collect(),
            avg_bpm: if total > 0 { bpm_sum / total as f32 } else { 0.0 },
            avg_duration: if total > 0 { duration_sum / total as f64 } else { 0.0 },
            count_without_genre: without_genre,
        })
    }

    /// Under-samples each genre to the smallest bucket's count, marking
    /// survivors `training_eligible`. Returns the number marked eligible.
    pub fn balance_dataset(&self) -> Result<usize> {
        let all = self.get_all()?;
        let mut by_genre: HashMap<String, Vec<i64>> = HashMap::new();
        for t in &all {
            by_genre.entry(t.genre.clone()).or_default().push(t.id);
        }
        let min_count = by_genre.values().map(|v| v.len()).filter(|&n| n > 0).min().unwrap_or(0);

        let conn = self.conn.lock().unwrap();
        conn.execute("UPDATE tracks SET training_eligible = 0", [])?;
        let mut eligible = 0usize;
        for ids in by_genre.values() {
            for &id in ids.iter().take(min_count) {
                conn.execute("UPDATE tracks SET training_eligible = 1 WHERE id = ?1", params![id])?;
                eligible += 1;
            }
        }
        Ok(eligible)
    }

    pub fn save_decision(&self, d: &TrainingDecision) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let options_json = serde_json::to_string(&d.options).unwrap_or_default();
        conn.execute(
            "INSERT INTO training_decisions
                (question, options_json, answer, confidence, context_json, decision_type, answered, audio_path)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
            params![
                d.question, options_json, d.answer, d.confidence, d.context_json,
                d.decision_type, d.answered as i64, d.audio_path,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_decision_history(&self, limit: usize) -> Result<Vec<TrainingDecision>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, question, options_json, answer, confidence, context_json, timestamp,
                    decision_type, answered, audio_path
             FROM training_decisions ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], row_to_decision)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn get_unanswered_questions(&self) -> Result<Vec<TrainingDecision>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, question, options_json, answer, confidence, context_json, timestamp,
                    decision_type, answered, audio_path
             FROM training_decisions WHERE answered = 0 ORDER BY id",
        )?;
        let rows = stmt.query_map([], row_to_decision)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Decisions whose context text shares at least `threshold` token overlap with `context`.
    pub fn find_similar_decisions(&self, context: &str, threshold: f32) -> Result<Vec<TrainingDecision>> {
        let all = self.get_decision_history(1000)?;
        let ref_tokens: Vec<&str> = context.split_whitespace().collect();
        Ok(all
            .into_iter()
            .filter(|d| {
                let tokens: Vec<&str> = d.context_json.split_whitespace().collect();
                if ref_tokens.is_empty() || tokens.is_empty() {
                    return false;
                }
                let shared = ref_tokens.iter().filter(|t| tokens.contains(t)).count();
                let overlap = shared as f32 / ref_tokens.len().max(tokens.len()) as f32;
                overlap >= threshold
            })
            .collect())
    }

    pub fn mark_question_as_answered(&self, id: i64, answer: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE training_decisions SET answer = ?2, answered = 1 WHERE id = ?1",
            params![id, answer],
        )?;
        Ok(())
    }

    pub fn delete_decision(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM training_decisions WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn save_correction(&self, entry: &CorrectionHistoryEntry) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO correction_history (track_id, path, artist, old_genre, new_genre, bpm, features_json)
             VALUES (?1,?2,?3,?4,?5,?6,?7)",
            params![
                entry.track_id, entry.path, entry.artist, entry.old_genre, entry.new_genre,
                entry.bpm, entry.features_json,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_corrections_for_track(&self, track_id: i64) -> Result<Vec<CorrectionHistoryEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, track_id, path, artist, old_genre, new_genre, bpm, features_json, timestamp
             FROM correction_history WHERE track_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![track_id], row_to_correction)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn get_all_corrections(&self) -> Result<Vec<CorrectionHistoryEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, track_id, path, artist, old_genre, new_genre, bpm, features_json, timestamp
             FROM correction_history ORDER BY id",
        )?;
        let rows = stmt.query_map([], row_to_correction)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn delete_correction(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM correction_history WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn clear_history_for_track(&self, path: &str) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute("DELETE FROM correction_history WHERE path = ?1", params![path])?;
        Ok(count)
    }

    pub fn grouped_by_genre(&self) -> Result<HashMap<String, Vec<Track>>> {
        let all = self.get_all()?;
        let mut groups: HashMap<String, Vec<Track>> = HashMap::new();
        for t in all {
            groups.entry(t.genre.clone()).or_default().push(t);
        }
        Ok(groups)
    }

    /// Buckets: slow (<90), medium (90..120), fast (120..150), very-fast (150..180), ultra (>=180).
    pub fn grouped_by_bpm_range(&self) -> Result<HashMap<&'static str, Vec<Track>>> {
        let all = self.get_all()?;
        let mut groups: HashMap<&'static str, Vec<Track>> = HashMap::new();
        for t in all {
            let bucket = if t.bpm < 90.0 {
                "slow"
            } else if t.bpm < 120.0 {
                "medium"
            } else if t.bpm < 150.0 {
                "fast"
            } else if t.bpm < 180.0 {
                "very-fast"
            } else {
                "ultra"
            };
            groups.entry(bucket).or_default().push(t);
        }
        Ok(groups)
    }

    pub fn sorted_by_mood(&self) -> Result<Vec<Track>> {
        let mut all = self.get_all()?;
        all.sort_by(|a, b| a.mood_tags.cmp(&b.mood_tags));
        Ok(all)
    }

    /// Tracks whose genre or mood tags contain `substring` (case-insensitive).
    pub fn playable_by_category(&self, substring: &str) -> Result<Vec<Track>> {
        let needle = substring.to_lowercase();
        let all = self.get_all()?;
        Ok(all
            .into_iter()
            .filter(|t| t.genre.to_lowercase().contains(&needle) || t.mood_tags.to_lowercase().contains(&needle))
            .collect())
    }

    pub fn data_quality_report(&self) -> Result<DataQualityReport> {
        let all = self.get_all()?;
        let identical = self.find_identical_files()?;
        let mut seen_paths: HashMap<&str, usize> = HashMap::new();
        for t in &all {
            *seen_paths.entry(t.path.as_str()).or_insert(0) += 1;
        }
        let duplicate_paths = seen_paths.values().filter(|&&c| c > 1).count() as i64;

        Ok(DataQualityReport {
            total_tracks: all.len() as i64,
            missing_genre: all.iter().filter(|t| t.genre.is_empty()).count() as i64,
            missing_bpm: all.iter().filter(|t| t.bpm <= 0.0).count() as i64,
            zero_duration: all.iter().filter(|t| t.duration_secs <= 0.0).count() as i64,
            unanalyzed: all.iter().filter(|t| !t.analyzed).count() as i64,
            duplicate_paths,
            duplicate_hashes: identical.len() as i64,
        })
    }
}

fn row_to_decision(row: &rusqlite::Row) -> rusqlite::Result<TrainingDecision> {
    let options_json: String = row.get(2)?;
    Ok(TrainingDecision {
        id: row.get(0)?,
        question: row.get(1)?,
        options: serde_json::from_str(&options_json).unwrap_or_default(),
        answer: row.get(3)?,
        confidence: row.get(4)?,
        context_json: row.get(5)?,
        timestamp: row.get(6)?,
        decision_type: row.get(7)?,
        answered: row.get::<_, i64>(8)? != 0,
        audio_path: row.get(9)?,
    })
}

fn row_to_correction(row: &rusqlite::Row) -> rusqlite::Result<CorrectionHistoryEntry> {
    Ok(CorrectionHistoryEntry {
        id: row.get(0)?,
        track_id: row.get(1)?,
        path: row.get(2)?,
        artist: row.get(3)?,
        old_genre: row.get(4)?,
        new_genre: row.get(5)?,
        bpm: row.get(6)?,
        features_json: row.get(7)?,
        timestamp: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_track(path: &str, genre: &str, bpm: f32) -> NewTrack {
        NewTrack {
            path: path.to_string(),
            content_hash: format!("hash-{path}"),
            genre: genre.to_string(),
            bpm,
            duration_secs: 180.0,
            mfcc_json: "[1.0,2.0,3.0]".to_string(),
            analyzed: true,
            ..Default::default()
        }
    }

    #[test]
    fn insert_then_get_by_id_round_trips() {
        let store = Store::open_in_memory().unwrap();
        let id = store.insert(&sample_track("/a.wav", "Rock", 120.0)).unwrap();
        let track = store.get_by_id(id).unwrap().unwrap();
        assert_eq!(track.genre, "Rock");
    }

    #[test]
    fn duplicate_path_is_rejected() {
        let store = Store::open_in_memory().unwrap();
        store.insert(&sample_track("/a.wav", "Rock", 120.0)).unwrap();
        let err = store.insert(&sample_track("/a.wav", "Pop", 100.0)).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[test]
    fn update_of_missing_row_falls_back_to_insert() {
        let store = Store::open_in_memory().unwrap();
        let mut track = Track::default();
        track.id = 999;
        track.path = "/missing.wav".to_string();
        track.mfcc_json = "[]".to_string();
        let id = store.update(&track).unwrap();
        assert!(store.get_by_id(id).unwrap().is_some());
    }

    #[test]
    fn search_by_bpm_range_is_inclusive() {
        let store = Store::open_in_memory().unwrap();
        store.insert(&sample_track("/a.wav", "Rock", 120.0)).unwrap();
        store.insert(&sample_track("/b.wav", "Rock", 200.0)).unwrap();
        let results = store.search_by_bpm_range(100.0, 150.0).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn balance_dataset_undersamples_to_smallest_genre() {
        let store = Store::open_in_memory().unwrap();
        store.insert(&sample_track("/a.wav", "Rock", 120.0)).unwrap();
        store.insert(&sample_track("/b.wav", "Rock", 121.0)).unwrap();
        store.insert(&sample_track("/c.wav", "Pop", 110.0)).unwrap();
        let eligible = store.balance_dataset().unwrap();
        assert_eq!(eligible, 2);
    }

    #[test]
    fn identical_hash_tracks_are_found() {
        let store = Store::open_in_memory().unwrap();
        let mut a = sample_track("/a.wav", "Rock", 120.0);
        a.content_hash = "same".to_string();
        let mut b = sample_track("/b.wav", "Rock", 120.0);
        b.content_hash = "same".to_string();
        store.insert(&a).unwrap();
        store.insert(&b).unwrap();
        let pairs = store.find_identical_files().unwrap();
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn training_decisions_round_trip_and_answer() {
        let store = Store::open_in_memory().unwrap();
        let decision = TrainingDecision {
            id: 0,
            question: "Is this Trap or Dubstep?".to_string(),
            options: vec!["Trap".to_string(), "Dubstep".to_string()],
            answer: None,
            confidence: 0.4,
            context_json: "{}".to_string(),
            timestamp: String::new(),
            decision_type: "genre_classification".to_string(),
            answered: false,
            audio_path: Some("/a.wav".to_string()),
        };
        let id = store.save_decision(&decision).unwrap();
        assert_eq!(store.get_unanswered_questions().unwrap().len(), 1);
        store.mark_question_as_answered(id, "Trap").unwrap();
        assert_eq!(store.get_unanswered_questions().unwrap().len(), 0);
    }

    #[test]
    fn data_quality_report_counts_missing_fields() {
        let store = Store::open_in_memory().unwrap();
        let mut t = sample_track("/a.wav", "", 0.0);
        t.duration_secs = 0.0;
        t.analyzed = false;
        store.insert(&t).unwrap();
        let report = store.data_quality_report().unwrap();
        assert_eq!(report.missing_genre, 1);
        assert_eq!(report.missing_bpm, 1);
        assert_eq!(report.zero_duration, 1);
        assert_eq!(report.unanalyzed, 1);
    }
}
