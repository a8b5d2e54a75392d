//! Media Store (spec §4.5): persistent catalogue of tracks, features,
//! analysis state, correction history and training decisions.

pub mod models;
pub mod queries;

use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("migration failed: {0}")]
    Migration(String),
    #[error("duplicate path: {0}")]
    Duplicate(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// One shared connection; every call is serialised under a mutex (spec §4.5).
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        let store = Store { conn: Mutex::new(conn) };
        store.init()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Store { conn: Mutex::new(conn) };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        drop(conn);
        self.migrate()?;
        Ok(())
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let version: i32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        if version < 1 {
            migrate_v1(&conn)?;
        }
        if version < 2 {
            migrate_v2(&conn)?;
        }

        conn.pragma_update(None, "user_version", 2)?;
        Ok(())
    }
}

/// V1: tracks + correction history + training decisions.
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS tracks (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            path                TEXT NOT NULL UNIQUE,
            content_hash        TEXT NOT NULL DEFAULT '',
            title               TEXT NOT NULL DEFAULT '',
            artist              TEXT NOT NULL DEFAULT '',
            duration_secs       REAL NOT NULL DEFAULT 0,
            bpm                 REAL NOT NULL DEFAULT 0,
            genre               TEXT NOT NULL DEFAULT '',
            sub_genre           TEXT NOT NULL DEFAULT '',
            intensity           TEXT NOT NULL DEFAULT '',
            bass_level          TEXT NOT NULL DEFAULT '',
            mood_tags           TEXT NOT NULL DEFAULT '',
            instruments         TEXT NOT NULL DEFAULT '',
            spectral_centroid   REAL NOT NULL DEFAULT 0,
            spectral_rolloff    REAL NOT NULL DEFAULT 0,
            zcr                 REAL NOT NULL DEFAULT 0,
            mfcc_json           TEXT NOT NULL DEFAULT '[]',
            mfcc_signature      REAL NOT NULL DEFAULT 0,
            analyzed            INTEGER NOT NULL DEFAULT 0,
            training_eligible   INTEGER NOT NULL DEFAULT 0,
            added_at            TEXT NOT NULL DEFAULT (datetime('now')),
            last_used_at        TEXT,
            use_count           INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_tracks_genre ON tracks(genre);
        CREATE INDEX IF NOT EXISTS idx_tracks_bpm ON tracks(bpm);
        CREATE INDEX IF NOT EXISTS idx_tracks_hash ON tracks(content_hash);

        CREATE TABLE IF NOT EXISTS correction_history (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            track_id        INTEGER NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
            path            TEXT NOT NULL,
            artist          TEXT NOT NULL DEFAULT '',
            old_genre       TEXT NOT NULL DEFAULT '',
            new_genre       TEXT NOT NULL DEFAULT '',
            bpm             REAL NOT NULL DEFAULT 0,
            features_json   TEXT NOT NULL DEFAULT '{}',
            timestamp       TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_correction_track ON correction_history(track_id);
        CREATE INDEX IF NOT EXISTS idx_correction_artist ON correction_history(artist);

        CREATE TABLE IF NOT EXISTS training_decisions (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            question        TEXT NOT NULL,
            options_json    TEXT NOT NULL DEFAULT '[]',
            answer          TEXT,
            confidence      REAL NOT NULL DEFAULT 0,
            context_json    TEXT NOT NULL DEFAULT '{}',
            timestamp       TEXT NOT NULL DEFAULT (datetime('now')),
            decision_type   TEXT NOT NULL DEFAULT '',
            answered        INTEGER NOT NULL DEFAULT 0,
            audio_path      TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_decisions_answered ON training_decisions(answered);
        ",
    )?;
    Ok(())
}

/// V2: dense genre-id map table, used by the Learning Engine.
fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS genre_ids (
            genre   TEXT PRIMARY KEY,
            id      INTEGER NOT NULL UNIQUE
        );
        ",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_runs_migrations() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.conn.lock().unwrap();
        let version: i32 = conn.pragma_query_value(None, "user_version", |r| r.get(0)).unwrap();
        assert_eq!(version, 2);
    }
}
