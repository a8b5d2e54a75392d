//! Per-user on-disk layout and settings, rooted at `~/.songforge/` (spec §6).

use directories::BaseDirs;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Resolve the store root directory, creating it if missing.
pub fn root_dir() -> PathBuf {
    let root = if let Some(dirs) = BaseDirs::new() {
        dirs.home_dir().join(format!(".{}", crate::APP_NAME))
    } else {
        PathBuf::from(format!(".{}", crate::APP_NAME))
    };
    std::fs::create_dir_all(&root).ok();
    root
}

pub fn default_db_path() -> PathBuf {
    root_dir().join("media.db")
}

pub fn model_path() -> PathBuf {
    root_dir().join("model.sgml")
}

pub fn checkpoint_path() -> PathBuf {
    root_dir().join("training_checkpoint.dat")
}

pub fn hvsc_dir() -> PathBuf {
    root_dir().join("hvsc")
}

pub fn instruments_dir() -> PathBuf {
    root_dir().join("instruments")
}

pub fn generated_dir() -> PathBuf {
    root_dir().join("generated")
}

pub fn settings_path() -> PathBuf {
    root_dir().join("settings.txt")
}

pub fn patterns_path() -> PathBuf {
    root_dir().join("patterns.txt")
}

pub fn pid_path() -> PathBuf {
    root_dir().join(format!("{}.pid", crate::APP_NAME))
}

/// `settings.txt` is a plain `key=value` file, one per line, `#` comments
/// allowed. Unknown keys are preserved on write-back; missing file reads as
/// empty.
#[derive(Debug, Default, Clone)]
pub struct Settings {
    values: BTreeMap<String, String>,
}

impl Settings {
    pub fn load(path: &Path) -> Self {
        let mut values = BTreeMap::new();
        if let Ok(text) = std::fs::read_to_string(path) {
            for line in text.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some((k, v)) = line.split_once('=') {
                    values.insert(k.trim().to_string(), v.trim().to_string());
                }
            }
        }
        Self { values }
    }

    pub fn load_default() -> Self {
        Self::load(&settings_path())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.values
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let mut out = String::new();
        for (k, v) in &self.values {
            out.push_str(k);
            out.push('=');
            out.push_str(v);
            out.push('\n');
        }
        std::fs::write(path, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.txt");

        let mut s = Settings::default();
        s.set("default_bpm", "120");
        s.set("default_genre", "Techno");
        s.save(&path).unwrap();

        let loaded = Settings::load(&path);
        assert_eq!(loaded.get("default_bpm"), Some("120"));
        assert_eq!(loaded.get("default_genre"), Some("Techno"));
        assert_eq!(loaded.get_or("missing", "fallback"), "fallback");
    }

    #[test]
    fn ignores_comments_and_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.txt");
        std::fs::write(&path, "# comment\n\nkey=value\n").unwrap();
        let s = Settings::load(&path);
        assert_eq!(s.get("key"), Some("value"));
    }
}
