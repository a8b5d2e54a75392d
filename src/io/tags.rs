use lofty::file::TaggedFileExt;
use lofty::prelude::*;
use std::path::Path;

/// Tags extracted from audio file metadata.
pub struct TagInfo {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_secs: Option<f64>,
}

/// Read tags from an audio file. Returns empty tags on failure.
pub fn read_tags(path: &Path) -> TagInfo {
    let empty = TagInfo {
        title: None,
        artist: None,
        album: None,
        duration_secs: None,
    };

    let tagged_file = match lofty::read_from_path(path) {
        Ok(f) => f,
        Err(e) => {
            log::debug!("Could not read tags from {}: {}", path.display(), e);
            return empty;
        }
    };

    let duration_secs = {
        let secs = tagged_file.properties().duration().as_secs_f64();
        if secs > 0.0 {
            Some(secs)
        } else {
            None
        }
    };

    let tag = match tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
        Some(t) => t,
        None => {
            return TagInfo {
                duration_secs,
                ..empty
            }
        }
    };

    TagInfo {
        title: tag.title().map(|s| s.to_string()),
        artist: tag.artist().map(|s| s.to_string()),
        album: tag.album().map(|s| s.to_string()),
        duration_secs,
    }
}
