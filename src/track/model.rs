use std::path::{Path, PathBuf};

use super::cover::CoverArt;

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

/// The track that is (or is about to become) current.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub path: PathBuf,
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Seconds. Tag-supplied when positive, otherwise measured from the decoded buffer.
    pub duration: f64,
    pub sample_rate: u32,
    /// Kilobits per second, 0 when unknown.
    pub bitrate: u32,
    pub year: Option<u32>,
    pub genre: Option<String>,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    /// `cover://` reference resolvable through the engine while this track is alive.
    pub cover: Option<String>,
}

/// What the metadata collaborator reports for a file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Seconds; `None` or non-positive means "ask the decoder".
    pub duration: Option<f64>,
    pub bitrate: Option<u32>,
    pub sample_rate: Option<u32>,
    pub year: Option<u32>,
    pub genre: Option<String>,
    pub track: Option<u32>,
    pub disc: Option<u32>,
    pub cover: Option<CoverArt>,
}

/// Tag duration wins when it is present and positive.
pub fn resolve_duration(tagged: Option<f64>, decoded: f64) -> f64 {
    match tagged {
        Some(d) if d.is_finite() && d > 0.0 => d,
        _ => decoded,
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl Track {
    /// Combine collaborator metadata with what the decoder measured.
    pub fn resolve(
        path: &Path,
        meta: &TrackMetadata,
        decoded_duration: f64,
        decoded_sample_rate: u32,
        cover: Option<String>,
    ) -> Self {
        let title = non_empty(meta.title.as_deref())
            .or_else(|| non_empty(path.file_stem().and_then(|s| s.to_str())))
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

        Self {
            path: path.to_path_buf(),
            title,
            artist: non_empty(meta.artist.as_deref()).unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
            album: non_empty(meta.album.as_deref()).unwrap_or_else(|| UNKNOWN_ALBUM.to_string()),
            duration: resolve_duration(meta.duration, decoded_duration),
            sample_rate: meta
                .sample_rate
                .filter(|&r| r > 0)
                .unwrap_or(decoded_sample_rate),
            bitrate: meta.bitrate.unwrap_or(0),
            year: meta.year,
            genre: non_empty(meta.genre.as_deref()),
            track_number: meta.track,
            disc_number: meta.disc,
            cover,
        }
    }
}
