use std::path::Path;

use lofty::prelude::{Accessor, AudioFile, ItemKey, TaggedFileExt};
use lofty::tag::Tag;

use super::cover::CoverArt;
use super::model::TrackMetadata;

/// Supplies authoritative tag data for a file.
pub trait MetadataProvider: Send + Sync {
    fn metadata(&self, path: &Path) -> Result<TrackMetadata, String>;
}

/// Reads tags and stream properties with `lofty`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyMetadata;

impl MetadataProvider for LoftyMetadata {
    fn metadata(&self, path: &Path) -> Result<TrackMetadata, String> {
        let tagged = lofty::read_from_path(path).map_err(|e| e.to_string())?;

        let props = tagged.properties();
        let duration = props.duration().as_secs_f64();
        let mut meta = TrackMetadata {
            duration: (duration > 0.0).then_some(duration),
            bitrate: props.audio_bitrate(),
            sample_rate: props.sample_rate(),
            ..TrackMetadata::default()
        };

        if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
            meta.title = tag.title().map(|v| v.to_string());
            meta.artist = tag.artist().map(|v| v.to_string());
            meta.album = tag.album().map(|v| v.to_string());
            meta.genre = tag.genre().map(|v| v.to_string());
            meta.track = tag.track();
            meta.disc = tag.disk();
            meta.year = year_of(tag);
            meta.cover = tag.pictures().first().map(|pic| {
                let format = pic
                    .mime_type()
                    .map(|m| m.as_str().trim_start_matches("image/").to_string())
                    .unwrap_or_else(|| sniff_format(pic.data()).to_string());
                CoverArt::new(pic.data().to_vec(), format)
            });
        }

        Ok(meta)
    }
}

fn year_of(tag: &Tag) -> Option<u32> {
    tag.items()
        .filter(|item| matches!(item.key(), ItemKey::Year | ItemKey::RecordingDate))
        .filter_map(|item| item.value().text())
        .find_map(parse_year)
}

/// Accepts `"1999"`, `"1999-04-01"` and similar; only the leading year counts.
pub(crate) fn parse_year(text: &str) -> Option<u32> {
    let digits: String = text.trim().chars().take_while(char::is_ascii_digit).collect();
    if digits.len() == 4 { digits.parse().ok() } else { None }
}

fn sniff_format(data: &[u8]) -> &'static str {
    if data.starts_with(b"\x89PNG") {
        "png"
    } else if data.starts_with(b"GIF8") {
        "gif"
    } else {
        "jpeg"
    }
}
