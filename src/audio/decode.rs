//! Decode & load stage.
//!
//! Turns a file reference into a [`LoadedTrack`]: raw bytes from the
//! [`FileReader`] collaborator, samples from `rodio`'s decoder, and tags from
//! the [`MetadataProvider`]. Loads run on short-lived worker threads so the
//! control thread never blocks on them.

use std::fmt;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rodio::{Decoder, Source};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::track::{CoverLease, CoverRegistry, MetadataProvider, Track, TrackMetadata};

/// Byte-retrieval collaborator.
pub trait FileReader: Send + Sync {
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Reads straight from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsReader;

impl FileReader for FsReader {
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// Fully decoded, interleaved `f32` samples.
pub struct SampleBuffer {
    channels: u16,
    sample_rate: u32,
    samples: Arc<[f32]>,
}

impl SampleBuffer {
    pub fn new(channels: u16, sample_rate: u32, samples: impl Into<Arc<[f32]>>) -> Self {
        Self {
            channels: channels.max(1),
            sample_rate: sample_rate.max(1),
            samples: samples.into(),
        }
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// A render-side source starting `offset` seconds in.
    pub fn source_from(&self, offset: f64) -> BufferSource {
        let frame = (offset.max(0.0) * self.sample_rate as f64) as usize;
        let pos = frame
            .saturating_mul(self.channels as usize)
            .min(self.samples.len());
        BufferSource {
            samples: Arc::clone(&self.samples),
            pos,
            channels: self.channels,
            sample_rate: self.sample_rate,
        }
    }
}

impl fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("channels", &self.channels)
            .field("sample_rate", &self.sample_rate)
            .field("frames", &self.frames())
            .finish()
    }
}

/// Plays a shared [`SampleBuffer`] without copying it.
#[derive(Clone)]
pub struct BufferSource {
    samples: Arc<[f32]>,
    pos: usize,
    channels: u16,
    sample_rate: u32,
}

impl Iterator for BufferSource {
    type Item = f32;

    #[inline]
    fn next(&mut self) -> Option<f32> {
        let s = self.samples.get(self.pos).copied()?;
        self.pos += 1;
        Some(s)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.samples.len() - self.pos;
        (left, Some(left))
    }
}

impl Source for BufferSource {
    #[inline]
    fn current_span_len(&self) -> Option<usize> {
        Some(self.samples.len() - self.pos)
    }

    #[inline]
    fn channels(&self) -> rodio::ChannelCount {
        self.channels
    }

    #[inline]
    fn sample_rate(&self) -> rodio::SampleRate {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        let frames = self.samples.len() / self.channels as usize;
        Some(Duration::from_secs_f64(frames as f64 / self.sample_rate as f64))
    }
}

/// Decode a complete file held in memory.
pub fn decode_bytes(path: &Path, bytes: Vec<u8>) -> Result<SampleBuffer> {
    let decode_err = |reason: String| EngineError::Decode {
        path: path.to_path_buf(),
        reason,
    };

    let decoder = Decoder::new(Cursor::new(bytes)).map_err(|e| decode_err(e.to_string()))?;
    let channels = decoder.channels();
    let sample_rate = decoder.sample_rate();
    let samples: Vec<f32> = decoder.collect();

    if samples.is_empty() {
        return Err(decode_err("no audio frames".to_string()));
    }
    Ok(SampleBuffer::new(channels, sample_rate, samples))
}

/// A decoded track together with everything it owns.
///
/// Dropping it releases the sample buffer and the cover reference.
pub struct LoadedTrack {
    pub track: Track,
    pub buffer: Arc<SampleBuffer>,
    pub(crate) cover: Option<CoverLease>,
}

impl fmt::Debug for LoadedTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedTrack")
            .field("path", &self.track.path)
            .field("duration", &self.track.duration)
            .field("buffer", &self.buffer)
            .field("cover", &self.cover)
            .finish()
    }
}

/// Runs the read, decode and metadata steps for one file.
#[derive(Clone)]
pub struct Loader {
    reader: Arc<dyn FileReader>,
    metadata: Arc<dyn MetadataProvider>,
    covers: CoverRegistry,
}

impl Loader {
    pub fn new(
        reader: Arc<dyn FileReader>,
        metadata: Arc<dyn MetadataProvider>,
        covers: CoverRegistry,
    ) -> Self {
        Self {
            reader,
            metadata,
            covers,
        }
    }

    pub fn load(&self, path: &Path) -> Result<LoadedTrack> {
        let bytes = self
            .reader
            .read_file(path)
            .map_err(|source| EngineError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let buffer = decode_bytes(path, bytes)?;

        let meta = self.metadata.metadata(path).unwrap_or_else(|reason| {
            warn!(path = %path.display(), %reason, "metadata unavailable, using decoded values");
            TrackMetadata::default()
        });

        let cover = meta.cover.clone().map(|art| self.covers.register(art));
        let track = Track::resolve(
            path,
            &meta,
            buffer.duration(),
            buffer.sample_rate(),
            cover.as_ref().map(CoverLease::uri),
        );
        debug!(
            path = %path.display(),
            duration = track.duration,
            channels = buffer.channels(),
            sample_rate = buffer.sample_rate(),
            "decoded track"
        );

        Ok(LoadedTrack {
            track,
            buffer: Arc::new(buffer),
            cover,
        })
    }

    /// Load on a worker thread and hand the result to `deliver`.
    pub(crate) fn spawn<F>(&self, path: PathBuf, deliver: F) -> io::Result<()>
    where
        F: FnOnce(Result<LoadedTrack>) + Send + 'static,
    {
        let loader = self.clone();
        thread::Builder::new()
            .name("cadenza-decode".into())
            .spawn(move || deliver(loader.load(&path)))
            .map(|_| ())
    }
}
