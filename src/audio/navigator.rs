//! Playlist state and the next/previous index computation.
//!
//! The index functions are pure apart from the random source used by
//! shuffle; callers pass the RNG in so tests can seed it.

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, RngExt};

use super::types::PlayMode;

/// Index that follows `current` in a playlist of `len` entries.
///
/// `None` in means "no selection"; `None` out means "nothing to play" and
/// must be treated as a no-op by the caller.
pub fn next_index<R: Rng + ?Sized>(
    current: Option<usize>,
    len: usize,
    mode: PlayMode,
    rng: &mut R,
) -> Option<usize> {
    if len == 0 {
        return None;
    }
    match mode {
        PlayMode::Sequential => Some(current.map_or(0, |c| (c + 1) % len)),
        PlayMode::Shuffle => Some(random_other(current, len, rng)),
        PlayMode::RepeatOne => current,
    }
}

/// Index that precedes `current` in a playlist of `len` entries.
pub fn previous_index<R: Rng + ?Sized>(
    current: Option<usize>,
    len: usize,
    mode: PlayMode,
    rng: &mut R,
) -> Option<usize> {
    if len == 0 {
        return None;
    }
    match mode {
        PlayMode::Sequential => Some(match current {
            Some(c) if c > 0 && c < len => c - 1,
            Some(c) if c >= len => len - 1,
            _ => len - 1,
        }),
        PlayMode::Shuffle => Some(random_other(current, len, rng)),
        PlayMode::RepeatOne => current,
    }
}

fn random_other<R: Rng + ?Sized>(current: Option<usize>, len: usize, rng: &mut R) -> usize {
    if len == 1 {
        return 0;
    }
    loop {
        let candidate = rng.random_range(0..len);
        if Some(candidate) != current {
            return candidate;
        }
    }
}

/// Owns the random source so the engine can ask for indices without
/// threading an RNG through every call.
pub struct Navigator<R = StdRng> {
    rng: R,
}

impl Navigator<StdRng> {
    pub fn new() -> Self {
        Self {
            rng: rand::make_rng(),
        }
    }
}

impl Default for Navigator<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> Navigator<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    pub fn next(&mut self, current: Option<usize>, len: usize, mode: PlayMode) -> Option<usize> {
        next_index(current, len, mode, &mut self.rng)
    }

    pub fn previous(&mut self, current: Option<usize>, len: usize, mode: PlayMode) -> Option<usize> {
        previous_index(current, len, mode, &mut self.rng)
    }
}

/// Ordered track references, the current selection and the play mode.
///
/// `generation` changes every time the entries are replaced so work that was
/// started against an older playlist can be recognised as stale.
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    tracks: Vec<PathBuf>,
    current: Option<usize>,
    mode: PlayMode,
    generation: u64,
}

impl Playlist {
    pub fn replace(&mut self, tracks: Vec<PathBuf>, start: Option<usize>) {
        self.current = start.filter(|&i| i < tracks.len());
        self.tracks = tracks;
        self.generation += 1;
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Path> {
        self.tracks.get(index).map(PathBuf::as_path)
    }

    pub fn position_of(&self, path: &Path) -> Option<usize> {
        self.tracks.iter().position(|p| p == path)
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn set_current(&mut self, index: Option<usize>) {
        self.current = index.filter(|&i| i < self.tracks.len());
    }

    pub fn mode(&self) -> PlayMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: PlayMode) {
        self.mode = mode;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The entry a gapless preload should target: always the sequential
    /// successor, whatever the play mode.
    pub fn preload_index(&self) -> Option<usize> {
        let len = self.tracks.len();
        match self.current {
            Some(c) if len > 1 => Some((c + 1) % len),
            _ => None,
        }
    }
}
