//! Audio-related small types and handles.
//!
//! This module defines common enums and type aliases used by the
//! audio subsystem (play mode, commands, transport state, playback info and handles).

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::config::PlayModeSetting;
use crate::track::Track;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum PlayMode {
    /// Walk the playlist in order, wrapping at both ends.
    #[default]
    Sequential,
    /// Jump to a random entry other than the current one.
    Shuffle,
    /// Stay on the current entry.
    RepeatOne,
}

impl PlayMode {
    /// The mode a "cycle play mode" button moves to.
    pub fn cycle(self) -> Self {
        match self {
            Self::Sequential => Self::Shuffle,
            Self::Shuffle => Self::RepeatOne,
            Self::RepeatOne => Self::Sequential,
        }
    }
}

impl From<PlayModeSetting> for PlayMode {
    fn from(s: PlayModeSetting) -> Self {
        match s {
            PlayModeSetting::Sequential => Self::Sequential,
            PlayModeSetting::Shuffle => Self::Shuffle,
            PlayModeSetting::RepeatOne => Self::RepeatOne,
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

#[derive(Debug)]
pub enum AudioCmd {
    /// Decode a file and make it the current track (does not start playback).
    LoadTrack(PathBuf),
    /// Start or resume playback of the current track.
    Play,
    /// Pause, remembering the position.
    Pause,
    /// Pause when playing, resume otherwise.
    TogglePause,
    /// Stop and rewind to 0.
    Stop,
    /// Jump to the given position in seconds (clamped to the track).
    Seek(f64),
    /// Set output volume (clamped to `[0, 1]`).
    SetVolume(f32),
    /// Set playback speed (clamped to `[0.25, 4]`).
    SetPlaybackRate(f64),
    /// Replace the playlist; `start` becomes the current index.
    SetPlaylist {
        tracks: Vec<PathBuf>,
        start: Option<usize>,
    },
    /// Skip to the next entry according to the play mode.
    Next,
    /// Go back according to the play mode.
    Prev,
    SetPlayMode(PlayMode),
    TogglePlayMode,
    /// Route audio through the equalizer (`true`) or around it (`false`).
    SetEqualizerEnabled(bool),
    SetGapless(bool),
    /// Stop playback, release every buffer and leave the control loop.
    Quit,
}

/// Runtime playback information shared with callers of [`super::AudioPlayer`].
#[derive(Debug, Clone)]
pub struct PlaybackInfo {
    pub state: TransportState,
    /// Position while paused or stopped, in seconds.
    pub paused_offset: f64,
    /// Clock value at which offset 0 would have begun while playing.
    pub start_reference: f64,
    pub duration: f64,
    pub volume: f32,
    pub rate: f64,
    pub track: Option<Track>,
    /// Index of the current track in the playlist, if it came from there.
    pub index: Option<usize>,
    pub playlist_len: usize,
    pub play_mode: PlayMode,
    pub equalizer_enabled: bool,
    pub gapless: bool,
}

impl Default for PlaybackInfo {
    fn default() -> Self {
        Self {
            state: TransportState::Stopped,
            paused_offset: 0.0,
            start_reference: 0.0,
            duration: 0.0,
            volume: 1.0,
            rate: 1.0,
            track: None,
            index: None,
            playlist_len: 0,
            play_mode: PlayMode::default(),
            equalizer_enabled: false,
            gapless: true,
        }
    }
}

impl PlaybackInfo {
    /// Position at clock time `now`.
    pub fn position_at(&self, now: f64) -> f64 {
        match self.state {
            TransportState::Playing => {
                ((now - self.start_reference) * self.rate).clamp(0.0, self.duration)
            }
            TransportState::Paused | TransportState::Stopped => self.paused_offset,
        }
    }
}

pub type PlaybackHandle = Arc<Mutex<PlaybackInfo>>;
