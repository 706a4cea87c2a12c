use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use tracing::debug;

use crate::config::{MemorySettingsStore, Settings, SettingsStore};
use crate::error::{EngineError, Result};
use crate::track::{CoverArt, CoverRegistry, LoftyMetadata, MetadataProvider, Track};

use super::clock::{Clock, MonotonicClock};
use super::decode::{FileReader, FsReader, Loader};
use super::engine::{EngineOptions, EngineParts, Inbox};
use super::equalizer::{BAND_COUNT, Equalizer, EqualizerBand, Preset};
use super::events::Events;
use super::navigator::Navigator;
use super::render::RenderBackend;
use super::sink::RodioBackend;
use super::thread::spawn_engine_thread;
use super::types::{AudioCmd, PlayMode, PlaybackHandle, PlaybackInfo, TransportState};

/// Collaborators the engine talks to. Swap any of them out for tests or embedding.
pub struct Services {
    pub reader: Arc<dyn FileReader>,
    pub metadata: Arc<dyn MetadataProvider>,
    pub store: Box<dyn SettingsStore>,
    pub covers: CoverRegistry,
    pub clock: Arc<dyn Clock>,
    pub navigator: Navigator,
}

impl Services {
    /// Filesystem, lofty tags, an in-memory settings store and the system clock.
    pub fn new(settings: &Settings) -> Self {
        Self {
            reader: Arc::new(FsReader),
            metadata: Arc::new(LoftyMetadata),
            store: Box::new(MemorySettingsStore::from_settings(settings)),
            covers: CoverRegistry::default(),
            clock: Arc::new(MonotonicClock::new()),
            navigator: Navigator::new(),
        }
    }
}

/// Thread-safe handle to the playback engine.
///
/// Mutating calls are queued to the control thread and return immediately;
/// their effects show up in the queries and through [`AudioPlayer::events`].
pub struct AudioPlayer {
    tx: Sender<Inbox>,
    playback: PlaybackHandle,
    clock: Arc<dyn Clock>,
    equalizer: Equalizer,
    events: Events,
    covers: CoverRegistry,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl AudioPlayer {
    /// Engine on the default output device.
    pub fn new(settings: &Settings) -> Result<Self> {
        Self::with_backend(settings, Services::new(settings), RodioBackend::open_default)
    }

    pub fn with_backend<B, F>(settings: &Settings, services: Services, make_backend: F) -> Result<Self>
    where
        B: RenderBackend + 'static,
        F: FnOnce() -> Result<B> + Send + 'static,
    {
        let Services {
            reader,
            metadata,
            store,
            covers,
            clock,
            navigator,
        } = services;

        let (tx, rx) = mpsc::channel::<Inbox>();
        let playback: PlaybackHandle = Arc::new(Mutex::new(PlaybackInfo::default()));
        let equalizer = Equalizer::new();
        let events = Events::new();

        let parts = EngineParts {
            loader: Loader::new(reader, metadata, covers.clone()),
            store,
            events: events.clone(),
            clock: Arc::clone(&clock),
            playback: Arc::clone(&playback),
            inbox: tx.clone(),
            equalizer: equalizer.clone(),
            navigator,
            options: EngineOptions::from(&settings.playback),
            play_mode: PlayMode::from(settings.playback.play_mode),
            volume: settings.playback.volume,
        };
        let join = spawn_engine_thread(make_backend, parts, rx)?;

        Ok(Self {
            tx,
            playback,
            clock,
            equalizer,
            events,
            covers,
            join: Mutex::new(Some(join)),
        })
    }

    pub fn send(&self, cmd: AudioCmd) -> Result<()> {
        self.tx
            .send(Inbox::Command(cmd))
            .map_err(|_| EngineError::Disconnected)
    }

    /// Decode `path` and make it current without starting playback.
    pub fn load_track(&self, path: impl Into<PathBuf>) -> Result<()> {
        self.send(AudioCmd::LoadTrack(path.into()))
    }

    pub fn play(&self) -> Result<()> {
        self.send(AudioCmd::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(AudioCmd::Pause)
    }

    pub fn toggle_pause(&self) -> Result<()> {
        self.send(AudioCmd::TogglePause)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(AudioCmd::Stop)
    }

    pub fn seek(&self, seconds: f64) -> Result<()> {
        self.send(AudioCmd::Seek(seconds))
    }

    pub fn set_volume(&self, volume: f32) -> Result<()> {
        self.send(AudioCmd::SetVolume(volume))
    }

    /// Playback speed, clamped to `[0.25, 4]`. Setting the current rate again does nothing.
    pub fn set_playback_rate(&self, rate: f64) -> Result<()> {
        self.send(AudioCmd::SetPlaybackRate(rate))
    }

    pub fn set_playlist(&self, tracks: Vec<PathBuf>, start: Option<usize>) -> Result<()> {
        self.send(AudioCmd::SetPlaylist { tracks, start })
    }

    pub fn next_track(&self) -> Result<()> {
        self.send(AudioCmd::Next)
    }

    pub fn previous_track(&self) -> Result<()> {
        self.send(AudioCmd::Prev)
    }

    pub fn set_play_mode(&self, mode: PlayMode) -> Result<()> {
        self.send(AudioCmd::SetPlayMode(mode))
    }

    pub fn toggle_play_mode(&self) -> Result<()> {
        self.send(AudioCmd::TogglePlayMode)
    }

    pub fn set_equalizer_enabled(&self, enabled: bool) -> Result<()> {
        self.send(AudioCmd::SetEqualizerEnabled(enabled))
    }

    pub fn set_gapless_playback(&self, enabled: bool) -> Result<()> {
        self.send(AudioCmd::SetGapless(enabled))
    }

    fn info(&self) -> MutexGuard<'_, PlaybackInfo> {
        self.playback
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// A copy of the latest published engine state.
    pub fn snapshot(&self) -> PlaybackInfo {
        self.info().clone()
    }

    pub fn playback_handle(&self) -> PlaybackHandle {
        Arc::clone(&self.playback)
    }

    /// Live position in seconds.
    pub fn position(&self) -> f64 {
        let now = self.clock.now();
        self.info().position_at(now)
    }

    pub fn duration(&self) -> f64 {
        self.info().duration
    }

    pub fn state(&self) -> TransportState {
        self.info().state
    }

    pub fn is_playing(&self) -> bool {
        self.state() == TransportState::Playing
    }

    pub fn volume(&self) -> f32 {
        self.info().volume
    }

    pub fn playback_rate(&self) -> f64 {
        self.info().rate
    }

    pub fn current_track(&self) -> Option<Track> {
        self.info().track.clone()
    }

    pub fn play_mode(&self) -> PlayMode {
        self.info().play_mode
    }

    pub fn equalizer_enabled(&self) -> bool {
        self.info().equalizer_enabled
    }

    pub fn gapless_playback(&self) -> bool {
        self.info().gapless
    }

    /// Shared equalizer handle. Changes are heard immediately.
    pub fn equalizer(&self) -> &Equalizer {
        &self.equalizer
    }

    pub fn set_band_gain(&self, band: usize, gain_db: f32) -> Result<()> {
        self.equalizer.set_band_gain(band, gain_db)
    }

    pub fn band_gain(&self, band: usize) -> f32 {
        self.equalizer.band_gain(band)
    }

    pub fn set_all_gains(&self, gains: &[f32]) -> Result<()> {
        self.equalizer.set_all_gains(gains)
    }

    pub fn gains(&self) -> [f32; BAND_COUNT] {
        self.equalizer.gains()
    }

    pub fn apply_preset(&self, preset: Preset) {
        self.equalizer.apply_preset(preset);
    }

    pub fn apply_preset_named(&self, name: &str) -> Result<()> {
        self.equalizer.apply_preset_named(name)
    }

    pub fn preset_names(&self) -> Vec<&'static str> {
        Equalizer::preset_names()
    }

    pub fn reset_equalizer(&self) {
        self.equalizer.reset();
    }

    pub fn bands(&self) -> [EqualizerBand; BAND_COUNT] {
        self.equalizer.bands()
    }

    /// Resolve a `cover://` reference from [`Track::cover`].
    pub fn cover(&self, uri: &str) -> Option<CoverArt> {
        self.covers.resolve(uri)
    }

    /// Subscriber registration.
    pub fn events(&self) -> &Events {
        &self.events
    }

    /// Stop playback, release every buffer and join the control thread.
    pub fn shutdown(&self) {
        let _ = self.send(AudioCmd::Quit);
        let handle = self
            .join
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
            self.events.clear();
            debug!("audio player shut down");
        }
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
