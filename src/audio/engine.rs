//! Control-thread state machine.
//!
//! The engine owns the transport, the playlist, the current track and the
//! preloader. It reacts to commands from [`super::AudioPlayer`] and to
//! messages from decode workers and render nodes, all delivered through one
//! inbox so every state change happens on the control thread.

use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::Sender;

use tracing::{debug, error, info, warn};

use crate::config::{PlaybackSettings, SettingsStore};
use crate::error::{EngineError, Result};

use super::chain::{Routing, SignalChain};
use super::clock::Clock;
use super::decode::{LoadedTrack, Loader};
use super::equalizer::Equalizer;
use super::events::Events;
use super::navigator::{Navigator, Playlist};
use super::preload::{PreloadTarget, Preloader, Request};
use super::render::RenderBackend;
use super::transport::{EndNotifier, Transport};
use super::types::{AudioCmd, PlayMode, PlaybackHandle, TransportState};

/// Work that finished off the control thread.
#[derive(Debug)]
pub enum WorkerMsg {
    Loaded {
        ticket: u64,
        result: Result<LoadedTrack>,
    },
    Preloaded {
        ticket: u64,
        result: Result<LoadedTrack>,
    },
    /// A render node played its buffer to the end.
    RenderEnded { node: u64 },
}

#[derive(Debug)]
pub enum Inbox {
    Command(AudioCmd),
    Worker(WorkerMsg),
}

/// Timing knobs, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineOptions {
    pub seek_epsilon: f64,
    pub preload_delay: f64,
    pub advance_preload_delay: f64,
    pub position_interval: f64,
}

impl From<&PlaybackSettings> for EngineOptions {
    fn from(p: &PlaybackSettings) -> Self {
        let secs = |ms: u64| ms as f64 / 1000.0;
        Self {
            seek_epsilon: secs(p.seek_epsilon_ms),
            preload_delay: secs(p.preload_delay_ms),
            advance_preload_delay: secs(p.advance_preload_delay_ms),
            position_interval: secs(p.position_interval_ms),
        }
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from(&PlaybackSettings::default())
    }
}

/// Everything the engine is built from apart from the render backend.
pub struct EngineParts {
    pub loader: Loader,
    pub store: Box<dyn SettingsStore>,
    pub events: Events,
    pub clock: Arc<dyn Clock>,
    pub playback: PlaybackHandle,
    pub inbox: Sender<Inbox>,
    pub equalizer: Equalizer,
    pub navigator: Navigator,
    pub options: EngineOptions,
    pub play_mode: PlayMode,
    pub volume: f32,
}

#[derive(Debug)]
struct PendingLoad {
    ticket: u64,
    path: PathBuf,
    index: Option<usize>,
    autoplay: bool,
    preload_delay: f64,
}

pub struct Engine<B> {
    transport: Transport<B>,
    loader: Loader,
    preloader: Preloader,
    playlist: Playlist,
    navigator: Navigator,
    store: Box<dyn SettingsStore>,
    events: Events,
    current: Option<LoadedTrack>,
    pending_load: Option<PendingLoad>,
    next_load_ticket: u64,
    inbox: Sender<Inbox>,
    clock: Arc<dyn Clock>,
    options: EngineOptions,
    preload_due: Option<f64>,
    last_position_emit: f64,
    playback: PlaybackHandle,
}

impl<B: RenderBackend> Engine<B> {
    pub fn new(backend: B, parts: EngineParts) -> Self {
        let EngineParts {
            loader,
            store,
            events,
            clock,
            playback,
            inbox,
            equalizer,
            navigator,
            options,
            play_mode,
            volume,
        } = parts;

        let chain = SignalChain::new(equalizer, Routing::from_enabled(store.equalizer_enabled()));
        let ended = inbox.clone();
        let on_end: EndNotifier = Arc::new(move |node: u64| {
            // The receiver only goes away when the engine itself does.
            let _ = ended.send(Inbox::Worker(WorkerMsg::RenderEnded { node }));
        });
        let mut transport = Transport::new(
            backend,
            Arc::clone(&clock),
            chain,
            options.seek_epsilon,
            on_end,
        );
        transport.set_volume(volume);

        let mut playlist = Playlist::default();
        playlist.set_mode(play_mode);

        let engine = Self {
            transport,
            loader,
            preloader: Preloader::new(),
            playlist,
            navigator,
            store,
            events,
            current: None,
            pending_load: None,
            next_load_ticket: 0,
            inbox,
            clock,
            options,
            preload_due: None,
            last_position_emit: 0.0,
            playback,
        };
        engine.publish();
        engine
    }

    /// Process one inbox message. Returns false once the engine should exit.
    pub fn handle(&mut self, msg: Inbox) -> bool {
        let keep_going = match msg {
            Inbox::Command(cmd) => self.command(cmd),
            Inbox::Worker(msg) => {
                self.worker(msg);
                true
            }
        };
        self.publish();
        keep_going
    }

    /// Periodic housekeeping: due preloads and position notifications.
    pub fn tick(&mut self) {
        let now = self.clock.now();

        if self.preload_due.is_some_and(|due| now >= due) {
            self.preload_due = None;
            self.preload_next();
        }

        if self.transport.state() == TransportState::Playing
            && now - self.last_position_emit >= self.options.position_interval
        {
            self.last_position_emit = now;
            self.events.position_changed(self.transport.position());
        }

        self.publish();
    }

    /// Stop playback and release every buffer the engine holds.
    pub fn shutdown(&mut self) {
        if self.transport.stop() {
            self.events.playback_state_changed(false);
        }
        self.transport.set_buffer(None);
        self.preloader.clear();
        self.pending_load = None;
        self.preload_due = None;
        self.current = None;
        self.publish();
        info!("audio engine shut down");
    }

    fn command(&mut self, cmd: AudioCmd) -> bool {
        debug!(?cmd, "audio command");
        match cmd {
            AudioCmd::LoadTrack(path) => {
                let index = self.playlist.position_of(&path);
                self.request_load(path, index, false, self.options.preload_delay);
            }
            AudioCmd::Play => self.play(),
            AudioCmd::Pause => self.pause(),
            AudioCmd::TogglePause => {
                if self.transport.state() == TransportState::Playing {
                    self.pause();
                } else {
                    self.play();
                }
            }
            AudioCmd::Stop => self.stop(),
            AudioCmd::Seek(t) => self.seek(t),
            AudioCmd::SetVolume(v) => {
                let v = self.transport.set_volume(v);
                self.events.volume_changed(v);
            }
            AudioCmd::SetPlaybackRate(rate) => self.set_rate(rate),
            AudioCmd::SetPlaylist { tracks, start } => self.set_playlist(tracks, start),
            AudioCmd::Next => self.next(),
            AudioCmd::Prev => self.previous(),
            AudioCmd::SetPlayMode(mode) => self.set_play_mode(mode),
            AudioCmd::TogglePlayMode => self.set_play_mode(self.playlist.mode().cycle()),
            AudioCmd::SetEqualizerEnabled(enabled) => self.set_equalizer_enabled(enabled),
            AudioCmd::SetGapless(enabled) => self.set_gapless(enabled),
            AudioCmd::Quit => {
                self.shutdown();
                return false;
            }
        }
        true
    }

    fn worker(&mut self, msg: WorkerMsg) {
        match msg {
            WorkerMsg::Loaded { ticket, result } => {
                let Some(pending) = self.pending_load.take_if(|p| p.ticket == ticket) else {
                    debug!(ticket, "dropping superseded load");
                    return;
                };
                match result {
                    Ok(loaded) => {
                        self.install(loaded, pending.index, pending.autoplay, pending.preload_delay)
                    }
                    Err(e) => {
                        error!(path = %pending.path.display(), error = %e, "load failed");
                        self.events.error(&e);
                    }
                }
            }
            WorkerMsg::Preloaded { ticket, result } => {
                if let Some(next) = self
                    .preloader
                    .complete(ticket, result, self.playlist.generation())
                {
                    self.start_preload(next);
                }
            }
            WorkerMsg::RenderEnded { node } => {
                if self.transport.finish_natural(node) {
                    debug!(node, "track played to the end");
                    self.events.playback_state_changed(false);
                    self.on_natural_end();
                }
            }
        }
    }

    fn play(&mut self) {
        if !self.transport.has_buffer() {
            self.play_without_track();
            return;
        }
        match self.transport.play() {
            Ok(true) => {
                self.last_position_emit = self.clock.now();
                self.events.playback_state_changed(true);
            }
            Ok(false) => {}
            Err(e) => {
                warn!(error = %e, "playback failed to start");
                self.events.error(&e);
                self.events.playback_state_changed(false);
            }
        }
    }

    /// `play` with nothing loaded: start the load that is running, or the playlist's
    /// current entry.
    fn play_without_track(&mut self) {
        if let Some(pending) = &mut self.pending_load {
            pending.autoplay = true;
            return;
        }
        let index = self.playlist.current().unwrap_or(0);
        match self.playlist.get(index).map(Path::to_path_buf) {
            Some(path) => self.request_load(path, Some(index), true, self.options.preload_delay),
            None => debug!("play ignored, nothing to play"),
        }
    }

    fn pause(&mut self) {
        if self.transport.pause() {
            self.events.playback_state_changed(false);
            self.events.position_changed(self.transport.position());
        }
    }

    fn stop(&mut self) {
        if let Some(pending) = &mut self.pending_load {
            pending.autoplay = false;
        }
        if self.transport.stop() {
            self.events.playback_state_changed(false);
        }
        self.events.position_changed(0.0);
    }

    fn seek(&mut self, t: f64) {
        let was_playing = self.transport.state() == TransportState::Playing;
        match self.transport.seek(t) {
            Ok(position) => {
                if was_playing {
                    self.last_position_emit = self.clock.now();
                }
                self.events.position_changed(position);
            }
            Err(EngineError::NoTrack) => debug!("seek ignored, no track loaded"),
            Err(e) => {
                warn!(error = %e, "playback failed to restart after seek");
                self.events.error(&e);
                self.events.playback_state_changed(false);
            }
        }
    }

    fn set_rate(&mut self, rate: f64) {
        let was_playing = self.transport.state() == TransportState::Playing;
        match self.transport.set_rate(rate) {
            Ok(Some(rate)) => {
                if was_playing {
                    self.last_position_emit = self.clock.now();
                }
                self.events.playback_rate_changed(rate);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "playback failed to restart at the new rate");
                self.events.error(&e);
                self.events.playback_state_changed(false);
                self.events.playback_rate_changed(self.transport.rate());
            }
        }
    }

    fn set_playlist(&mut self, tracks: Vec<PathBuf>, start: Option<usize>) {
        self.playlist.replace(tracks, start);
        if self.playlist.current().is_none()
            && let Some(current) = &self.current
        {
            let index = self.playlist.position_of(&current.track.path);
            self.playlist.set_current(index);
        }
        self.preloader.invalidate(self.playlist.generation());
        info!(
            len = self.playlist.len(),
            current = ?self.playlist.current(),
            "playlist replaced"
        );
        self.schedule_preload(self.options.preload_delay);
    }

    fn set_play_mode(&mut self, mode: PlayMode) {
        if self.playlist.mode() == mode {
            return;
        }
        self.playlist.set_mode(mode);
        debug!(?mode, "play mode changed");
        self.events.play_mode_changed(mode);
    }

    fn set_equalizer_enabled(&mut self, enabled: bool) {
        let routing = Routing::from_enabled(enabled);
        if self.store.equalizer_enabled() == enabled && self.transport.chain().routing() == routing
        {
            return;
        }
        self.store.set_equalizer_enabled(enabled);
        self.transport.chain().reconnect(routing);
        self.events.equalizer_changed(enabled);
    }

    fn set_gapless(&mut self, enabled: bool) {
        self.store.set_gapless_enabled(enabled);
        if enabled {
            self.schedule_preload(self.options.preload_delay);
        } else {
            self.preloader.clear();
            self.preload_due = None;
        }
        debug!(enabled, "gapless playback");
    }

    /// Where navigation starts from: the entry being loaded, else the current one.
    fn cursor(&self) -> Option<usize> {
        self.pending_load
            .as_ref()
            .and_then(|p| p.index)
            .or(self.playlist.current())
    }

    fn next(&mut self) {
        let cursor = self.cursor();
        let next = self
            .navigator
            .next(cursor, self.playlist.len(), self.playlist.mode());
        match next {
            Some(index) => self.go_to(index, true),
            None => debug!("next ignored, playlist is empty"),
        }
    }

    fn previous(&mut self) {
        let cursor = self.cursor();
        let previous = self
            .navigator
            .previous(cursor, self.playlist.len(), self.playlist.mode());
        match previous {
            Some(index) => self.go_to(index, false),
            None => debug!("previous ignored, playlist is empty"),
        }
    }

    fn on_natural_end(&mut self) {
        if self.playlist.current().is_none() {
            self.events.position_changed(0.0);
            return;
        }
        self.next();
    }

    /// Make playlist entry `index` current and play it.
    fn go_to(&mut self, index: usize, gapless: bool) {
        let Some(path) = self.playlist.get(index).map(Path::to_path_buf) else {
            return;
        };

        let same_entry = self.playlist.current() == Some(index)
            && self.pending_load.is_none()
            && self.current.as_ref().is_some_and(|c| c.track.path == path);
        if same_entry {
            debug!(index, "restarting current track");
            if self.transport.stop() {
                self.events.playback_state_changed(false);
            }
            self.events.position_changed(0.0);
            self.play();
            return;
        }

        if gapless && self.store.gapless_enabled() {
            let generation = self.playlist.generation();
            if let Some(loaded) = self.preloader.take(index, &path, generation) {
                info!(index, path = %path.display(), "gapless handoff");
                self.pending_load = None;
                self.install(loaded, Some(index), true, self.options.advance_preload_delay);
                return;
            }
        }

        self.request_load(path, Some(index), true, self.options.advance_preload_delay);
    }

    fn request_load(&mut self, path: PathBuf, index: Option<usize>, autoplay: bool, delay: f64) {
        self.next_load_ticket += 1;
        let ticket = self.next_load_ticket;
        let inbox = self.inbox.clone();
        let spawned = self.loader.spawn(path.clone(), move |result| {
            let _ = inbox.send(Inbox::Worker(WorkerMsg::Loaded { ticket, result }));
        });

        match spawned {
            Ok(()) => {
                debug!(ticket, path = %path.display(), "load started");
                self.pending_load = Some(PendingLoad {
                    ticket,
                    path,
                    index,
                    autoplay,
                    preload_delay: delay,
                });
            }
            Err(source) => {
                let e = EngineError::Spawn {
                    what: "decode",
                    source,
                };
                error!(path = %path.display(), error = %e, "load failed");
                self.events.error(&e);
            }
        }
    }

    /// Swap `loaded` in as the current track, releasing the old one.
    fn install(&mut self, loaded: LoadedTrack, index: Option<usize>, autoplay: bool, delay: f64) {
        if self.transport.stop() {
            self.events.playback_state_changed(false);
        }
        self.transport.set_buffer(Some(Arc::clone(&loaded.buffer)));
        self.transport.set_duration(loaded.track.duration);

        let previous = mem::replace(&mut self.current, Some(loaded));
        drop(previous);
        self.playlist.set_current(index);

        if let Some(current) = &self.current {
            let track = &current.track;
            info!(
                path = %track.path.display(),
                title = %track.title,
                artist = %track.artist,
                duration = track.duration,
                "now playing"
            );
            self.events.track_changed(track);
            self.events.duration_changed(&track.path, track.duration);
        }
        self.events.position_changed(0.0);

        self.schedule_preload(delay);
        if autoplay {
            self.play();
        }
    }

    fn schedule_preload(&mut self, delay: f64) {
        let wanted = self.store.gapless_enabled()
            && self.playlist.len() > 1
            && self.playlist.current().is_some();
        self.preload_due = wanted.then(|| self.clock.now() + delay.max(0.0));
    }

    fn preload_next(&mut self) {
        if !self.store.gapless_enabled() {
            return;
        }
        let Some(index) = self.playlist.preload_index() else {
            return;
        };
        let Some(path) = self.playlist.get(index).map(Path::to_path_buf) else {
            return;
        };
        self.start_preload(PreloadTarget {
            index,
            path,
            generation: self.playlist.generation(),
        });
    }

    fn start_preload(&mut self, target: PreloadTarget) {
        let path = target.path.clone();
        match self.preloader.request(target) {
            Request::Start(ticket) => {
                let inbox = self.inbox.clone();
                let spawned = self.loader.spawn(path.clone(), move |result| {
                    let _ = inbox.send(Inbox::Worker(WorkerMsg::Preloaded { ticket, result }));
                });
                match spawned {
                    Ok(()) => debug!(ticket, path = %path.display(), "preload started"),
                    Err(source) => {
                        let e = EngineError::Spawn {
                            what: "decode",
                            source,
                        };
                        // Nothing else is in flight, so there is no queued follow-up.
                        let _ = self
                            .preloader
                            .complete(ticket, Err(e), self.playlist.generation());
                    }
                }
            }
            Request::Ready => debug!(path = %path.display(), "preload already cached"),
            Request::Joined => debug!(path = %path.display(), "preload already running"),
            Request::Queued => debug!(path = %path.display(), "preload queued"),
        }
    }

    /// Copy the engine state into the shared snapshot.
    fn publish(&self) {
        let mut info = self
            .playback
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        info.state = self.transport.state();
        info.paused_offset = self.transport.paused_offset();
        info.start_reference = self.transport.start_reference();
        info.duration = self.transport.duration();
        info.volume = self.transport.volume();
        info.rate = self.transport.rate();
        let track = self.current.as_ref().map(|c| &c.track);
        if info.track.as_ref() != track {
            info.track = track.cloned();
        }
        info.index = self.playlist.current();
        info.playlist_len = self.playlist.len();
        info.play_mode = self.playlist.mode();
        info.equalizer_enabled = self.store.equalizer_enabled();
        info.gapless = self.store.gapless_enabled();
    }

    pub fn transport(&self) -> &Transport<B> {
        &self.transport
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn preloader(&self) -> &Preloader {
        &self.preloader
    }

    pub fn current_track(&self) -> Option<&LoadedTrack> {
        self.current.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.pending_load.is_some()
    }
}
