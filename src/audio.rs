//! Audio playback engine.
//!
//! [`AudioPlayer`] is the public handle. Behind it a control thread owns the
//! transport, the playlist and the current track; decode work runs on
//! short-lived worker threads and the samples themselves are rendered by the
//! backend (rodio by default) through the equalizer chain.

mod chain;
mod clock;
mod decode;
mod engine;
mod equalizer;
mod events;
mod navigator;
mod player;
mod preload;
mod render;
mod sink;
mod thread;
mod transport;
mod types;

pub use chain::{ChainSource, Edge, Node, Routing, SignalChain, topology};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use decode::{
    BufferSource, FileReader, FsReader, LoadedTrack, Loader, SampleBuffer, decode_bytes,
};
pub use engine::{Engine, EngineOptions, EngineParts, Inbox, WorkerMsg};
pub use equalizer::{
    BAND_COUNT, Equalizer, EqualizerBand, FREQUENCIES, FilterKind, MAX_GAIN_DB, MIN_GAIN_DB,
    PEAKING_Q, Preset, SHELF_Q,
};
pub use events::Events;
pub use navigator::{Navigator, Playlist, next_index, previous_index};
pub use player::{AudioPlayer, Services};
pub use preload::{PreloadTarget, Preloader, Request as PreloadRequest};
pub use render::{CompletionCallback, CompletionSlot, RenderBackend, RenderNode, RenderRequest};
pub use sink::RodioBackend;
pub use transport::{EndNotifier, MAX_RATE, MIN_RATE, Transport};
pub use types::{AudioCmd, PlayMode, PlaybackHandle, PlaybackInfo, TransportState};
