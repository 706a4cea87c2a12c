//! Engine notifications.
//!
//! Each event has at most one subscriber; subscribing again replaces the
//! previous one. Callbacks run on the control thread with no engine lock held,
//! so a callback may call back into [`super::AudioPlayer`].

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::EngineError;
use crate::track::Track;

use super::types::PlayMode;

type Slot<T> = Option<Box<T>>;

#[derive(Default)]
struct Slots {
    track_changed: Slot<dyn FnMut(&Track) + Send>,
    playback_state_changed: Slot<dyn FnMut(bool) + Send>,
    position_changed: Slot<dyn FnMut(f64) + Send>,
    volume_changed: Slot<dyn FnMut(f32) + Send>,
    playback_rate_changed: Slot<dyn FnMut(f64) + Send>,
    duration_changed: Slot<dyn FnMut(&Path, f64) + Send>,
    equalizer_changed: Slot<dyn FnMut(bool) + Send>,
    play_mode_changed: Slot<dyn FnMut(PlayMode) + Send>,
    error: Slot<dyn FnMut(&EngineError) + Send>,
}

#[derive(Clone, Default)]
pub struct Events {
    slots: Arc<Mutex<Slots>>,
}

macro_rules! event {
    ($on:ident, $field:ident, ($($arg:ident: $ty:ty),*)) => {
        pub fn $on<F>(&self, callback: F)
        where
            F: FnMut($($ty),*) + Send + 'static,
        {
            self.slots().$field = Some(Box::new(callback));
        }

        pub(crate) fn $field(&self, $($arg: $ty),*) {
            let taken = self.slots().$field.take();
            if let Some(mut callback) = taken {
                callback($($arg),*);
                let mut slots = self.slots();
                // A subscription made from inside the callback wins.
                if slots.$field.is_none() {
                    slots.$field = Some(callback);
                }
            }
        }
    };
}

impl Events {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Drop every subscriber.
    pub fn clear(&self) {
        *self.slots() = Slots::default();
    }

    event!(on_track_changed, track_changed, (track: &Track));
    event!(on_playback_state_changed, playback_state_changed, (playing: bool));
    event!(on_position_changed, position_changed, (seconds: f64));
    event!(on_volume_changed, volume_changed, (volume: f32));
    event!(on_playback_rate_changed, playback_rate_changed, (rate: f64));
    event!(on_duration_changed, duration_changed, (path: &Path, seconds: f64));
    event!(on_equalizer_changed, equalizer_changed, (enabled: bool));
    event!(on_play_mode_changed, play_mode_changed, (mode: PlayMode));
    event!(on_error, error, (error: &EngineError));
}
