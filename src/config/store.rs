//! The settings getter/setter the engine writes its toggles through.
//!
//! Persistence lives outside the engine; [`MemorySettingsStore`] is the default
//! in-process implementation, seeded from the loaded [`Settings`].

use std::sync::{Arc, Mutex};

use super::schema::Settings;

/// Getter/setter for the flags the engine owns at runtime.
pub trait SettingsStore: Send {
    fn gapless_enabled(&self) -> bool;
    fn set_gapless_enabled(&mut self, enabled: bool);
    fn equalizer_enabled(&self) -> bool;
    fn set_equalizer_enabled(&mut self, enabled: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Flags {
    gapless: bool,
    equalizer: bool,
}

/// In-memory store. Clones share the same flags, so a caller can keep one
/// clone to observe what the engine wrote.
#[derive(Debug, Clone)]
pub struct MemorySettingsStore {
    flags: Arc<Mutex<Flags>>,
}

impl MemorySettingsStore {
    pub fn new(gapless: bool, equalizer: bool) -> Self {
        Self {
            flags: Arc::new(Mutex::new(Flags { gapless, equalizer })),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.playback.gapless, settings.equalizer.enabled)
    }

    fn read(&self) -> Flags {
        match self.flags.lock() {
            Ok(f) => *f,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn update(&self, f: impl FnOnce(&mut Flags)) {
        match self.flags.lock() {
            Ok(mut flags) => f(&mut flags),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl Default for MemorySettingsStore {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl SettingsStore for MemorySettingsStore {
    fn gapless_enabled(&self) -> bool {
        self.read().gapless
    }

    fn set_gapless_enabled(&mut self, enabled: bool) {
        self.update(|f| f.gapless = enabled);
    }

    fn equalizer_enabled(&self) -> bool {
        self.read().equalizer
    }

    fn set_equalizer_enabled(&mut self, enabled: bool) {
        self.update(|f| f.equalizer = enabled);
    }
}
