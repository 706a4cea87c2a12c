//! Configuration loader, schema types and the runtime settings store.
//!
//! This module exposes the configuration schema used to seed the engine,
//! helpers to load it from disk, and the getter/setter collaborator the
//! engine writes its gapless and equalizer toggles through.

mod load;
mod schema;
mod store;

pub use load::{default_config_path, resolve_config_path};
pub use schema::*;
pub use store::{MemorySettingsStore, SettingsStore};
