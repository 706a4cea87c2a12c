//! `cadenza`: a gapless audio playback engine with a ten-band equalizer.
//!
//! ```no_run
//! use cadenza::{AudioPlayer, Settings};
//!
//! let settings = Settings::default();
//! let player = AudioPlayer::new(&settings)?;
//! player.set_playlist(vec!["a.flac".into(), "b.flac".into()], Some(0))?;
//! player.play()?;
//! # Ok::<(), cadenza::EngineError>(())
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod track;

pub use audio::{AudioPlayer, Equalizer, PlayMode, Preset, TransportState};
pub use config::Settings;
pub use error::{EngineError, Result};
pub use track::Track;
