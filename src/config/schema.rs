use serde::Deserialize;

/// Top-level engine settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/cadenza/config.toml` or `~/.config/cadenza/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `CADENZA__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub playback: PlaybackSettings,
    pub equalizer: EqualizerSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Decode the next playlist entry ahead of time so transitions are silent.
    pub gapless: bool,
    /// Initial play mode.
    pub play_mode: PlayModeSetting,
    /// Initial output volume in `[0, 1]`.
    pub volume: f32,
    /// Safety margin kept between a start offset and the end of the buffer (milliseconds).
    pub seek_epsilon_ms: u64,
    /// Delay between a fresh load and the preload of the next entry (milliseconds).
    pub preload_delay_ms: u64,
    /// Delay between an advance and the preload of the following entry (milliseconds).
    pub advance_preload_delay_ms: u64,
    /// How often position updates are emitted while playing (milliseconds).
    pub position_interval_ms: u64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            gapless: true,
            play_mode: PlayModeSetting::Sequential,
            volume: 0.7,
            seek_epsilon_ms: 100,
            preload_delay_ms: 2000,
            advance_preload_delay_ms: 1000,
            position_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlayModeSetting {
    #[serde(alias = "sequence", alias = "in-order", alias = "in_order")]
    Sequential,
    #[serde(alias = "random")]
    Shuffle,
    #[serde(
        alias = "repeat_one",
        alias = "repeatone",
        alias = "loop-one",
        alias = "loop_one"
    )]
    RepeatOne,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EqualizerSettings {
    /// Route audio through the filter chain on startup.
    pub enabled: bool,
    /// Preset applied on startup, e.g. `"rock"`.
    pub preset: Option<String>,
    /// Explicit per-band gains in dB (ten values). Wins over `preset`.
    pub gains: Option<Vec<f32>>,
}
