use tracing::warn;

use cadenza::config;
use cadenza::AudioPlayer;

/// Apply the equalizer settings the engine does not take at construction.
pub fn apply_equalizer_defaults(audio_player: &AudioPlayer, settings: &config::Settings) {
    let eq = &settings.equalizer;

    // Explicit gains win over a named preset.
    if let Some(gains) = &eq.gains {
        if let Err(e) = audio_player.set_all_gains(gains) {
            warn!("ignoring equalizer gains: {e}");
        }
    } else if let Some(name) = &eq.preset
        && let Err(e) = audio_player.apply_preset_named(name)
    {
        warn!("ignoring equalizer preset: {e}");
    }
}
