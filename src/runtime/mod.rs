use std::io::{self, BufRead};
use std::path::PathBuf;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cadenza::AudioPlayer;

mod console;
mod settings;
mod startup;


fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,cadenza=info")),
        )
        .with_writer(io::stderr)
        .init();
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let settings = settings::load_settings();

    let tracks: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    if tracks.is_empty() {
        eprintln!("usage: cadenza FILE...");
        return Ok(());
    }

    let audio_player = AudioPlayer::new(&settings)?;
    startup::apply_equalizer_defaults(&audio_player, &settings);

    let events = audio_player.events();
    events.on_track_changed(|track| {
        println!("now playing: {} - {} ({})", track.artist, track.title, track.album);
    });
    events.on_error(|e| error!("{e}"));

    info!(count = tracks.len(), "starting playback");
    audio_player.set_playlist(tracks, Some(0))?;
    audio_player.play()?;

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let Some(cmd) = console::parse(&line) else {
            if !line.trim().is_empty() {
                println!("unknown command, try `help`");
            }
            continue;
        };
        match console::apply(&audio_player, cmd) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => warn!("{e}"),
        }
    }

    audio_player.shutdown();
    Ok(())
}
