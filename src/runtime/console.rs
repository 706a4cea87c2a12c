//! Line commands read from stdin while the player runs.

use std::path::PathBuf;

use cadenza::{AudioPlayer, PlayMode, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    TogglePause,
    Stop,
    Next,
    Previous,
    Seek(f64),
    Volume(f32),
    Rate(f64),
    Equalizer(bool),
    Preset(String),
    Band(usize, f32),
    Mode(Option<PlayMode>),
    Gapless(bool),
    Load(PathBuf),
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  p | pause            toggle pause
  s | stop             stop and rewind
  n | next             next track
  b | prev             previous track
  seek <secs>          jump to a position
  v <0..1>             volume
  rate <0.25..4>       playback speed
  eq on|off            equalizer bypass
  preset <name>        equalizer preset
  band <i> <db>        set one equalizer band
  mode [seq|shuffle|one]  set or cycle the play mode
  gapless on|off       gapless preloading
  load <file>          load a file without playing it
  status               show what is playing
  q | quit             exit";

fn on_off(word: Option<&str>) -> Option<bool> {
    match word? {
        "on" | "true" | "1" => Some(true),
        "off" | "false" | "0" => Some(false),
        _ => None,
    }
}

/// Parse one input line. `None` for blank or unrecognised input.
pub fn parse(line: &str) -> Option<Command> {
    let mut words = line.split_whitespace();
    let head = words.next()?.to_ascii_lowercase();
    let arg = words.next();

    let cmd = match head.as_str() {
        "p" | "pause" | "play" => Command::TogglePause,
        "s" | "stop" => Command::Stop,
        "n" | "next" => Command::Next,
        "b" | "prev" | "previous" => Command::Previous,
        "seek" => Command::Seek(arg?.parse().ok()?),
        "v" | "vol" | "volume" => Command::Volume(arg?.parse().ok()?),
        "rate" | "speed" => Command::Rate(arg?.parse().ok()?),
        "eq" => Command::Equalizer(on_off(arg)?),
        "preset" => Command::Preset(arg?.to_string()),
        "band" => Command::Band(arg?.parse().ok()?, words.next()?.parse().ok()?),
        "mode" => Command::Mode(match arg {
            None => None,
            Some("seq" | "sequential") => Some(PlayMode::Sequential),
            Some("shuffle" | "random") => Some(PlayMode::Shuffle),
            Some("one" | "repeat-one") => Some(PlayMode::RepeatOne),
            Some(_) => return None,
        }),
        "gapless" => Command::Gapless(on_off(arg)?),
        "load" => {
            let rest = line.trim_start()[head.len()..].trim();
            if rest.is_empty() {
                return None;
            }
            Command::Load(PathBuf::from(rest))
        }
        "status" => Command::Status,
        "h" | "help" | "?" => Command::Help,
        "q" | "quit" | "exit" => Command::Quit,
        _ => return None,
    };
    Some(cmd)
}

/// Run `cmd` against the player. Returns false when the user asked to quit.
pub fn apply(player: &AudioPlayer, cmd: Command) -> Result<bool> {
    match cmd {
        Command::TogglePause => player.toggle_pause()?,
        Command::Stop => player.stop()?,
        Command::Next => player.next_track()?,
        Command::Previous => player.previous_track()?,
        Command::Seek(t) => player.seek(t)?,
        Command::Volume(v) => player.set_volume(v)?,
        Command::Rate(r) => player.set_playback_rate(r)?,
        Command::Equalizer(on) => player.set_equalizer_enabled(on)?,
        Command::Preset(name) => player.apply_preset_named(&name)?,
        Command::Band(i, db) => player.set_band_gain(i, db)?,
        Command::Mode(Some(mode)) => player.set_play_mode(mode)?,
        Command::Mode(None) => player.toggle_play_mode()?,
        Command::Gapless(on) => player.set_gapless_playback(on)?,
        Command::Load(path) => player.load_track(path)?,
        Command::Status => println!("{}", status_line(player)),
        Command::Help => println!("{HELP}"),
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

fn clock(seconds: f64) -> String {
    let s = seconds.max(0.0) as u64;
    format!("{}:{:02}", s / 60, s % 60)
}

pub fn status_line(player: &AudioPlayer) -> String {
    let info = player.snapshot();
    let title = info
        .track
        .as_ref()
        .map(|t| format!("{} - {}", t.artist, t.title))
        .unwrap_or_else(|| "nothing loaded".to_string());
    format!(
        "[{:?}] {} {}/{} vol {:.0}% x{:.2} mode {:?} eq {} gapless {}",
        info.state,
        title,
        clock(player.position()),
        clock(info.duration),
        info.volume * 100.0,
        info.rate,
        info.play_mode,
        if info.equalizer_enabled { "on" } else { "off" },
        if info.gapless { "on" } else { "off" },
    )
}
