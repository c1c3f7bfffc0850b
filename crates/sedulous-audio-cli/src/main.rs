//! Sedulous audio command-line player
//!
//! Plays a WAV file through a `SongPlayer` on the software mixer, with the
//! mixer streamed to the default output device. The player is driven at
//! roughly 60 Hz the way a game loop would drive it.

mod args;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use sedulous_audio::{
    AudioConfig, AudioOutput, AudioSubsystem, ClipData, PlaybackControl, PlayerEvent,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use args::CliArgs;

/// Interval between player updates.
const FRAME: Duration = Duration::from_micros(16_667);

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = CliArgs::parse();

    let config = match &args.config {
        Some(path) => AudioConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => AudioConfig::default(),
    };
    let audio = AudioSubsystem::software(config)?;
    let _output = AudioOutput::open(Arc::clone(audio.backend()))
        .context("failed to open audio output")?;

    let clip = ClipData::from_wav_file(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    info!(file = %args.file.display(), duration = ?clip.duration(), "loaded");
    let song = audio.load_song(clip)?;

    let mut player = audio.create_song_player();
    if !player.play(&song, args.play_params()?)? {
        anyhow::bail!("no free channel available");
    }
    if let Some(fade) = args.fade_in()? {
        player.slide_volume(args.volume, fade)?;
    }

    let limit = args.time_limit()?;
    let started = Instant::now();
    let mut last = started;
    loop {
        thread::sleep(FRAME);
        let now = Instant::now();
        player.update(now - last)?;
        audio.update()?;
        last = now;

        let mut finished = false;
        for event in player.drain_events() {
            info!(?event, "player event");
            finished |= event == PlayerEvent::SongEnded;
        }
        if finished {
            break;
        }
        if limit.is_some_and(|limit| now - started >= limit) {
            if !player.stop()? {
                warn!("player was already stopped");
            }
            break;
        }
    }

    info!(elapsed = ?started.elapsed(), "playback finished");
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}
