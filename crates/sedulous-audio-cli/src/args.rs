//! Command-line arguments for `sedulous-play`.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use sedulous_audio::PlayParams;

/// Play a WAV file through the sedulous audio players.
#[derive(Debug, Parser)]
#[command(name = "sedulous-play", version, about)]
pub struct CliArgs {
    /// WAV file to play
    pub file: PathBuf,

    /// Initial volume (0.0..=1.0)
    #[arg(long, default_value_t = 1.0)]
    pub volume: f32,

    /// Pitch shift in octaves (-1.0..=1.0)
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub pitch: f32,

    /// Stereo pan (-1.0 left ..= 1.0 right)
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub pan: f32,

    /// Loop the whole file
    #[arg(long = "loop", conflicts_with = "loop_start")]
    pub looping: bool,

    /// Loop region start in seconds
    #[arg(long)]
    pub loop_start: Option<f64>,

    /// Loop region length in seconds (defaults to the rest of the file)
    #[arg(long, requires = "loop_start")]
    pub loop_length: Option<f64>,

    /// Fade in over this many seconds
    #[arg(long)]
    pub fade_in: Option<f64>,

    /// Stop after this many seconds (required to end looping playback)
    #[arg(long)]
    pub duration: Option<f64>,

    /// Optional JSON audio configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl CliArgs {
    /// Playback parameters described by the arguments.
    pub fn play_params(&self) -> anyhow::Result<PlayParams> {
        let mut params = PlayParams::default()
            .volume(if self.fade_in.is_some() { 0.0 } else { self.volume })
            .pitch(self.pitch)
            .pan(self.pan)
            .looping(self.looping);
        if let Some(start) = self.loop_start {
            let length = self.loop_length.map(seconds).transpose()?;
            params = params.loop_region(seconds(start)?, length);
        }
        Ok(params)
    }

    /// Fade-in duration, if any.
    pub fn fade_in(&self) -> anyhow::Result<Option<Duration>> {
        self.fade_in.map(seconds).transpose()
    }

    /// Playback time limit, if any.
    pub fn time_limit(&self) -> anyhow::Result<Option<Duration>> {
        self.duration.map(seconds).transpose()
    }
}

fn seconds(value: f64) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| anyhow::anyhow!("invalid time value {value}: expected non-negative seconds"))
}
