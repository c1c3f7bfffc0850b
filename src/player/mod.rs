//! Channel players
//!
//! [`ChannelPlayer`] is the playback state machine: it owns at most one
//! native channel, derives its state from the backend on every query and
//! drives slides, loop regions and output settings from `update`.
//! [`SongPlayer`] and [`SoundEffectPlayer`] wrap it for the two sound
//! categories and share the object-safe [`PlaybackControl`] interface.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use sedulous_audio::{
//!     AudioConfig, AudioSubsystem, ClipData, PlayParams, PlaybackControl, PlaybackState,
//! };
//!
//! let audio = AudioSubsystem::software(AudioConfig::default()).unwrap();
//! let song = audio
//!     .load_song(ClipData::silence(Duration::from_secs(2), 44_100, 2).unwrap())
//!     .unwrap();
//!
//! let mut player = audio.create_song_player();
//! assert!(player.play(&song, PlayParams::default().volume(0.8)).unwrap());
//! assert_eq!(player.state().unwrap(), PlaybackState::Playing);
//!
//! player.slide_volume(0.0, Duration::from_millis(500)).unwrap();
//! player.update(Duration::from_millis(250)).unwrap();
//! ```

/// Implements [`PlaybackControl`] for a wrapper around a `ChannelPlayer`.
macro_rules! delegate_playback_control {
    ($player:ident) => {
        impl<B: $crate::backend::AudioBackend> $crate::player::PlaybackControl for $player<B> {
            fn state(&self) -> $crate::Result<$crate::player::PlaybackState> {
                self.player.state()
            }
            fn stop(&mut self) -> $crate::Result<bool> {
                self.player.stop()
            }
            fn pause(&mut self) -> $crate::Result<bool> {
                self.player.pause()
            }
            fn resume(&mut self) -> $crate::Result<bool> {
                self.player.resume()
            }
            fn volume(&self) -> f32 {
                self.player.volume()
            }
            fn set_volume(&mut self, volume: f32) -> $crate::Result<()> {
                self.player.set_volume(volume)
            }
            fn pitch(&self) -> f32 {
                self.player.pitch()
            }
            fn set_pitch(&mut self, pitch: f32) -> $crate::Result<()> {
                self.player.set_pitch(pitch)
            }
            fn pan(&self) -> f32 {
                self.player.pan()
            }
            fn set_pan(&mut self, pan: f32) -> $crate::Result<()> {
                self.player.set_pan(pan)
            }
            fn position(&self) -> $crate::Result<std::time::Duration> {
                self.player.position()
            }
            fn set_position(&mut self, position: std::time::Duration) -> $crate::Result<()> {
                self.player.set_position(position)
            }
            fn duration(&self) -> std::time::Duration {
                self.player.duration()
            }
            fn is_looping(&self) -> $crate::Result<bool> {
                self.player.is_looping()
            }
            fn set_looping(&mut self, looping: bool) -> $crate::Result<()> {
                self.player.set_looping(looping)
            }
            fn slide_volume(
                &mut self,
                target: f32,
                duration: std::time::Duration,
            ) -> $crate::Result<()> {
                self.player.slide_volume(target, duration)
            }
            fn slide_pitch(
                &mut self,
                target: f32,
                duration: std::time::Duration,
            ) -> $crate::Result<()> {
                self.player.slide_pitch(target, duration)
            }
            fn slide_pan(
                &mut self,
                target: f32,
                duration: std::time::Duration,
            ) -> $crate::Result<()> {
                self.player.slide_pan(target, duration)
            }
            fn is_sliding(&self, parameter: $crate::slide::SlideParameter) -> bool {
                self.player.is_sliding(parameter)
            }
            fn update(&mut self, elapsed: std::time::Duration) -> $crate::Result<()> {
                self.player.update(elapsed)
            }
            fn poll_event(&mut self) -> Option<$crate::events::PlayerEvent> {
                self.player.poll_event()
            }
        }
    };
}

mod channel;
mod effect;
mod params;
mod song;

use std::time::Duration;

use crate::backend::ChannelActivity;
use crate::events::PlayerEvent;
use crate::slide::SlideParameter;
use crate::Result;

pub use channel::ChannelPlayer;
pub use effect::SoundEffectPlayer;
pub use params::{Looping, PlayParams};
pub use song::SongPlayer;

/// Playback state of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// No channel, or the channel reached its end or was invalidated.
    #[default]
    Stopped,
    /// Channel is playing (or stalled waiting for data).
    Playing,
    /// Channel is paused (can resume).
    Paused,
}

impl From<ChannelActivity> for PlaybackState {
    fn from(activity: ChannelActivity) -> Self {
        match activity {
            ChannelActivity::Stopped => PlaybackState::Stopped,
            ChannelActivity::Playing | ChannelActivity::Stalled => PlaybackState::Playing,
            ChannelActivity::Paused => PlaybackState::Paused,
        }
    }
}

/// Object-safe control surface shared by every player.
///
/// Starting playback is not part of the trait because each player takes
/// its own resource type.
///
/// ```
/// use sedulous_audio::{PlaybackControl, PlaybackState, Result};
///
/// fn toggle(player: &mut dyn PlaybackControl) -> Result<()> {
///     match player.state()? {
///         PlaybackState::Playing => { player.pause()?; }
///         PlaybackState::Paused => { player.resume()?; }
///         PlaybackState::Stopped => {}
///     }
///     Ok(())
/// }
/// ```
pub trait PlaybackControl {
    /// Current state, queried from the backend.
    fn state(&self) -> Result<PlaybackState>;

    /// Check if currently playing.
    fn is_playing(&self) -> Result<bool> {
        Ok(self.state()? == PlaybackState::Playing)
    }

    /// Stop and release the channel. Returns `false` if already stopped.
    fn stop(&mut self) -> Result<bool>;

    /// Pause a playing channel. Returns `false` unless it was playing.
    fn pause(&mut self) -> Result<bool>;

    /// Resume a paused channel. Returns `false` unless it was paused.
    fn resume(&mut self) -> Result<bool>;

    /// Channel volume (0.0..=1.0), before output gain.
    fn volume(&self) -> f32;

    /// Set the volume, cancelling any volume slide.
    fn set_volume(&mut self, volume: f32) -> Result<()>;

    /// Pitch shift in octaves (-1.0..=1.0).
    fn pitch(&self) -> f32;

    /// Set the pitch, cancelling any pitch slide.
    fn set_pitch(&mut self, pitch: f32) -> Result<()>;

    /// Stereo pan (-1.0..=1.0).
    fn pan(&self) -> f32;

    /// Set the pan, cancelling any pan slide.
    fn set_pan(&mut self, pan: f32) -> Result<()>;

    /// Playback position; zero when stopped.
    fn position(&self) -> Result<Duration>;

    /// Seek within `0..=duration`.
    fn set_position(&mut self, position: Duration) -> Result<()>;

    /// Duration of the playing source; zero when stopped.
    fn duration(&self) -> Duration;

    /// Whole-clip looping or an active loop region.
    fn is_looping(&self) -> Result<bool>;

    /// Enable or disable looping.
    fn set_looping(&mut self, looping: bool) -> Result<()>;

    /// Slide the volume to `target` over `duration`.
    fn slide_volume(&mut self, target: f32, duration: Duration) -> Result<()>;

    /// Slide the pitch to `target` over `duration`.
    fn slide_pitch(&mut self, target: f32, duration: Duration) -> Result<()>;

    /// Slide the pan to `target` over `duration`.
    fn slide_pan(&mut self, target: f32, duration: Duration) -> Result<()>;

    /// Check if a parameter is sliding.
    fn is_sliding(&self, parameter: SlideParameter) -> bool;

    /// Per-frame tick.
    fn update(&mut self, elapsed: Duration) -> Result<()>;

    /// Take the oldest queued event.
    fn poll_event(&mut self) -> Option<PlayerEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_activity_maps_to_state() {
        assert_eq!(
            PlaybackState::from(ChannelActivity::Stalled),
            PlaybackState::Playing
        );
        assert_eq!(
            PlaybackState::from(ChannelActivity::Paused),
            PlaybackState::Paused
        );
        assert_eq!(
            PlaybackState::from(ChannelActivity::Stopped),
            PlaybackState::Stopped
        );
    }
}
