//! Channel playback for the Sedulous audio subsystem
//!
//! Song and sound effect players sit on top of a native audio engine and
//! turn its handle-based channel API into a small playback state machine:
//! play, pause, resume and stop; clamped volume, pitch and pan; linear
//! parameter slides driven from a per-frame `update`; whole-clip looping
//! and loop regions implemented with position syncs.
//!
//! # Features
//! - One generic state machine ([`ChannelPlayer`]) over the [`AudioBackend`] trait
//! - Native handles that go stale (device change, released source) stop the
//!   player instead of failing
//! - Sync callbacks hold only weak references to player state
//! - Master, song and sound effect volumes plus mute flags
//! - A pure Rust [`SoftwareMixer`] backend
//!
//! # Crate feature flags
//! - `wav` (default): WAV decoding through `hound` (`ClipData::from_wav_file`)
//! - `streaming` (opt-in): Real-time output of the software mixer (enables optional `rodio` dep)
//!
//! # Quick start
//! ```
//! use std::time::Duration;
//! use sedulous_audio::{
//!     AudioConfig, AudioSubsystem, ClipData, PlayParams, PlaybackControl, PlayerEvent,
//! };
//!
//! let audio = AudioSubsystem::software(AudioConfig::default()).unwrap();
//! let song = audio
//!     .load_song(ClipData::silence(Duration::from_secs(1), 44_100, 2).unwrap())
//!     .unwrap();
//!
//! let mut player = audio.create_song_player();
//! player
//!     .play(&song, PlayParams::default().loop_region(Duration::from_millis(250), None))
//!     .unwrap();
//! player.update(Duration::from_millis(16)).unwrap();
//!
//! for event in player.drain_events() {
//!     if let PlayerEvent::SongEnded = event {
//!         println!("done");
//!     }
//! }
//! ```
//!
//! ## Real-time streaming
//! ```no_run
//! # #[cfg(feature = "streaming")]
//! # {
//! use sedulous_audio::{AudioConfig, AudioOutput, AudioSubsystem};
//! let audio = AudioSubsystem::software(AudioConfig::default()).unwrap();
//! let _output = AudioOutput::open(audio.backend().clone()).unwrap();
//! // drive players from the game loop while the output pulls from the mixer
//! # }
//! ```

#![warn(missing_docs)]

pub mod backend; // Native engine capability interface
pub mod clip; // Decoded PCM data
pub mod config; // Startup configuration
mod error;
pub mod events; // Player notifications
pub mod handle; // Handle validation
pub mod looping; // Loop regions and sync callbacks
pub mod mixer; // Software mixer backend
pub mod player; // Playback state machine
pub mod resource; // Songs and sound effects
pub mod settings; // Shared output levels
pub mod slide; // Parameter slides
#[cfg(feature = "streaming")]
pub mod streaming; // Audio output
pub mod subsystem; // Subsystem facade

// Public API exports
pub use backend::{
    AudioBackend, ChannelActivity, ChannelAttribute, ChannelFlags, ChannelHandle, DeviceId,
    NativeError, NativeResult, SourceHandle, SyncContext, SyncHandle, SyncProc, SyncTrigger,
};
pub use clip::ClipData;
pub use config::AudioConfig;
pub use error::{AudioError, Result};
pub use events::PlayerEvent;
pub use mixer::SoftwareMixer;
pub use player::{
    ChannelPlayer, Looping, PlayParams, PlaybackControl, PlaybackState, SongPlayer,
    SoundEffectPlayer,
};
pub use resource::{AudioSource, Song, SoundEffect};
pub use settings::{OutputLevels, OutputSettings, SoundCategory};
pub use slide::SlideParameter;
#[cfg(feature = "streaming")]
pub use streaming::AudioOutput;
pub use subsystem::AudioSubsystem;
