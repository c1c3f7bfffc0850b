//! Audio subsystem facade
//!
//! [`AudioSubsystem`] ties a backend to the shared [`OutputSettings`]: it
//! hands out players and resources wired to both, adjusts output levels and
//! forwards device changes. Players pick up every change on their next
//! `update`.

use std::sync::Arc;

use tracing::{debug, info};

use crate::backend::{AudioBackend, DeviceId};
use crate::clip::ClipData;
use crate::config::AudioConfig;
use crate::mixer::SoftwareMixer;
use crate::player::{SongPlayer, SoundEffectPlayer};
use crate::resource::{Song, SoundEffect};
use crate::settings::{OutputLevels, OutputSettings};
use crate::Result;

/// Entry point of the audio library.
#[derive(Debug)]
pub struct AudioSubsystem<B: AudioBackend> {
    backend: Arc<B>,
    settings: Arc<OutputSettings>,
    config: AudioConfig,
}

impl<B: AudioBackend> AudioSubsystem<B> {
    /// Wrap a backend, validating `config` first.
    pub fn new(backend: Arc<B>, config: AudioConfig) -> Result<Self> {
        config.validate()?;
        let settings = OutputSettings::new(OutputLevels::from(&config));
        info!(backend = backend.name(), ?config, "audio subsystem started");
        Ok(Self {
            backend,
            settings,
            config,
        })
    }

    /// Backend in use.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Shared output settings.
    pub fn settings(&self) -> &Arc<OutputSettings> {
        &self.settings
    }

    /// Configuration the subsystem was started with.
    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// Create a stopped song player.
    pub fn create_song_player(&self) -> SongPlayer<B> {
        SongPlayer::new(Arc::clone(&self.backend), Arc::clone(&self.settings))
    }

    /// Create a stopped sound effect player.
    pub fn create_sound_effect_player(&self) -> SoundEffectPlayer<B> {
        SoundEffectPlayer::new(Arc::clone(&self.backend), Arc::clone(&self.settings))
    }

    /// Load decoded clip data as a song.
    pub fn load_song(&self, clip: ClipData) -> Result<Song<B>> {
        Song::from_clip(Arc::clone(&self.backend), clip)
    }

    /// Load decoded clip data as a sound effect whose one-shot plays follow
    /// the sound effect volume.
    pub fn load_sound_effect(&self, clip: ClipData) -> Result<SoundEffect<B>> {
        Ok(SoundEffect::from_clip(Arc::clone(&self.backend), clip)?
            .with_settings(Arc::clone(&self.settings)))
    }

    /// Current output levels.
    pub fn levels(&self) -> OutputLevels {
        self.settings.levels()
    }

    /// Set the master volume (clamped to 0.0..=1.0).
    pub fn set_master_volume(&self, volume: f32) {
        self.settings.modify(|levels| levels.master_volume = volume);
    }

    /// Set the song volume (clamped to 0.0..=1.0).
    pub fn set_song_volume(&self, volume: f32) {
        self.settings.modify(|levels| levels.song_volume = volume);
    }

    /// Set the sound effect volume (clamped to 0.0..=1.0).
    pub fn set_sound_effect_volume(&self, volume: f32) {
        self.settings.modify(|levels| levels.sound_effect_volume = volume);
    }

    /// Mute or unmute everything.
    pub fn set_muted(&self, muted: bool) {
        self.settings.modify(|levels| levels.muted = muted);
    }

    /// Mute or unmute songs.
    pub fn set_songs_muted(&self, muted: bool) {
        self.settings.modify(|levels| levels.songs_muted = muted);
    }

    /// Mute or unmute sound effects.
    pub fn set_sound_effects_muted(&self, muted: bool) {
        self.settings.modify(|levels| levels.sound_effects_muted = muted);
    }

    /// Switch the output device; players rebind on their next update.
    pub fn change_device(&self, device: DeviceId) {
        debug!(?device, "output device change requested");
        self.settings.modify(|levels| levels.device = device);
    }

    /// Per-frame backend housekeeping.
    pub fn update(&self) -> Result<()> {
        self.backend.update()?;
        Ok(())
    }
}

impl AudioSubsystem<SoftwareMixer> {
    /// Start a subsystem on the bundled software mixer.
    pub fn software(config: AudioConfig) -> Result<Self> {
        config.validate()?;
        let mixer = Arc::new(SoftwareMixer::from_config(&config));
        Self::new(mixer, config)
    }

    /// Switch the output device of the mixer and rebind players to it.
    pub fn change_mixer_device(&self, device: DeviceId) {
        self.backend.change_device(device);
        self.change_device(device);
    }
}
