//! Audio configuration
//!
//! [`AudioConfig`] describes how the audio subsystem starts up: mixer sample
//! rate, channel pool size, output device and the initial master/category
//! volumes. It is plain serde data so applications can keep it in a JSON
//! settings file.
//!
//! ```
//! use sedulous_audio::AudioConfig;
//!
//! let config = AudioConfig::from_json_str(r#"{ "master_volume": 0.5, "max_channels": 16 }"#)
//!     .unwrap();
//! assert_eq!(config.max_channels, 16);
//! assert_eq!(config.sample_rate, 44_100);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::backend::DeviceId;
use crate::{AudioError, Result};

/// Standard output sample rate (44.1 kHz CD quality).
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Default size of the channel pool.
pub const DEFAULT_MAX_CHANNELS: usize = 32;

/// Startup configuration of the audio subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Mixer output sample rate in Hz
    pub sample_rate: u32,
    /// Maximum number of simultaneously allocated channels
    pub max_channels: usize,
    /// Output device index; `None` selects the system default
    pub device: Option<u32>,
    /// Master volume applied to every channel (0.0..=1.0)
    pub master_volume: f32,
    /// Volume applied to songs (0.0..=1.0)
    pub song_volume: f32,
    /// Volume applied to sound effects (0.0..=1.0)
    pub sound_effect_volume: f32,
    /// Mute everything
    pub muted: bool,
    /// Mute songs
    pub songs_muted: bool,
    /// Mute sound effects
    pub sound_effects_muted: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            max_channels: DEFAULT_MAX_CHANNELS,
            device: None,
            master_volume: 1.0,
            song_volume: 1.0,
            sound_effect_volume: 1.0,
            muted: false,
            songs_muted: false,
            sound_effects_muted: false,
        }
    }
}

impl AudioConfig {
    /// Parse and validate a JSON configuration document.
    ///
    /// Missing fields take their default values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: AudioConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that every field holds a usable value.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(AudioError::config("sample_rate must be non-zero"));
        }
        if self.max_channels == 0 {
            return Err(AudioError::config("max_channels must be non-zero"));
        }
        if self.device == Some(0) {
            return Err(AudioError::config("device indices start at 1"));
        }
        for (name, volume) in [
            ("master_volume", self.master_volume),
            ("song_volume", self.song_volume),
            ("sound_effect_volume", self.sound_effect_volume),
        ] {
            if !(0.0..=1.0).contains(&volume) {
                return Err(AudioError::config(format!(
                    "{name} must lie in 0.0..=1.0, got {volume}"
                )));
            }
        }
        Ok(())
    }

    /// Output device selected by this configuration.
    pub fn device_id(&self) -> DeviceId {
        self.device.map(DeviceId).unwrap_or_default()
    }
}

impl AudioConfig {
    /// Set the mixer sample rate in Hz.
    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Set the size of the channel pool.
    pub fn max_channels(mut self, max_channels: usize) -> Self {
        self.max_channels = max_channels;
        self
    }

    /// Set the output device; `None` selects the system default.
    pub fn device(mut self, device: Option<u32>) -> Self {
        self.device = device;
        self
    }

    /// Set the master volume.
    pub fn master_volume(mut self, volume: f32) -> Self {
        self.master_volume = volume;
        self
    }

    /// Set the song volume.
    pub fn song_volume(mut self, volume: f32) -> Self {
        self.song_volume = volume;
        self
    }

    /// Set the sound effect volume.
    pub fn sound_effect_volume(mut self, volume: f32) -> Self {
        self.sound_effect_volume = volume;
        self
    }

    /// Mute all output.
    pub fn muted(mut self, muted: bool) -> Self {
        self.muted = muted;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_fields_use_defaults() {
        let config = AudioConfig::from_json_str("{}").unwrap();
        assert_eq!(config, AudioConfig::default());
        assert_eq!(config.device_id(), DeviceId::DEFAULT);
    }

    #[test]
    fn out_of_range_volume_is_rejected() {
        let err = AudioConfig::from_json_str(r#"{ "song_volume": 1.5 }"#).unwrap_err();
        assert!(matches!(err, AudioError::Config(_)));
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = AudioConfig::from_json_str("{ sample_rate: }").unwrap_err();
        assert!(matches!(err, AudioError::Json(_)));
    }

    #[test]
    fn loads_from_file() {
        let config = AudioConfig::default()
            .sample_rate(48_000)
            .max_channels(8)
            .device(Some(2));
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_json_string().unwrap().as_bytes())
            .unwrap();

        let loaded = AudioConfig::load(file.path()).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.device_id(), DeviceId(2));
    }
}
