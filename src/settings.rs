//! Output settings shared by the subsystem and its players
//!
//! Master and per-category volumes, mute flags and the active output device
//! live behind one lock. Every change bumps a revision counter; players
//! compare it against the revision they last applied and re-apply their
//! gain (or rebind to the new device) on their next update.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::backend::DeviceId;
use crate::config::AudioConfig;

/// Category a channel's volume is mixed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundCategory {
    /// Streamed music
    Song,
    /// Short sample-based effects
    SoundEffect,
}

/// Snapshot of the output levels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputLevels {
    /// Master volume (0.0..=1.0)
    pub master_volume: f32,
    /// Song volume (0.0..=1.0)
    pub song_volume: f32,
    /// Sound effect volume (0.0..=1.0)
    pub sound_effect_volume: f32,
    /// Everything muted
    pub muted: bool,
    /// Songs muted
    pub songs_muted: bool,
    /// Sound effects muted
    pub sound_effects_muted: bool,
    /// Active output device
    pub device: DeviceId,
}

impl OutputLevels {
    /// Gain applied on top of a channel's own volume.
    pub fn gain(&self, category: SoundCategory) -> f32 {
        if self.muted {
            return 0.0;
        }
        let (volume, muted) = match category {
            SoundCategory::Song => (self.song_volume, self.songs_muted),
            SoundCategory::SoundEffect => (self.sound_effect_volume, self.sound_effects_muted),
        };
        if muted {
            0.0
        } else {
            self.master_volume * volume
        }
    }
}

impl Default for OutputLevels {
    fn default() -> Self {
        Self::from(&AudioConfig::default())
    }
}

impl From<&AudioConfig> for OutputLevels {
    fn from(config: &AudioConfig) -> Self {
        Self {
            master_volume: config.master_volume.clamp(0.0, 1.0),
            song_volume: config.song_volume.clamp(0.0, 1.0),
            sound_effect_volume: config.sound_effect_volume.clamp(0.0, 1.0),
            muted: config.muted,
            songs_muted: config.songs_muted,
            sound_effects_muted: config.sound_effects_muted,
            device: config.device_id(),
        }
    }
}

/// Versioned, shareable output levels.
#[derive(Debug, Default)]
pub struct OutputSettings {
    levels: RwLock<OutputLevels>,
    revision: AtomicU64,
}

impl OutputSettings {
    /// Shared settings starting from `levels`.
    pub fn new(levels: OutputLevels) -> Arc<Self> {
        Arc::new(Self {
            levels: RwLock::new(levels),
            revision: AtomicU64::new(0),
        })
    }

    /// Current levels.
    pub fn levels(&self) -> OutputLevels {
        *self.levels.read()
    }

    /// Revision of the current levels; changes on every modification.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// Modify the levels and publish a new revision.
    pub fn modify(&self, change: impl FnOnce(&mut OutputLevels)) {
        let mut levels = self.levels.write();
        change(&mut levels);
        levels.master_volume = levels.master_volume.clamp(0.0, 1.0);
        levels.song_volume = levels.song_volume.clamp(0.0, 1.0);
        levels.sound_effect_volume = levels.sound_effect_volume.clamp(0.0, 1.0);
        self.revision.fetch_add(1, Ordering::AcqRel);
    }

    /// Gain for a category under the current levels.
    pub fn gain(&self, category: SoundCategory) -> f32 {
        self.levels.read().gain(category)
    }

    /// Active output device.
    pub fn device(&self) -> DeviceId {
        self.levels.read().device
    }
}
