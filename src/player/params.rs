use std::time::Duration;

use crate::looping::{validate_region, LoopPlan};
use crate::Result;

/// Looping requested for a `play` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Looping {
    /// Play once
    #[default]
    Off,
    /// Loop the whole clip
    Whole,
    /// Loop from `start` for `length` (to the clip end when `None`)
    Region {
        /// Loop start offset
        start: Duration,
        /// Loop length
        length: Option<Duration>,
    },
}

/// Parameters of a `play` call.
///
/// Values are clamped when playback starts: volume to 0.0..=1.0, pitch and
/// pan to -1.0..=1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayParams {
    /// Initial volume
    pub volume: f32,
    /// Initial pitch shift in octaves
    pub pitch: f32,
    /// Initial pan
    pub pan: f32,
    /// Loop mode
    pub looping: Looping,
}

impl Default for PlayParams {
    fn default() -> Self {
        Self {
            volume: 1.0,
            pitch: 0.0,
            pan: 0.0,
            looping: Looping::Off,
        }
    }
}

impl PlayParams {
    /// Set the initial volume.
    pub fn volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    /// Set the initial pitch.
    pub fn pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch;
        self
    }

    /// Set the initial pan.
    pub fn pan(mut self, pan: f32) -> Self {
        self.pan = pan;
        self
    }

    /// Loop the whole clip, or play once.
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = if looping { Looping::Whole } else { Looping::Off };
        self
    }

    /// Loop a region of the clip.
    pub fn loop_region(mut self, start: Duration, length: Option<Duration>) -> Self {
        self.looping = Looping::Region { start, length };
        self
    }

    /// Reject argument combinations that are illegal regardless of the clip.
    pub(crate) fn validate(&self) -> Result<()> {
        match self.looping {
            Looping::Region { start, length } => validate_region(start, length),
            _ => Ok(()),
        }
    }

    /// Resolve the loop mode against the clip duration.
    pub(crate) fn loop_plan(&self, clip_duration: Duration) -> Result<LoopPlan> {
        match self.looping {
            Looping::Off => Ok(LoopPlan::Once),
            Looping::Whole => Ok(LoopPlan::Auto),
            Looping::Region { start, length } => {
                LoopPlan::from_region(start, length, clip_duration)
            }
        }
    }
}
