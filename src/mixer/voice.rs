//! One playing channel inside the software mixer

use std::sync::Arc;
use std::time::Duration;

use crate::backend::{
    ChannelActivity, ChannelAttribute, ChannelHandle, DeviceId, NativeError, NativeResult,
    SourceHandle, SyncContext, SyncHandle, SyncProc, SyncTrigger,
};
use crate::clip::ClipData;

pub(crate) struct SyncEntry {
    pub handle: SyncHandle,
    pub trigger: SyncTrigger,
    pub callback: SyncProc,
}

pub(crate) struct Voice {
    pub source: SourceHandle,
    samples: Arc<[f32]>,
    channels: usize,
    sample_rate: u32,
    frames: usize,
    /// Fractional read position in source frames
    position: f64,
    pub activity: ChannelActivity,
    volume: f32,
    pitch: f32,
    pan: f32,
    pub looping: bool,
    pub auto_free: bool,
    /// Reached its end at least once
    pub finished: bool,
    pub device: DeviceId,
    pub syncs: Vec<SyncEntry>,
}

impl Voice {
    pub fn new(source: SourceHandle, clip: &ClipData, device: DeviceId) -> Self {
        Self {
            source,
            samples: clip.shared_samples(),
            channels: clip.channels() as usize,
            sample_rate: clip.sample_rate(),
            frames: clip.frame_count(),
            position: 0.0,
            activity: ChannelActivity::Stopped,
            volume: 1.0,
            pitch: 0.0,
            pan: 0.0,
            looping: false,
            auto_free: false,
            finished: false,
            device,
            syncs: Vec::new(),
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames as u64
    }

    pub fn position(&self) -> u64 {
        self.position as u64
    }

    pub fn seek(&mut self, position: u64) -> NativeResult<()> {
        if position > self.frames() {
            return Err(NativeError::InvalidPosition);
        }
        self.position = position as f64;
        self.finished = false;
        Ok(())
    }

    pub fn rewind(&mut self) {
        self.position = 0.0;
        self.finished = false;
    }

    pub fn time_to_position(&self, time: Duration) -> u64 {
        (time.as_secs_f64() * self.sample_rate as f64).round() as u64
    }

    pub fn position_to_time(&self, position: u64) -> Duration {
        Duration::from_secs_f64(position as f64 / self.sample_rate as f64)
    }

    pub fn attribute(&self, attribute: ChannelAttribute) -> f32 {
        match attribute {
            ChannelAttribute::Volume => self.volume,
            ChannelAttribute::Pitch => self.pitch,
            ChannelAttribute::Pan => self.pan,
        }
    }

    pub fn set_attribute(&mut self, attribute: ChannelAttribute, value: f32) {
        let value = attribute.clamp(value);
        match attribute {
            ChannelAttribute::Volume => self.volume = value,
            ChannelAttribute::Pitch => self.pitch = value,
            ChannelAttribute::Pan => self.pan = value,
        }
    }

    /// Source frames consumed per output frame.
    fn step(&self, output_rate: u32) -> f64 {
        self.sample_rate as f64 / output_rate as f64 * 2f64.powf(self.pitch as f64)
    }

    fn gains(&self) -> (f32, f32) {
        let left = (1.0 - self.pan).min(1.0);
        let right = (1.0 + self.pan).min(1.0);
        (self.volume * left, self.volume * right)
    }

    fn frame_at(&self, frame: usize) -> (f32, f32) {
        let base = frame * self.channels;
        match self.channels {
            1 => (self.samples[base], self.samples[base]),
            _ => (self.samples[base], self.samples[base + 1]),
        }
    }

    /// Mix up to `frames` output frames into `out` (interleaved stereo).
    ///
    /// An empty `out` advances the voice without producing audio.
    pub fn render(
        &mut self,
        handle: ChannelHandle,
        out: &mut [f32],
        frames: usize,
        output_rate: u32,
    ) {
        let step = self.step(output_rate);
        let (left_gain, right_gain) = self.gains();
        let write = out.len() >= frames * 2;

        for frame in 0..frames {
            if self.activity != ChannelActivity::Playing {
                break;
            }
            if self.position >= self.frames as f64 {
                if self.looping && self.frames > 0 {
                    self.position %= self.frames as f64;
                } else {
                    self.finish(handle);
                    break;
                }
            }

            if write {
                let (left, right) = self.frame_at(self.position as usize);
                out[frame * 2] += left * left_gain;
                out[frame * 2 + 1] += right * right_gain;
            }

            let previous = self.position;
            self.position += step;
            self.fire_position_syncs(handle, previous);
        }
    }

    fn fire_position_syncs(&mut self, handle: ChannelHandle, previous: f64) {
        for index in 0..self.syncs.len() {
            let SyncTrigger::Position(target) = self.syncs[index].trigger else {
                continue;
            };
            let target = target as f64;
            if previous < target && self.position >= target {
                let callback = Arc::clone(&self.syncs[index].callback);
                callback(&mut VoiceContext {
                    handle,
                    voice: self,
                });
            }
        }
    }

    fn finish(&mut self, handle: ChannelHandle) {
        self.activity = ChannelActivity::Stopped;
        self.position = self.frames as f64;
        self.finished = true;
        for index in 0..self.syncs.len() {
            if self.syncs[index].trigger == SyncTrigger::End {
                let callback = Arc::clone(&self.syncs[index].callback);
                callback(&mut VoiceContext {
                    handle,
                    voice: self,
                });
            }
        }
    }
}

/// Sync callback view of a voice, handed out while the mixer is locked.
struct VoiceContext<'a> {
    handle: ChannelHandle,
    voice: &'a mut Voice,
}

impl SyncContext for VoiceContext<'_> {
    fn channel(&self) -> ChannelHandle {
        self.handle
    }

    fn position(&self) -> u64 {
        self.voice.position()
    }

    fn set_position(&mut self, position: u64) -> NativeResult<()> {
        self.voice.seek(position)
    }
}
