//! Software mixer backend
//!
//! A pure Rust implementation of [`AudioBackend`] that behaves the way the
//! native engines do where the players care:
//!
//! - sources and channels live in generation-checked handle tables, so a
//!   freed or lost channel reports [`NativeError::InvalidHandle`];
//! - the channel pool has a fixed size and reports exhaustion as `Ok(None)`;
//! - position and end syncs fire from inside [`SoftwareMixer::render`], i.e.
//!   on whatever thread drives the output (see the `streaming` feature);
//! - [`SoftwareMixer::lose_device`] drops every channel, as a native engine
//!   does when its output device disappears.
//!
//! Native positions are source PCM frames.
//!
//! # Example
//!
//! ```
//! use sedulous_audio::{AudioBackend, ChannelFlags, ClipData, SoftwareMixer};
//! use std::time::Duration;
//!
//! let mixer = SoftwareMixer::new(44_100, 32);
//! let clip = ClipData::silence(Duration::from_secs(1), 44_100, 2).unwrap();
//! let source = mixer.create_source(clip).unwrap();
//! let channel = mixer.allocate_channel(source, ChannelFlags::empty()).unwrap().unwrap();
//! mixer.play(channel, true).unwrap();
//!
//! let mut buffer = vec![0.0; 1024];
//! mixer.render(&mut buffer);
//! ```

mod table;
mod voice;

use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::backend::{
    AudioBackend, ChannelActivity, ChannelAttribute, ChannelFlags, ChannelHandle, DeviceId,
    NativeError, NativeResult, SourceHandle, SyncHandle, SyncProc, SyncTrigger, ERROR_MEMORY,
};
use crate::clip::ClipData;
use crate::config::AudioConfig;

use table::HandleTable;
use voice::{SyncEntry, Voice};

pub use table::MAX_ENTRIES;

/// Native code reported when pausing a channel that is not playing.
const ERROR_NOT_PLAYING: i32 = 24;

/// Output channel count of the mixer (interleaved stereo).
pub const OUTPUT_CHANNELS: u16 = 2;

struct MixerState {
    sources: HandleTable<ClipData>,
    channels: HandleTable<Voice>,
    next_sync: u32,
    device: DeviceId,
}

impl MixerState {
    fn voice(&self, channel: ChannelHandle) -> NativeResult<&Voice> {
        self.channels
            .get(channel.into())
            .ok_or(NativeError::InvalidHandle)
    }

    fn voice_mut(&mut self, channel: ChannelHandle) -> NativeResult<&mut Voice> {
        self.channels
            .get_mut(channel.into())
            .ok_or(NativeError::InvalidHandle)
    }

    fn next_sync_handle(&mut self) -> SyncHandle {
        loop {
            self.next_sync = self.next_sync.wrapping_add(1);
            if let Some(handle) = SyncHandle::from_raw(self.next_sync) {
                return handle;
            }
        }
    }
}

/// Pure software implementation of [`AudioBackend`].
pub struct SoftwareMixer {
    sample_rate: u32,
    state: Mutex<MixerState>,
}

impl SoftwareMixer {
    /// Create a mixer producing `sample_rate` Hz stereo with at most
    /// `max_channels` simultaneous channels.
    pub fn new(sample_rate: u32, max_channels: usize) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            state: Mutex::new(MixerState {
                sources: HandleTable::with_capacity(MAX_ENTRIES),
                channels: HandleTable::with_capacity(max_channels),
                next_sync: 0,
                device: DeviceId::DEFAULT,
            }),
        }
    }

    /// Create a mixer from an audio configuration.
    pub fn from_config(config: &AudioConfig) -> Self {
        let mixer = Self::new(config.sample_rate, config.max_channels);
        mixer.state.lock().device = config.device_id();
        mixer
    }

    /// Output sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of allocated channels.
    pub fn channel_count(&self) -> usize {
        self.state.lock().channels.len()
    }

    /// Number of loaded sources.
    pub fn source_count(&self) -> usize {
        self.state.lock().sources.len()
    }

    /// Current output device.
    pub fn device(&self) -> DeviceId {
        self.state.lock().device
    }

    /// Device a channel is bound to.
    pub fn channel_device(&self, channel: ChannelHandle) -> NativeResult<DeviceId> {
        Ok(self.state.lock().voice(channel)?.device)
    }

    /// Switch the output device. Existing channels keep playing until they
    /// are rebound.
    pub fn change_device(&self, device: DeviceId) {
        debug!(?device, "software mixer output device changed");
        self.state.lock().device = device;
    }

    /// Simulate losing the output device: every channel handle becomes
    /// invalid.
    pub fn lose_device(&self) {
        let mut state = self.state.lock();
        debug!(
            channels = state.channels.len(),
            "software mixer lost its output device"
        );
        state.channels.clear();
    }

    /// Mix every playing channel into `out` (interleaved stereo).
    ///
    /// `out` is overwritten. Sync callbacks fire from inside this call.
    pub fn render(&self, out: &mut [f32]) {
        out.fill(0.0);
        let frames = out.len() / OUTPUT_CHANNELS as usize;
        self.mix(out, frames);
        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }

    /// Advance every playing channel by `elapsed` without producing audio.
    pub fn advance(&self, elapsed: Duration) {
        let frames = (elapsed.as_secs_f64() * self.sample_rate as f64).round() as usize;
        self.mix(&mut [], frames);
    }

    fn mix(&self, out: &mut [f32], frames: usize) {
        let mut state = self.state.lock();
        for (raw, voice) in state.channels.iter_mut() {
            voice.render(ChannelHandle::new(raw), out, frames, self.sample_rate);
        }
        state
            .channels
            .retain(|_, voice| !(voice.auto_free && voice.finished));
    }
}

impl std::fmt::Debug for SoftwareMixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SoftwareMixer")
            .field("sample_rate", &self.sample_rate)
            .field("sources", &state.sources.len())
            .field("channels", &state.channels.len())
            .field("device", &state.device)
            .finish()
    }
}

impl Default for SoftwareMixer {
    fn default() -> Self {
        Self::from_config(&AudioConfig::default())
    }
}

impl AudioBackend for SoftwareMixer {
    fn name(&self) -> &str {
        "software"
    }

    fn create_source(&self, clip: ClipData) -> NativeResult<SourceHandle> {
        self.state
            .lock()
            .sources
            .insert(clip)
            .map(SourceHandle::new)
            .ok_or(NativeError::Code(ERROR_MEMORY))
    }

    fn release_source(&self, source: SourceHandle) -> NativeResult<()> {
        let mut state = self.state.lock();
        state
            .sources
            .remove(source.into())
            .ok_or(NativeError::InvalidHandle)?;
        state.channels.retain(|_, voice| voice.source != source);
        Ok(())
    }

    fn source_duration(&self, source: SourceHandle) -> NativeResult<Duration> {
        self.state
            .lock()
            .sources
            .get(source.into())
            .map(ClipData::duration)
            .ok_or(NativeError::InvalidHandle)
    }

    fn allocate_channel(
        &self,
        source: SourceHandle,
        flags: ChannelFlags,
    ) -> NativeResult<Option<ChannelHandle>> {
        // Streams and samples are both decoded up front, so STREAM needs no
        // special handling here.
        let mut state = self.state.lock();
        let clip = state
            .sources
            .get(source.into())
            .ok_or(NativeError::InvalidHandle)?;
        let mut voice = Voice::new(source, clip, state.device);
        voice.looping = flags.contains(ChannelFlags::LOOP);
        voice.auto_free = flags.contains(ChannelFlags::AUTO_FREE);
        Ok(state.channels.insert(voice).map(ChannelHandle::new))
    }

    fn free_channel(&self, channel: ChannelHandle) -> NativeResult<()> {
        self.state
            .lock()
            .channels
            .remove(channel.into())
            .map(drop)
            .ok_or(NativeError::InvalidHandle)
    }

    fn play(&self, channel: ChannelHandle, restart: bool) -> NativeResult<()> {
        let mut state = self.state.lock();
        let voice = state.voice_mut(channel)?;
        if restart || voice.finished {
            voice.rewind();
        }
        voice.activity = ChannelActivity::Playing;
        Ok(())
    }

    fn pause(&self, channel: ChannelHandle) -> NativeResult<()> {
        let mut state = self.state.lock();
        let voice = state.voice_mut(channel)?;
        match voice.activity {
            ChannelActivity::Playing | ChannelActivity::Stalled => {
                voice.activity = ChannelActivity::Paused;
                Ok(())
            }
            ChannelActivity::Paused => Ok(()),
            ChannelActivity::Stopped => Err(NativeError::Code(ERROR_NOT_PLAYING)),
        }
    }

    fn activity(&self, channel: ChannelHandle) -> NativeResult<ChannelActivity> {
        Ok(self.state.lock().voice(channel)?.activity)
    }

    fn set_attribute(
        &self,
        channel: ChannelHandle,
        attribute: ChannelAttribute,
        value: f32,
    ) -> NativeResult<()> {
        self.state
            .lock()
            .voice_mut(channel)?
            .set_attribute(attribute, value);
        Ok(())
    }

    fn attribute(&self, channel: ChannelHandle, attribute: ChannelAttribute) -> NativeResult<f32> {
        Ok(self.state.lock().voice(channel)?.attribute(attribute))
    }

    fn position(&self, channel: ChannelHandle) -> NativeResult<u64> {
        Ok(self.state.lock().voice(channel)?.position())
    }

    fn set_position(&self, channel: ChannelHandle, position: u64) -> NativeResult<()> {
        self.state.lock().voice_mut(channel)?.seek(position)
    }

    fn length(&self, channel: ChannelHandle) -> NativeResult<u64> {
        Ok(self.state.lock().voice(channel)?.frames())
    }

    fn time_to_position(&self, channel: ChannelHandle, time: Duration) -> NativeResult<u64> {
        Ok(self.state.lock().voice(channel)?.time_to_position(time))
    }

    fn position_to_time(&self, channel: ChannelHandle, position: u64) -> NativeResult<Duration> {
        Ok(self.state.lock().voice(channel)?.position_to_time(position))
    }

    fn set_looping(&self, channel: ChannelHandle, looping: bool) -> NativeResult<()> {
        self.state.lock().voice_mut(channel)?.looping = looping;
        Ok(())
    }

    fn is_looping(&self, channel: ChannelHandle) -> NativeResult<bool> {
        Ok(self.state.lock().voice(channel)?.looping)
    }

    fn register_sync(
        &self,
        channel: ChannelHandle,
        trigger: SyncTrigger,
        callback: SyncProc,
    ) -> NativeResult<SyncHandle> {
        let mut state = self.state.lock();
        state.voice(channel)?;
        let handle = state.next_sync_handle();
        state.voice_mut(channel)?.syncs.push(SyncEntry {
            handle,
            trigger,
            callback,
        });
        Ok(handle)
    }

    fn remove_sync(&self, channel: ChannelHandle, sync: SyncHandle) -> NativeResult<()> {
        let mut state = self.state.lock();
        state
            .voice_mut(channel)?
            .syncs
            .retain(|entry| entry.handle != sync);
        Ok(())
    }

    fn rebind_channel(&self, channel: ChannelHandle, device: DeviceId) -> NativeResult<()> {
        self.state.lock().voice_mut(channel)?.device = device;
        Ok(())
    }
}
