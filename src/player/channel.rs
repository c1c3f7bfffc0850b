use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::backend::{
    AudioBackend, ChannelAttribute, ChannelFlags, ChannelHandle, DeviceId, NativeError,
    NativeResult, SyncTrigger,
};
use crate::events::PlayerEvent;
use crate::handle::{self, NativeResultExt};
use crate::looping::{end_sync, LoopController, LoopPlan, SyncShared};
use crate::resource::AudioSource;
use crate::settings::{OutputSettings, SoundCategory};
use crate::slide::{SlideEngine, SlideParameter};
use crate::{AudioError, Result};

use super::{PlayParams, PlaybackState};

/// Playback state machine over one native channel.
///
/// The player owns its channel exclusively. Its state is never cached: each
/// query asks the backend, and a handle the backend no longer accepts puts
/// the player back into [`PlaybackState::Stopped`] without an error.
pub struct ChannelPlayer<B: AudioBackend> {
    backend: Arc<B>,
    settings: Arc<OutputSettings>,
    category: SoundCategory,
    channel: Option<ChannelHandle>,
    duration: Duration,
    volume: f32,
    pitch: f32,
    pan: f32,
    slides: SlideEngine,
    looping: LoopController,
    shared: Arc<SyncShared>,
    settings_revision: u64,
    device: DeviceId,
    events: VecDeque<PlayerEvent>,
}

impl<B: AudioBackend> ChannelPlayer<B> {
    /// Create a stopped player mixing under `category`.
    pub fn new(backend: Arc<B>, settings: Arc<OutputSettings>, category: SoundCategory) -> Self {
        let settings_revision = settings.revision();
        let device = settings.device();
        Self {
            backend,
            settings,
            category,
            channel: None,
            duration: Duration::ZERO,
            volume: ChannelAttribute::Volume.default_value(),
            pitch: ChannelAttribute::Pitch.default_value(),
            pan: ChannelAttribute::Pan.default_value(),
            slides: SlideEngine::new(),
            looping: LoopController::new(),
            shared: SyncShared::new(),
            settings_revision,
            device,
            events: VecDeque::new(),
        }
    }

    /// Category this player mixes under.
    pub fn category(&self) -> SoundCategory {
        self.category
    }

    /// Backend driving this player.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Native channel currently held, if any.
    pub fn channel(&self) -> Option<ChannelHandle> {
        self.channel
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Start playing `source` on a fresh channel.
    ///
    /// Any channel already held is stopped first. Returns `Ok(false)` when
    /// the backend has no free channel.
    pub fn play(&mut self, source: &dyn AudioSource, params: PlayParams) -> Result<bool> {
        params.validate()?;
        let source_handle = source.source_handle().ok_or(AudioError::Disposed)?;
        let duration = source.duration();
        let plan = params.loop_plan(duration)?;

        self.stop()?;

        let flags = self.channel_flags();
        let Some(channel) = handle::allocate(&*self.backend, source_handle, flags)? else {
            debug!(category = ?self.category, "no free channel, playback skipped");
            return Ok(false);
        };

        self.channel = Some(channel);
        self.duration = duration;
        self.volume = ChannelAttribute::Volume.clamp(params.volume);
        self.pitch = ChannelAttribute::Pitch.clamp(params.pitch);
        self.pan = ChannelAttribute::Pan.clamp(params.pan);
        self.settings_revision = self.settings.revision();
        self.device = self.settings.device();

        match self.start(channel, plan) {
            Ok(()) => {}
            Err(AudioError::Backend {
                source: NativeError::InvalidHandle,
                ..
            }) => {
                debug!(?channel, "channel vanished while starting");
                self.channel = None;
                self.reset();
                return Ok(false);
            }
            Err(err) => {
                warn!(?channel, %err, "failed to start channel, releasing it");
                if let Err(release) = self.release() {
                    warn!(%release, "failed to release channel after start failure");
                }
                self.reset();
                return Err(err);
            }
        }

        debug!(?channel, ?plan, category = ?self.category, "playback started");
        self.events.push_back(PlayerEvent::StateChanged(PlaybackState::Playing));
        self.events.push_back(PlayerEvent::PlaybackStarted);
        Ok(true)
    }

    fn start(&mut self, channel: ChannelHandle, plan: LoopPlan) -> Result<()> {
        let backend = &*self.backend;
        let gain = self.settings.gain(self.category);
        backend.set_attribute(channel, ChannelAttribute::Volume, self.volume * gain)?;
        backend.set_attribute(channel, ChannelAttribute::Pitch, self.pitch)?;
        backend.set_attribute(channel, ChannelAttribute::Pan, self.pan)?;
        self.looping.configure(backend, channel, plan, &self.shared)?;
        backend.register_sync(
            channel,
            SyncTrigger::End,
            end_sync(Arc::downgrade(&self.shared)),
        )?;
        backend.play(channel, true)?;
        Ok(())
    }

    /// Stop playback and release the channel.
    ///
    /// Returns `false` when nothing was running. A channel that reached its
    /// end before the next `update` is still reported as stopped here. A loop
    /// seek failure not yet reported by `update` is logged and dropped along
    /// with the channel.
    pub fn stop(&mut self) -> Result<bool> {
        if self.channel.is_none() {
            return Ok(false);
        }
        if let Some(fault) = self.shared.take_fault() {
            warn!(%fault, "loop region seek failed before stop");
        }
        let ended = self.shared.take_ended();
        let running = self.refresh()? != PlaybackState::Stopped;
        if self.channel.is_none() {
            return Ok(false);
        }
        self.release()?;
        self.reset();
        if running || ended {
            debug!(category = ?self.category, "playback stopped");
            self.notify_stopped();
        }
        Ok(running)
    }

    /// Pause a playing channel.
    pub fn pause(&mut self) -> Result<bool> {
        if self.refresh()? != PlaybackState::Playing {
            return Ok(false);
        }
        let Some(channel) = self.channel else {
            return Ok(false);
        };
        let result = self.backend.pause(channel);
        if self.settle(result)?.is_none() {
            return Ok(false);
        }
        self.events.push_back(PlayerEvent::StateChanged(PlaybackState::Paused));
        Ok(true)
    }

    /// Resume a paused channel.
    pub fn resume(&mut self) -> Result<bool> {
        if self.refresh()? != PlaybackState::Paused {
            return Ok(false);
        }
        let Some(channel) = self.channel else {
            return Ok(false);
        };
        let result = self.backend.play(channel, false);
        if self.settle(result)?.is_none() {
            return Ok(false);
        }
        self.events.push_back(PlayerEvent::StateChanged(PlaybackState::Playing));
        Ok(true)
    }

    /// Current state, queried from the backend.
    pub fn state(&self) -> Result<PlaybackState> {
        let Some(channel) = self.channel else {
            return Ok(PlaybackState::Stopped);
        };
        Ok(self
            .backend
            .activity(channel)
            .checked()?
            .map_or(PlaybackState::Stopped, PlaybackState::from))
    }

    /// Check if currently playing.
    pub fn is_playing(&self) -> Result<bool> {
        Ok(self.state()? == PlaybackState::Playing)
    }

    // ========================================================================
    // Parameters
    // ========================================================================

    /// Channel volume, before output gain.
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Set the volume (clamped to 0.0..=1.0).
    pub fn set_volume(&mut self, volume: f32) -> Result<()> {
        self.set_parameter(SlideParameter::Volume, volume)
    }

    /// Pitch shift in octaves.
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Set the pitch (clamped to -1.0..=1.0).
    pub fn set_pitch(&mut self, pitch: f32) -> Result<()> {
        self.set_parameter(SlideParameter::Pitch, pitch)
    }

    /// Stereo pan.
    pub fn pan(&self) -> f32 {
        self.pan
    }

    /// Set the pan (clamped to -1.0..=1.0).
    pub fn set_pan(&mut self, pan: f32) -> Result<()> {
        self.set_parameter(SlideParameter::Pan, pan)
    }

    fn set_parameter(&mut self, parameter: SlideParameter, value: f32) -> Result<()> {
        let channel = self.require_channel("change channel parameters")?;
        let value = parameter.clamp(value);
        self.slides.cancel(parameter);
        self.apply_parameter(channel, parameter, value)?;
        Ok(())
    }

    /// Push a parameter to the channel and cache it.
    ///
    /// Returns `false` if the channel was invalidated instead.
    fn apply_parameter(
        &mut self,
        channel: ChannelHandle,
        parameter: SlideParameter,
        value: f32,
    ) -> Result<bool> {
        let native = match parameter {
            SlideParameter::Volume => value * self.settings.gain(self.category),
            SlideParameter::Pitch | SlideParameter::Pan => value,
        };
        let result = self
            .backend
            .set_attribute(channel, parameter.attribute(), native);
        if self.settle(result)?.is_none() {
            return Ok(false);
        }
        match parameter {
            SlideParameter::Volume => self.volume = value,
            SlideParameter::Pitch => self.pitch = value,
            SlideParameter::Pan => self.pan = value,
        }
        Ok(true)
    }

    fn parameter(&self, parameter: SlideParameter) -> f32 {
        match parameter {
            SlideParameter::Volume => self.volume,
            SlideParameter::Pitch => self.pitch,
            SlideParameter::Pan => self.pan,
        }
    }

    /// Playback position; zero when stopped.
    pub fn position(&self) -> Result<Duration> {
        let Some(channel) = self.channel else {
            return Ok(Duration::ZERO);
        };
        let Some(position) = self.backend.position(channel).checked()? else {
            return Ok(Duration::ZERO);
        };
        Ok(self
            .backend
            .position_to_time(channel, position)
            .checked()?
            .unwrap_or_default())
    }

    /// Seek to `position`, which must lie within `0..=duration`.
    pub fn set_position(&mut self, position: Duration) -> Result<()> {
        let channel = self.require_channel("seek")?;
        if position > self.duration {
            return Err(AudioError::OutOfRange {
                name: "position",
                value: position.as_secs_f64(),
                min: 0.0,
                max: self.duration.as_secs_f64(),
            });
        }
        let result = self.backend.time_to_position(channel, position);
        let Some(native) = self.settle(result)? else {
            return Ok(());
        };
        let result = self.backend.set_position(channel, native);
        self.settle(result)?;
        Ok(())
    }

    /// Duration of the playing source; zero when stopped.
    pub fn duration(&self) -> Duration {
        if self.channel.is_some() {
            self.duration
        } else {
            Duration::ZERO
        }
    }

    /// Native whole-clip looping or an active loop region.
    pub fn is_looping(&self) -> Result<bool> {
        let Some(channel) = self.channel else {
            return Ok(false);
        };
        Ok(self
            .looping
            .is_looping(&*self.backend, channel)
            .checked()?
            .unwrap_or(false))
    }

    /// Enable or disable looping.
    ///
    /// Disabling also drops a loop region; enabling only turns on whole-clip
    /// looping.
    pub fn set_looping(&mut self, looping: bool) -> Result<()> {
        let channel = self.require_channel("change looping")?;
        let result = self.looping.set_looping(&*self.backend, channel, looping);
        self.settle(result)?;
        Ok(())
    }

    // ========================================================================
    // Slides
    // ========================================================================

    /// Slide the volume to `target` over `duration`.
    pub fn slide_volume(&mut self, target: f32, duration: Duration) -> Result<()> {
        self.slide(SlideParameter::Volume, target, duration)
    }

    /// Slide the pitch to `target` over `duration`.
    pub fn slide_pitch(&mut self, target: f32, duration: Duration) -> Result<()> {
        self.slide(SlideParameter::Pitch, target, duration)
    }

    /// Slide the pan to `target` over `duration`.
    pub fn slide_pan(&mut self, target: f32, duration: Duration) -> Result<()> {
        self.slide(SlideParameter::Pan, target, duration)
    }

    fn slide(&mut self, parameter: SlideParameter, target: f32, duration: Duration) -> Result<()> {
        self.require_channel("slide")?;
        let from = self.parameter(parameter);
        self.slides.begin(parameter, from, target, duration);
        Ok(())
    }

    /// Check if a parameter is sliding.
    pub fn is_sliding(&self, parameter: SlideParameter) -> bool {
        self.slides.is_sliding(parameter)
    }

    // ========================================================================
    // Per-frame work
    // ========================================================================

    /// Per-frame tick.
    ///
    /// Surfaces faults raised by loop syncs, finishes channels that reached
    /// their end, applies output setting and device changes, then advances
    /// slides in volume, pitch, pan order.
    pub fn update(&mut self, elapsed: Duration) -> Result<()> {
        if let Some(fault) = self.shared.take_fault() {
            warn!(%fault, "loop region seek failed");
            return Err(fault.into());
        }
        if self.channel.is_some() && self.shared.take_ended() {
            debug!(category = ?self.category, "playback reached the end");
            self.release()?;
            self.reset();
            self.notify_stopped();
            return Ok(());
        }
        if self.refresh()? == PlaybackState::Stopped {
            return Ok(());
        }
        self.apply_output_settings()?;

        for step in self.slides.advance(elapsed).into_iter().flatten() {
            let Some(channel) = self.channel else {
                break;
            };
            if !self.apply_parameter(channel, step.parameter, step.value)? {
                break;
            }
        }
        Ok(())
    }

    /// Move the channel to another output device.
    ///
    /// A channel that cannot be moved is treated as invalidated. Returns
    /// whether the player still holds a channel.
    pub fn rebind(&mut self, device: DeviceId) -> Result<bool> {
        self.device = device;
        let Some(channel) = self.channel else {
            return Ok(false);
        };
        if let Err(err) = self.backend.rebind_channel(channel, device) {
            warn!(?channel, ?device, %err, "channel lost on device change");
            self.invalidate();
            return Ok(false);
        }
        debug!(?channel, ?device, "channel moved to new device");
        Ok(true)
    }

    fn apply_output_settings(&mut self) -> Result<()> {
        let revision = self.settings.revision();
        if revision == self.settings_revision {
            return Ok(());
        }
        self.settings_revision = revision;

        let device = self.settings.device();
        if device != self.device && !self.rebind(device)? {
            return Ok(());
        }
        let Some(channel) = self.channel else {
            return Ok(());
        };
        self.apply_parameter(channel, SlideParameter::Volume, self.volume)?;
        Ok(())
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Take the oldest queued event.
    pub fn poll_event(&mut self) -> Option<PlayerEvent> {
        self.events.pop_front()
    }

    /// Take every queued event.
    pub fn drain_events(&mut self) -> impl Iterator<Item = PlayerEvent> + '_ {
        self.events.drain(..)
    }

    fn notify_stopped(&mut self) {
        self.events.push_back(PlayerEvent::StateChanged(PlaybackState::Stopped));
        if self.category == SoundCategory::Song {
            self.events.push_back(PlayerEvent::SongEnded);
        }
    }

    // ========================================================================
    // Handle bookkeeping
    // ========================================================================

    fn channel_flags(&self) -> ChannelFlags {
        match self.category {
            SoundCategory::Song => ChannelFlags::STREAM,
            SoundCategory::SoundEffect => ChannelFlags::empty(),
        }
    }

    /// Query the backend, dropping the channel if it became invalid.
    fn refresh(&mut self) -> Result<PlaybackState> {
        let Some(channel) = self.channel else {
            return Ok(PlaybackState::Stopped);
        };
        let result = self.backend.activity(channel);
        Ok(self
            .settle(result)?
            .map_or(PlaybackState::Stopped, PlaybackState::from))
    }

    /// Channel of a player that is playing or paused.
    fn require_channel(&mut self, action: &str) -> Result<ChannelHandle> {
        match (self.refresh()?, self.channel) {
            (PlaybackState::Playing | PlaybackState::Paused, Some(channel)) => Ok(channel),
            _ => Err(AudioError::invalid_operation(format!(
                "cannot {action} while stopped"
            ))),
        }
    }

    /// Route a native result through handle validation.
    fn settle<T>(&mut self, result: NativeResult<T>) -> Result<Option<T>> {
        let value = result.checked()?;
        if value.is_none() {
            self.invalidate();
        }
        Ok(value)
    }

    fn invalidate(&mut self) {
        if let Some(channel) = self.channel.take() {
            debug!(?channel, "channel handle invalidated");
            self.reset();
            self.events.push_back(PlayerEvent::StateChanged(PlaybackState::Stopped));
        }
    }

    /// Free the native channel, which also drops its syncs.
    fn release(&mut self) -> Result<()> {
        let Some(channel) = self.channel.take() else {
            return Ok(());
        };
        self.backend.free_channel(channel).checked()?;
        Ok(())
    }

    /// Forget everything tied to the released channel.
    ///
    /// The shared state is replaced so that callbacks still queued on the
    /// old channel can no longer reach this player.
    fn reset(&mut self) {
        self.slides.reset();
        self.looping.reset();
        self.duration = Duration::ZERO;
        self.shared = SyncShared::new();
    }
}

impl<B: AudioBackend> Drop for ChannelPlayer<B> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(%err, "failed to release channel on drop");
        }
    }
}

impl<B: AudioBackend> std::fmt::Debug for ChannelPlayer<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelPlayer")
            .field("backend", &self.backend.name())
            .field("category", &self.category)
            .field("channel", &self.channel)
            .field("volume", &self.volume)
            .field("pitch", &self.pitch)
            .field("pan", &self.pan)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::ClipData;
    use crate::mixer::SoftwareMixer;
    use crate::resource::Song;
    use crate::settings::OutputLevels;
    use approx::assert_relative_eq;

    const RATE: u32 = 1_000;

    fn fixture() -> (Arc<SoftwareMixer>, Arc<OutputSettings>, Song<SoftwareMixer>) {
        let mixer = Arc::new(SoftwareMixer::new(RATE, 4));
        let settings = OutputSettings::new(OutputLevels::default());
        let clip = ClipData::new(vec![0.5; 2 * RATE as usize], RATE, 1).unwrap();
        let song = Song::from_clip(Arc::clone(&mixer), clip).unwrap();
        (mixer, settings, song)
    }

    #[test]
    fn stopped_player_rejects_setters() {
        let (mixer, settings, _song) = fixture();
        let mut player = ChannelPlayer::new(mixer, settings, SoundCategory::Song);
        assert!(matches!(
            player.set_volume(0.5),
            Err(AudioError::InvalidOperation(_))
        ));
        assert!(matches!(
            player.slide_pan(0.5, Duration::from_secs(1)),
            Err(AudioError::InvalidOperation(_))
        ));
        assert_eq!(player.position().unwrap(), Duration::ZERO);
        assert!(!player.is_looping().unwrap());
    }

    #[test]
    fn output_gain_scales_native_volume() {
        let (mixer, settings, song) = fixture();
        let mut player =
            ChannelPlayer::new(Arc::clone(&mixer), Arc::clone(&settings), SoundCategory::Song);
        player.play(&song, PlayParams::default().volume(0.8)).unwrap();
        let channel = player.channel().unwrap();

        settings.modify(|levels| levels.master_volume = 0.5);
        player.update(Duration::ZERO).unwrap();
        assert_relative_eq!(
            mixer.attribute(channel, ChannelAttribute::Volume).unwrap(),
            0.4
        );
        assert_relative_eq!(player.volume(), 0.8);
    }

    #[test]
    fn failed_rebind_invalidates_channel() {
        let (mixer, settings, song) = fixture();
        let mut player =
            ChannelPlayer::new(Arc::clone(&mixer), Arc::clone(&settings), SoundCategory::Song);
        player.play(&song, PlayParams::default()).unwrap();
        player.drain_events().for_each(drop);

        mixer.lose_device();
        settings.modify(|levels| levels.device = DeviceId(2));
        assert!(!player.rebind(DeviceId(2)).unwrap());
        assert_eq!(player.state().unwrap(), PlaybackState::Stopped);
        assert_eq!(
            player.poll_event(),
            Some(PlayerEvent::StateChanged(PlaybackState::Stopped))
        );
    }

    #[test]
    fn device_change_is_applied_on_update() {
        let (mixer, settings, song) = fixture();
        let mut player =
            ChannelPlayer::new(Arc::clone(&mixer), Arc::clone(&settings), SoundCategory::Song);
        player.play(&song, PlayParams::default()).unwrap();
        let channel = player.channel().unwrap();

        mixer.change_device(DeviceId(3));
        settings.modify(|levels| levels.device = DeviceId(3));
        player.update(Duration::from_millis(10)).unwrap();
        assert_eq!(mixer.channel_device(channel).unwrap(), DeviceId(3));
        assert!(player.is_playing().unwrap());
    }

    #[test]
    fn drop_releases_channel() {
        let (mixer, settings, song) = fixture();
        let mut player = ChannelPlayer::new(Arc::clone(&mixer), settings, SoundCategory::Song);
        player.play(&song, PlayParams::default()).unwrap();
        assert_eq!(mixer.channel_count(), 1);
        drop(player);
        assert_eq!(mixer.channel_count(), 0);
    }
}
