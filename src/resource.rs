//! Loaded audio resources
//!
//! A resource owns one native source. Disposing it (explicitly or on drop)
//! releases the source, which also invalidates any channel still playing
//! it; players holding such a channel simply find themselves stopped.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::backend::{AudioBackend, ChannelAttribute, ChannelFlags, SourceHandle};
use crate::clip::ClipData;
use crate::handle::{self, NativeResultExt};
use crate::settings::{OutputSettings, SoundCategory};
use crate::{AudioError, Result};

/// Something a player can start a channel from.
pub trait AudioSource {
    /// Native source, or `None` once disposed.
    fn source_handle(&self) -> Option<SourceHandle>;

    /// Length of the source.
    fn duration(&self) -> Duration;

    /// Check if the source was disposed.
    fn is_disposed(&self) -> bool {
        self.source_handle().is_none()
    }
}

/// Native source shared by songs and sound effects.
struct NativeSource<B: AudioBackend> {
    backend: Arc<B>,
    handle: Option<SourceHandle>,
    duration: Duration,
}

impl<B: AudioBackend> NativeSource<B> {
    fn load(backend: Arc<B>, clip: ClipData) -> Result<Self> {
        let duration = clip.duration();
        let handle = backend.create_source(clip)?;
        debug!(?handle, ?duration, backend = backend.name(), "source loaded");
        Ok(Self {
            backend,
            handle: Some(handle),
            duration,
        })
    }

    fn dispose(&mut self) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            // Already gone natively counts as released.
            self.backend.release_source(handle).checked()?;
            debug!(?handle, "source released");
        }
        Ok(())
    }
}

impl<B: AudioBackend> Drop for NativeSource<B> {
    fn drop(&mut self) {
        if let Err(err) = self.dispose() {
            warn!(%err, "failed to release source on drop");
        }
    }
}

impl<B: AudioBackend> fmt::Debug for NativeSource<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeSource")
            .field("backend", &self.backend.name())
            .field("handle", &self.handle)
            .field("duration", &self.duration)
            .finish()
    }
}

// ============================================================================
// Song
// ============================================================================

/// A song, played through a [`SongPlayer`](crate::SongPlayer).
#[derive(Debug)]
pub struct Song<B: AudioBackend> {
    source: NativeSource<B>,
}

impl<B: AudioBackend> Song<B> {
    /// Load decoded clip data as a song.
    pub fn from_clip(backend: Arc<B>, clip: ClipData) -> Result<Self> {
        Ok(Self {
            source: NativeSource::load(backend, clip)?,
        })
    }

    /// Load a WAV file as a song.
    #[cfg(feature = "wav")]
    pub fn from_wav_file(backend: Arc<B>, path: impl AsRef<std::path::Path>) -> Result<Self> {
        Self::from_clip(backend, ClipData::from_wav_file(path)?)
    }

    /// Release the native source. Later calls do nothing.
    pub fn dispose(&mut self) -> Result<()> {
        self.source.dispose()
    }
}

impl<B: AudioBackend> AudioSource for Song<B> {
    fn source_handle(&self) -> Option<SourceHandle> {
        self.source.handle
    }

    fn duration(&self) -> Duration {
        self.source.duration
    }
}

// ============================================================================
// Sound effect
// ============================================================================

/// A short sample, played fire-and-forget or through a
/// [`SoundEffectPlayer`](crate::SoundEffectPlayer).
#[derive(Debug)]
pub struct SoundEffect<B: AudioBackend> {
    source: NativeSource<B>,
    settings: Option<Arc<OutputSettings>>,
}

impl<B: AudioBackend> SoundEffect<B> {
    /// Load decoded clip data as a sound effect.
    pub fn from_clip(backend: Arc<B>, clip: ClipData) -> Result<Self> {
        Ok(Self {
            source: NativeSource::load(backend, clip)?,
            settings: None,
        })
    }

    /// Load a WAV file as a sound effect.
    #[cfg(feature = "wav")]
    pub fn from_wav_file(backend: Arc<B>, path: impl AsRef<std::path::Path>) -> Result<Self> {
        Self::from_clip(backend, ClipData::from_wav_file(path)?)
    }

    /// Mix one-shot plays under these output settings.
    pub fn with_settings(mut self, settings: Arc<OutputSettings>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Play once on an automatically freed channel.
    ///
    /// The channel cannot be controlled afterwards. Returns `false` when no
    /// channel is free.
    pub fn play(&self, volume: f32, pitch: f32, pan: f32) -> Result<bool> {
        let source = self.source.handle.ok_or(AudioError::Disposed)?;
        let backend = &*self.source.backend;
        let Some(channel) = handle::allocate(backend, source, ChannelFlags::AUTO_FREE)? else {
            debug!("no free channel for sound effect");
            return Ok(false);
        };

        let gain = self
            .settings
            .as_ref()
            .map_or(1.0, |settings| settings.gain(SoundCategory::SoundEffect));
        let volume = ChannelAttribute::Volume.clamp(volume) * gain;
        let pitch = ChannelAttribute::Pitch.clamp(pitch);
        let pan = ChannelAttribute::Pan.clamp(pan);
        let started = backend
            .set_attribute(channel, ChannelAttribute::Volume, volume)
            .and_then(|()| backend.set_attribute(channel, ChannelAttribute::Pitch, pitch))
            .and_then(|()| backend.set_attribute(channel, ChannelAttribute::Pan, pan))
            .and_then(|()| backend.play(channel, true));

        match started.checked() {
            Ok(started) => Ok(started.is_some()),
            Err(err) => {
                if let Err(release) = backend.free_channel(channel).checked() {
                    warn!(%release, "failed to release sound effect channel");
                }
                Err(err)
            }
        }
    }

    /// Release the native source. Later calls do nothing.
    pub fn dispose(&mut self) -> Result<()> {
        self.source.dispose()
    }
}

impl<B: AudioBackend> AudioSource for SoundEffect<B> {
    fn source_handle(&self) -> Option<SourceHandle> {
        self.source.handle
    }

    fn duration(&self) -> Duration {
        self.source.duration
    }
}
