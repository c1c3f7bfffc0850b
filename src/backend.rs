//! Backend trait abstraction for native audio engines
//!
//! This module defines the narrow capability interface the playback state
//! machine needs from a native engine (BASS, FMOD, the bundled software
//! mixer, ...). Players are written once against [`AudioBackend`] and every
//! backend implements it once.
//!
//! Handles are opaque non-zero values. A backend reports a handle it no
//! longer recognises with [`NativeError::InvalidHandle`]; the players treat
//! that as the channel having silently stopped.

use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use bitflags::bitflags;

use crate::clip::ClipData;

// ============================================================================
// Native error codes
// ============================================================================

/// Native code reported when the backend runs out of memory or source slots.
pub const ERROR_MEMORY: i32 = 1;
/// Native code reported for an unknown or stale handle.
pub const ERROR_HANDLE: i32 = 5;
/// Native code reported for an invalid playback position.
pub const ERROR_POSITION: i32 = 7;
/// Native code reported when no free channel is available.
pub const ERROR_NO_CHANNEL: i32 = 18;
/// Native code reported when the output device is unavailable.
pub const ERROR_DEVICE: i32 = 23;

/// Error reported by a native backend call.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeError {
    /// The handle is unknown to the backend (freed, or lost on device change)
    #[error("invalid handle")]
    InvalidHandle,
    /// The requested position lies outside the channel
    #[error("invalid position")]
    InvalidPosition,
    /// The channel pool is exhausted
    #[error("no free channel available")]
    NoFreeChannel,
    /// The output device is unavailable
    #[error("output device unavailable")]
    DeviceUnavailable,
    /// Any other native error code
    #[error("native error code {0}")]
    Code(i32),
}

impl NativeError {
    /// Native error code for this error.
    pub fn code(&self) -> i32 {
        match self {
            NativeError::InvalidHandle => ERROR_HANDLE,
            NativeError::InvalidPosition => ERROR_POSITION,
            NativeError::NoFreeChannel => ERROR_NO_CHANNEL,
            NativeError::DeviceUnavailable => ERROR_DEVICE,
            NativeError::Code(code) => *code,
        }
    }

    /// Reconstructs an error from its native code.
    pub fn from_code(code: i32) -> Self {
        match code {
            ERROR_HANDLE => NativeError::InvalidHandle,
            ERROR_POSITION => NativeError::InvalidPosition,
            ERROR_NO_CHANNEL => NativeError::NoFreeChannel,
            ERROR_DEVICE => NativeError::DeviceUnavailable,
            other => NativeError::Code(other),
        }
    }

    /// Check if this error means the handle is no longer usable.
    pub fn is_invalid_handle(&self) -> bool {
        matches!(self, NativeError::InvalidHandle)
    }
}

/// Result type for native backend calls
pub type NativeResult<T> = std::result::Result<T, NativeError>;

// ============================================================================
// Handles
// ============================================================================

macro_rules! native_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Wraps a non-zero native value.
            pub fn new(raw: NonZeroU32) -> Self {
                Self(raw)
            }

            /// Wraps a raw native value; zero is the null handle.
            pub fn from_raw(raw: u32) -> Option<Self> {
                NonZeroU32::new(raw).map(Self)
            }

            /// Raw native value.
            pub fn raw(self) -> u32 {
                self.0.get()
            }
        }

        impl From<$name> for NonZeroU32 {
            fn from(handle: $name) -> Self {
                handle.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:#010x})"), self.0.get())
            }
        }
    };
}

native_handle!(
    /// Handle of a loaded audio source (decoded sample data or stream source).
    SourceHandle
);
native_handle!(
    /// Handle of one playing instance of a source.
    ChannelHandle
);
native_handle!(
    /// Handle of a sync registered on a channel.
    SyncHandle
);

/// Output device identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub u32);

impl DeviceId {
    /// The system default output device.
    pub const DEFAULT: DeviceId = DeviceId(1);
}

impl Default for DeviceId {
    fn default() -> Self {
        DeviceId::DEFAULT
    }
}

bitflags! {
    /// Flags used when allocating a channel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChannelFlags: u32 {
        /// Decode the source as a dedicated stream (songs)
        const STREAM = 1 << 0;
        /// Start with native whole-clip looping enabled
        const LOOP = 1 << 2;
        /// Free the channel automatically once it stops
        const AUTO_FREE = 1 << 18;
    }
}

/// Native activity of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelActivity {
    /// Not playing (never started, reached the end, or stopped)
    Stopped,
    /// Playing
    Playing,
    /// Playing but starved of data
    Stalled,
    /// Paused
    Paused,
}

/// Channel parameter controlled through [`AudioBackend::set_attribute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelAttribute {
    /// Linear volume, 0.0..=1.0
    Volume,
    /// Pitch shift in octaves, -1.0..=1.0
    Pitch,
    /// Stereo pan, -1.0 (left)..=1.0 (right)
    Pan,
}

impl ChannelAttribute {
    /// Valid range for this attribute.
    pub fn range(self) -> (f32, f32) {
        match self {
            ChannelAttribute::Volume => (0.0, 1.0),
            ChannelAttribute::Pitch | ChannelAttribute::Pan => (-1.0, 1.0),
        }
    }

    /// Clamp a value into this attribute's range.
    pub fn clamp(self, value: f32) -> f32 {
        let (min, max) = self.range();
        if value.is_nan() {
            return self.default_value();
        }
        value.clamp(min, max)
    }

    /// Neutral value for this attribute.
    pub fn default_value(self) -> f32 {
        match self {
            ChannelAttribute::Volume => 1.0,
            ChannelAttribute::Pitch | ChannelAttribute::Pan => 0.0,
        }
    }
}

/// Event a sync is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// Playback crosses the given native position
    Position(u64),
    /// Playback reaches the end of a non-looping channel
    End,
}

/// Access to the channel from inside a sync callback.
///
/// Sync callbacks run on the backend's mixer thread with the backend's
/// internal state already locked; this context is the only way they may
/// touch the channel.
pub trait SyncContext {
    /// Channel the sync fired on.
    fn channel(&self) -> ChannelHandle;

    /// Current native position.
    fn position(&self) -> u64;

    /// Seek the channel to a native position.
    fn set_position(&mut self, position: u64) -> NativeResult<()>;
}

/// Callback invoked when a sync fires.
pub type SyncProc = Arc<dyn Fn(&mut dyn SyncContext) + Send + Sync>;

// ============================================================================
// Backend trait
// ============================================================================

/// Common interface for native audio engines
///
/// All methods take `&self`: native engines are process-wide and their
/// callbacks run on foreign threads, so implementations use interior
/// synchronisation. Positions are in the backend's native units (bytes,
/// PCM frames, milliseconds, ...); use [`time_to_position`] and
/// [`position_to_time`] to convert.
///
/// [`time_to_position`]: AudioBackend::time_to_position
/// [`position_to_time`]: AudioBackend::position_to_time
pub trait AudioBackend: Send + Sync + 'static {
    /// Human readable backend name
    fn name(&self) -> &str;

    /// Load decoded clip data as a native source
    fn create_source(&self, clip: ClipData) -> NativeResult<SourceHandle>;

    /// Release a native source and every channel still playing it
    fn release_source(&self, source: SourceHandle) -> NativeResult<()>;

    /// Duration of a native source
    fn source_duration(&self, source: SourceHandle) -> NativeResult<Duration>;

    /// Allocate a channel playing `source`
    ///
    /// Returns `Ok(None)` when the channel pool is exhausted.
    fn allocate_channel(
        &self,
        source: SourceHandle,
        flags: ChannelFlags,
    ) -> NativeResult<Option<ChannelHandle>>;

    /// Free a channel along with its syncs
    fn free_channel(&self, channel: ChannelHandle) -> NativeResult<()>;

    /// Start or resume a channel
    ///
    /// With `restart`, playback starts again from the beginning.
    fn play(&self, channel: ChannelHandle, restart: bool) -> NativeResult<()>;

    /// Pause a channel (keeps position)
    fn pause(&self, channel: ChannelHandle) -> NativeResult<()>;

    /// Query the activity of a channel
    fn activity(&self, channel: ChannelHandle) -> NativeResult<ChannelActivity>;

    /// Check if a channel is playing, stalled or paused
    fn is_active(&self, channel: ChannelHandle) -> bool {
        matches!(
            self.activity(channel),
            Ok(ChannelActivity::Playing | ChannelActivity::Stalled | ChannelActivity::Paused)
        )
    }

    /// Set a channel attribute
    fn set_attribute(
        &self,
        channel: ChannelHandle,
        attribute: ChannelAttribute,
        value: f32,
    ) -> NativeResult<()>;

    /// Read back a channel attribute
    fn attribute(&self, channel: ChannelHandle, attribute: ChannelAttribute) -> NativeResult<f32>;

    /// Current native position
    fn position(&self, channel: ChannelHandle) -> NativeResult<u64>;

    /// Seek to a native position
    fn set_position(&self, channel: ChannelHandle, position: u64) -> NativeResult<()>;

    /// Channel length in native units
    fn length(&self, channel: ChannelHandle) -> NativeResult<u64>;

    /// Convert a time offset to native units
    fn time_to_position(&self, channel: ChannelHandle, time: Duration) -> NativeResult<u64>;

    /// Convert native units to a time offset
    fn position_to_time(&self, channel: ChannelHandle, position: u64) -> NativeResult<Duration>;

    /// Enable or disable native whole-clip looping
    fn set_looping(&self, channel: ChannelHandle, looping: bool) -> NativeResult<()>;

    /// Check native whole-clip looping
    fn is_looping(&self, channel: ChannelHandle) -> NativeResult<bool>;

    /// Register a sync callback on a channel
    fn register_sync(
        &self,
        channel: ChannelHandle,
        trigger: SyncTrigger,
        callback: SyncProc,
    ) -> NativeResult<SyncHandle>;

    /// Remove a previously registered sync
    fn remove_sync(&self, channel: ChannelHandle, sync: SyncHandle) -> NativeResult<()>;

    /// Move a channel to another output device
    fn rebind_channel(&self, channel: ChannelHandle, device: DeviceId) -> NativeResult<()>;

    /// Per-frame housekeeping
    ///
    /// Default implementation does nothing.
    fn update(&self) -> NativeResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_codes_round_trip_through_known_errors() {
        for err in [
            NativeError::InvalidHandle,
            NativeError::InvalidPosition,
            NativeError::NoFreeChannel,
            NativeError::DeviceUnavailable,
            NativeError::Code(99),
        ] {
            assert_eq!(NativeError::from_code(err.code()), err);
        }
    }

    #[test]
    fn null_handle_is_rejected() {
        assert!(ChannelHandle::from_raw(0).is_none());
        assert_eq!(ChannelHandle::from_raw(7).map(ChannelHandle::raw), Some(7));
    }

    #[test]
    fn attributes_clamp_to_their_ranges() {
        assert_eq!(ChannelAttribute::Volume.clamp(1.5), 1.0);
        assert_eq!(ChannelAttribute::Volume.clamp(-0.2), 0.0);
        assert_eq!(ChannelAttribute::Pitch.clamp(-3.0), -1.0);
        assert_eq!(ChannelAttribute::Pan.clamp(0.25), 0.25);
        assert_eq!(ChannelAttribute::Pan.clamp(f32::NAN), 0.0);
    }
}
