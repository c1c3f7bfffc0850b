//! Native handle validation
//!
//! A channel handle can go stale behind a player's back: the output device
//! changes, the source is released, or an auto-freed channel finishes. None
//! of these are errors from the caller's point of view, so every native call
//! made on behalf of a player is routed through [`NativeResultExt::checked`],
//! which turns [`NativeError::InvalidHandle`] into `Ok(None)` and every other
//! native failure into a fatal [`AudioError::Backend`].

use crate::backend::{
    AudioBackend, ChannelFlags, ChannelHandle, NativeError, NativeResult, SourceHandle,
};
use crate::{AudioError, Result};

/// Split native results into "valid", "handle invalidated" and "fatal".
pub trait NativeResultExt<T> {
    /// `Ok(Some(value))` on success, `Ok(None)` for an invalid handle, and a
    /// backend error for anything else.
    fn checked(self) -> Result<Option<T>>;
}

impl<T> NativeResultExt<T> for NativeResult<T> {
    fn checked(self) -> Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_invalid_handle() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// Check whether a channel handle is still accepted by the backend.
///
/// A missing handle is never valid.
pub fn is_valid<B: AudioBackend + ?Sized>(
    backend: &B,
    handle: Option<ChannelHandle>,
) -> Result<bool> {
    let Some(handle) = handle else {
        return Ok(false);
    };
    Ok(backend.activity(handle).checked()?.is_some())
}

/// Allocate a channel on behalf of a player.
///
/// Pool exhaustion is `Ok(None)`. A source the backend no longer knows was
/// released underneath its owner, which surfaces as [`AudioError::Disposed`].
pub fn allocate<B: AudioBackend + ?Sized>(
    backend: &B,
    source: SourceHandle,
    flags: ChannelFlags,
) -> Result<Option<ChannelHandle>> {
    match backend.allocate_channel(source, flags) {
        Ok(channel) => Ok(channel),
        Err(NativeError::NoFreeChannel) => Ok(None),
        Err(NativeError::InvalidHandle) => Err(AudioError::Disposed),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::ClipData;
    use crate::mixer::SoftwareMixer;

    #[test]
    fn invalid_handle_is_not_an_error() {
        let result: NativeResult<u32> = Err(NativeError::InvalidHandle);
        assert!(result.checked().unwrap().is_none());
    }

    #[test]
    fn other_native_errors_are_fatal() {
        let result: NativeResult<u32> = Err(NativeError::Code(31));
        let err = result.checked().unwrap_err();
        assert_eq!(err.native_code(), Some(31));
    }

    #[test]
    fn validates_against_backend() {
        let mixer = SoftwareMixer::new(1_000, 4);
        let clip = ClipData::silence(std::time::Duration::from_secs(1), 1_000, 1).unwrap();
        let source = mixer.create_source(clip).unwrap();
        let channel = mixer
            .allocate_channel(source, ChannelFlags::empty())
            .unwrap()
            .unwrap();

        assert!(is_valid(&mixer, Some(channel)).unwrap());
        assert!(!is_valid(&mixer, None).unwrap());

        mixer.free_channel(channel).unwrap();
        assert!(!is_valid(&mixer, Some(channel)).unwrap());
    }

    #[test]
    fn allocation_maps_exhaustion_and_released_sources() {
        let mixer = SoftwareMixer::new(1_000, 1);
        let clip = ClipData::silence(std::time::Duration::from_secs(1), 1_000, 1).unwrap();
        let source = mixer.create_source(clip).unwrap();

        assert!(allocate(&mixer, source, ChannelFlags::empty()).unwrap().is_some());
        assert!(allocate(&mixer, source, ChannelFlags::empty()).unwrap().is_none());

        mixer.release_source(source).unwrap();
        assert!(matches!(
            allocate(&mixer, source, ChannelFlags::empty()),
            Err(AudioError::Disposed)
        ));
    }
}
