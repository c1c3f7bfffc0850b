//! Loop region handling
//!
//! Looping is decided when playback starts:
//!
//! - whole-clip looping is delegated to the backend's native loop flag;
//! - a loop region that does not cover the whole clip is implemented with
//!   a position sync at the region's end which seeks back to its start.
//!
//! The sync callback runs on the backend's mixer thread. It only holds a
//! weak reference to the player's [`SyncShared`] state, so a callback that
//! fires after the player is gone does nothing.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::backend::{
    AudioBackend, ChannelHandle, NativeError, NativeResult, SyncHandle, SyncProc, SyncTrigger,
};
use crate::{AudioError, Result};

/// How a channel loops, decided at play time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopPlan {
    /// Play once
    #[default]
    Once,
    /// Native whole-clip looping
    Auto,
    /// Seek back to `start` whenever playback reaches `end`
    Region {
        /// Loop start offset
        start: Duration,
        /// Loop end offset
        end: Duration,
    },
}

impl LoopPlan {
    /// Plan for a loop region of a clip lasting `clip_duration`.
    ///
    /// A missing `length` loops to the end of the clip. The end is clamped to
    /// the clip duration; a region covering the whole clip becomes native
    /// whole-clip looping.
    pub fn from_region(
        start: Duration,
        length: Option<Duration>,
        clip_duration: Duration,
    ) -> Result<Self> {
        validate_region(start, length)?;
        if start >= clip_duration {
            return Err(AudioError::OutOfRange {
                name: "loop start",
                value: start.as_secs_f64(),
                min: 0.0,
                max: clip_duration.as_secs_f64(),
            });
        }

        let end = match length {
            Some(length) => start.saturating_add(length).min(clip_duration),
            None => clip_duration,
        };
        if start.is_zero() && end >= clip_duration {
            return Ok(LoopPlan::Auto);
        }
        Ok(LoopPlan::Region { start, end })
    }
}

/// Reject loop arguments that can never describe a region.
///
/// A loop start with a zero length is illegal, as is a zero-length region
/// at the very start of the clip.
pub fn validate_region(start: Duration, length: Option<Duration>) -> Result<()> {
    match length {
        Some(length) if length.is_zero() && !start.is_zero() => Err(AudioError::invalid_argument(
            "loop length must be positive when a loop start is given",
        )),
        Some(length) if length.is_zero() => {
            Err(AudioError::invalid_argument("loop length must be positive"))
        }
        _ => Ok(()),
    }
}

// ============================================================================
// Shared state reached from sync callbacks
// ============================================================================

// Outside the range of native codes, so every code can be recorded.
const NO_FAULT: i64 = i64::MIN;

/// State shared between a player and the sync callbacks it registers.
///
/// Everything here is atomic: callbacks must not block or allocate on the
/// mixer thread.
#[derive(Debug)]
pub struct SyncShared {
    loop_start: AtomicU64,
    ended: AtomicBool,
    fault: AtomicI64,
}

impl SyncShared {
    /// Fresh shared state behind an `Arc`.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            loop_start: AtomicU64::new(0),
            ended: AtomicBool::new(false),
            fault: AtomicI64::new(NO_FAULT),
        })
    }

    /// Record that the channel reached its end.
    pub fn mark_ended(&self) {
        self.ended.store(true, Ordering::Release);
    }

    /// Take the end flag, clearing it.
    pub fn take_ended(&self) -> bool {
        self.ended.swap(false, Ordering::AcqRel)
    }

    /// Record a native failure raised inside a callback.
    pub fn record_fault(&self, err: NativeError) {
        let code = i64::from(err.code());
        let _ = self
            .fault
            .compare_exchange(NO_FAULT, code, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Take the first recorded fault, clearing it.
    pub fn take_fault(&self) -> Option<NativeError> {
        match self.fault.swap(NO_FAULT, Ordering::AcqRel) {
            NO_FAULT => None,
            code => i32::try_from(code).ok().map(NativeError::from_code),
        }
    }
}

/// Sync callback that seeks back to the loop start.
pub fn loop_sync(shared: Weak<SyncShared>) -> SyncProc {
    Arc::new(move |ctx| {
        let Some(shared) = shared.upgrade() else {
            return;
        };
        let start = shared.loop_start.load(Ordering::Acquire);
        if let Err(err) = ctx.set_position(start) {
            shared.record_fault(err);
        }
    })
}

/// Sync callback that flags the end of playback.
pub fn end_sync(shared: Weak<SyncShared>) -> SyncProc {
    Arc::new(move |_ctx| {
        if let Some(shared) = shared.upgrade() {
            shared.mark_ended();
        }
    })
}

// ============================================================================
// Loop controller
// ============================================================================

/// Loop configuration of one channel.
#[derive(Debug, Default)]
pub struct LoopController {
    sync: Option<SyncHandle>,
}

impl LoopController {
    /// Create a controller with no loop sync.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a loop plan to a freshly allocated channel.
    pub fn configure<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &B,
        channel: ChannelHandle,
        plan: LoopPlan,
        shared: &Arc<SyncShared>,
    ) -> NativeResult<()> {
        self.sync = None;
        match plan {
            LoopPlan::Once => backend.set_looping(channel, false),
            LoopPlan::Auto => backend.set_looping(channel, true),
            LoopPlan::Region { start, end } => {
                backend.set_looping(channel, false)?;
                let start = backend.time_to_position(channel, start)?;
                let end = backend.time_to_position(channel, end)?;
                shared.loop_start.store(start, Ordering::Release);
                let sync = backend.register_sync(
                    channel,
                    SyncTrigger::Position(end),
                    loop_sync(Arc::downgrade(shared)),
                )?;
                self.sync = Some(sync);
                Ok(())
            }
        }
    }

    /// Check if a loop region sync is registered.
    pub fn has_region(&self) -> bool {
        self.sync.is_some()
    }

    /// Native loop flag or an active loop region.
    pub fn is_looping<B: AudioBackend + ?Sized>(
        &self,
        backend: &B,
        channel: ChannelHandle,
    ) -> NativeResult<bool> {
        Ok(self.has_region() || backend.is_looping(channel)?)
    }

    /// Toggle looping on a running channel.
    ///
    /// Turning looping off removes the loop region sync as well; turning it
    /// on only enables native whole-clip looping.
    pub fn set_looping<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &B,
        channel: ChannelHandle,
        looping: bool,
    ) -> NativeResult<()> {
        if !looping {
            if let Some(sync) = self.sync.take() {
                backend.remove_sync(channel, sync)?;
            }
        }
        backend.set_looping(channel, looping)
    }

    /// Forget the registered sync once its channel is gone.
    pub fn reset(&mut self) {
        self.sync = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIP: Duration = Duration::from_secs(10);

    #[test]
    fn start_with_zero_length_is_rejected() {
        let err = LoopPlan::from_region(Duration::from_secs(2), Some(Duration::ZERO), CLIP);
        assert!(matches!(err, Err(AudioError::InvalidArgument(_))));
    }

    #[test]
    fn whole_clip_region_is_native_loop() {
        assert_eq!(
            LoopPlan::from_region(Duration::ZERO, None, CLIP).unwrap(),
            LoopPlan::Auto
        );
        assert_eq!(
            LoopPlan::from_region(Duration::ZERO, Some(Duration::from_secs(30)), CLIP).unwrap(),
            LoopPlan::Auto
        );
    }

    #[test]
    fn start_without_length_loops_to_clip_end() {
        assert_eq!(
            LoopPlan::from_region(Duration::from_secs(4), None, CLIP).unwrap(),
            LoopPlan::Region {
                start: Duration::from_secs(4),
                end: CLIP
            }
        );
    }

    #[test]
    fn region_end_is_clamped() {
        assert_eq!(
            LoopPlan::from_region(Duration::from_secs(2), Some(Duration::from_secs(3)), CLIP)
                .unwrap(),
            LoopPlan::Region {
                start: Duration::from_secs(2),
                end: Duration::from_secs(5)
            }
        );
        assert_eq!(
            LoopPlan::from_region(Duration::from_secs(8), Some(Duration::from_secs(5)), CLIP)
                .unwrap(),
            LoopPlan::Region {
                start: Duration::from_secs(8),
                end: CLIP
            }
        );
    }

    #[test]
    fn start_past_clip_is_out_of_range() {
        let err = LoopPlan::from_region(Duration::from_secs(12), None, CLIP);
        assert!(matches!(err, Err(AudioError::OutOfRange { .. })));
    }

    #[test]
    fn faults_keep_the_first_code() {
        let shared = SyncShared::new();
        shared.record_fault(NativeError::InvalidPosition);
        shared.record_fault(NativeError::Code(40));
        assert_eq!(shared.take_fault(), Some(NativeError::InvalidPosition));
        assert_eq!(shared.take_fault(), None);
    }

    #[test]
    fn zero_fault_code_is_recorded() {
        let shared = SyncShared::new();
        assert_eq!(shared.take_fault(), None);
        shared.record_fault(NativeError::Code(0));
        assert_eq!(shared.take_fault(), Some(NativeError::Code(0)));
        assert_eq!(shared.take_fault(), None);
    }

    #[test]
    fn callbacks_are_inert_once_owner_is_gone() {
        struct Probe {
            seeks: usize,
        }
        impl crate::backend::SyncContext for Probe {
            fn channel(&self) -> ChannelHandle {
                ChannelHandle::from_raw(1).unwrap()
            }
            fn position(&self) -> u64 {
                0
            }
            fn set_position(&mut self, _position: u64) -> NativeResult<()> {
                self.seeks += 1;
                Ok(())
            }
        }

        let shared = SyncShared::new();
        let callback = loop_sync(Arc::downgrade(&shared));
        let mut probe = Probe { seeks: 0 };
        callback(&mut probe);
        assert_eq!(probe.seeks, 1);

        drop(shared);
        callback(&mut probe);
        assert_eq!(probe.seeks, 1);
    }
}
