//! Real-time output of the software mixer
//!
//! [`AudioOutput`] opens the default rodio output stream and lets it pull
//! batches straight from [`SoftwareMixer::render`](crate::SoftwareMixer::render).
//! Sync callbacks therefore fire on rodio's audio thread, which is the
//! situation the players' weakly referenced sync state is built for.

mod output;

pub use output::AudioOutput;

/// Samples rendered per batch (interleaved stereo).
pub const RENDER_BATCH: usize = 2048;
