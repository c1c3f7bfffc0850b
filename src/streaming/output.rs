use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rodio::{OutputStream, Sink, Source};
use tracing::info;

use crate::mixer::{SoftwareMixer, OUTPUT_CHANNELS};
use crate::{AudioError, Result};

use super::RENDER_BATCH;

/// rodio source rendering the mixer in batches
struct MixerSource {
    mixer: Arc<SoftwareMixer>,
    finished: Arc<AtomicBool>,
    buffer: Vec<f32>,
    buffer_pos: usize,
}

impl MixerSource {
    fn new(mixer: Arc<SoftwareMixer>, finished: Arc<AtomicBool>) -> Self {
        Self {
            mixer,
            finished,
            buffer: vec![0.0; RENDER_BATCH],
            // Render on first pull
            buffer_pos: RENDER_BATCH,
        }
    }
}

impl Source for MixerSource {
    fn current_frame_len(&self) -> Option<usize> {
        match self.buffer.len().saturating_sub(self.buffer_pos) {
            0 => Some(RENDER_BATCH),
            remaining => Some(remaining),
        }
    }

    fn channels(&self) -> u16 {
        OUTPUT_CHANNELS
    }

    fn sample_rate(&self) -> u32 {
        self.mixer.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

impl Iterator for MixerSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.finished.load(Ordering::Relaxed) {
            return None;
        }
        if self.buffer_pos >= self.buffer.len() {
            self.mixer.render(&mut self.buffer);
            self.buffer_pos = 0;
        }
        let sample = self.buffer[self.buffer_pos];
        self.buffer_pos += 1;
        Some(sample)
    }
}

/// Plays a [`SoftwareMixer`] on the default output device.
///
/// Output stops when this value is dropped.
pub struct AudioOutput {
    _stream: OutputStream,
    sink: Sink,
    finished: Arc<AtomicBool>,
}

impl AudioOutput {
    /// Open the default output device and start pulling from `mixer`.
    pub fn open(mixer: Arc<SoftwareMixer>) -> Result<Self> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| AudioError::Device(format!("failed to open output stream: {e}")))?;
        let sink = Sink::try_new(&handle)
            .map_err(|e| AudioError::Device(format!("failed to create output sink: {e}")))?;

        let finished = Arc::new(AtomicBool::new(false));
        let sample_rate = mixer.sample_rate();
        sink.append(MixerSource::new(mixer, Arc::clone(&finished)));
        info!(sample_rate, "audio output opened");

        Ok(Self {
            _stream: stream,
            sink,
            finished,
        })
    }

    /// Pause the output stream.
    pub fn pause(&self) {
        self.sink.pause();
    }

    /// Resume the output stream.
    pub fn resume(&self) {
        self.sink.play();
    }

    /// Check if the output stream is paused.
    pub fn is_paused(&self) -> bool {
        self.sink.is_paused()
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        self.finished.store(true, Ordering::Relaxed);
        self.sink.stop();
    }
}
