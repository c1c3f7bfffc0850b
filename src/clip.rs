//! Decoded PCM clip data
//!
//! [`ClipData`] is what the content layer hands to a backend when a song or
//! sound effect is loaded: interleaved `f32` samples in -1.0..=1.0 plus the
//! sample rate and channel count.

use std::sync::Arc;
use std::time::Duration;

use crate::{AudioError, Result};

/// Interleaved PCM samples ready to be loaded by a backend.
#[derive(Clone)]
pub struct ClipData {
    samples: Arc<[f32]>,
    sample_rate: u32,
    channels: u16,
}

impl ClipData {
    /// Create clip data from interleaved samples.
    ///
    /// Fails when the sample rate or channel count is zero, or when the
    /// sample count is not a whole number of frames.
    pub fn new(samples: impl Into<Arc<[f32]>>, sample_rate: u32, channels: u16) -> Result<Self> {
        let samples = samples.into();
        if sample_rate == 0 {
            return Err(AudioError::invalid_argument("sample rate must be non-zero"));
        }
        if channels == 0 {
            return Err(AudioError::invalid_argument("channel count must be non-zero"));
        }
        if samples.len() % channels as usize != 0 {
            return Err(AudioError::invalid_argument(format!(
                "{} samples do not divide into {} channels",
                samples.len(),
                channels
            )));
        }
        Ok(Self {
            samples,
            sample_rate,
            channels,
        })
    }

    /// A silent clip of the given length.
    pub fn silence(duration: Duration, sample_rate: u32, channels: u16) -> Result<Self> {
        let frames = (duration.as_secs_f64() * sample_rate as f64).round() as usize;
        Self::new(vec![0.0; frames * channels as usize], sample_rate, channels)
    }

    /// Interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Shared handle to the interleaved samples.
    pub fn shared_samples(&self) -> Arc<[f32]> {
        Arc::clone(&self.samples)
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved channels.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (samples per channel).
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Playback length at the clip's own sample rate.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frame_count() as f64 / self.sample_rate as f64)
    }

    /// Decode a WAV file.
    #[cfg(feature = "wav")]
    pub fn from_wav_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let reader = hound::WavReader::open(path).map_err(decode_error)?;
        Self::from_wav_reader(reader)
    }

    /// Decode WAV data from memory.
    #[cfg(feature = "wav")]
    pub fn from_wav_bytes(bytes: &[u8]) -> Result<Self> {
        let reader = hound::WavReader::new(std::io::Cursor::new(bytes)).map_err(decode_error)?;
        Self::from_wav_reader(reader)
    }

    #[cfg(feature = "wav")]
    fn from_wav_reader<R: std::io::Read>(mut reader: hound::WavReader<R>) -> Result<Self> {
        let spec = reader.spec();
        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(decode_error)?,
            hound::SampleFormat::Int => {
                if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                    return Err(AudioError::Decode(format!(
                        "unsupported bit depth {}",
                        spec.bits_per_sample
                    )));
                }
                let scale = (1u64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|s| s as f32 / scale))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(decode_error)?
            }
        };
        Self::new(samples, spec.sample_rate, spec.channels)
    }
}

#[cfg(feature = "wav")]
fn decode_error(err: hound::Error) -> AudioError {
    match err {
        hound::Error::IoError(io) => AudioError::Io(io),
        other => AudioError::Decode(other.to_string()),
    }
}

impl std::fmt::Debug for ClipData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipData")
            .field("frames", &self.frame_count())
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .finish()
    }
}
