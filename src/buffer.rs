//! Planar PCM audio exchanged between every stage of the engine.

use crate::error::{EngineError, Result};

/// A fixed-length, multi-channel block of f32 samples at a known rate.
///
/// Channels are stored planar (one `Vec` per channel). Once built the
/// buffer is never mutated by the engine, so one decoded source can feed
/// any number of concurrent renders.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl PcmBuffer {
    /// Build a buffer from planar channel data.
    ///
    /// Accepts one or two equally long channels at a non-zero rate.
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if channels.is_empty() || channels.len() > 2 {
            return Err(EngineError::Decode(format!(
                "expected 1 or 2 channels, got {}",
                channels.len()
            )));
        }
        if sample_rate == 0 {
            return Err(EngineError::Decode("sample rate must be non-zero".into()));
        }
        let len = channels[0].len();
        if channels.iter().any(|c| c.len() != len) {
            return Err(EngineError::Decode("channels differ in length".into()));
        }
        Ok(Self {
            channels,
            sample_rate,
        })
    }

    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        Self::new(vec![samples], sample_rate)
    }

    pub fn stereo(left: Vec<f32>, right: Vec<f32>, sample_rate: u32) -> Result<Self> {
        Self::new(vec![left, right], sample_rate)
    }

    /// Build from interleaved frames.
    pub fn from_interleaved(samples: &[f32], channel_count: usize, sample_rate: u32) -> Result<Self> {
        if channel_count == 0 || samples.len() % channel_count != 0 {
            return Err(EngineError::Decode(format!(
                "{} samples do not divide into {channel_count} channels",
                samples.len()
            )));
        }
        let mut channels = vec![Vec::with_capacity(samples.len() / channel_count); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (ch, &s) in channels.iter_mut().zip(frame) {
                ch.push(s);
            }
        }
        Self::new(channels, sample_rate)
    }

    /// Build from 16-bit signed PCM, interleaved.
    pub fn from_i16(pcm: &[i16], channel_count: usize, sample_rate: u32) -> Result<Self> {
        let data: Vec<f32> = pcm.iter().map(|&s| s as f32 / 32768.0).collect();
        Self::from_interleaved(&data, channel_count, sample_rate)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames per channel.
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration_secs(&self) -> f64 {
        self.len() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }

    /// Largest absolute sample value across all channels.
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|c| c.iter())
            .fold(0.0_f32, |m, &s| m.max(s.abs()))
    }

    /// A copy holding at most the first `seconds` of audio.
    pub fn head(&self, seconds: f64) -> PcmBuffer {
        let frames = ((seconds.max(0.0) * self.sample_rate as f64).floor() as usize).min(self.len());
        PcmBuffer {
            channels: self.channels.iter().map(|c| c[..frames].to_vec()).collect(),
            sample_rate: self.sample_rate,
        }
    }

    /// Read channel `index` at a fractional frame position.
    ///
    /// Linear interpolation between neighbours; silence outside the buffer.
    #[inline]
    pub fn read_interpolated(&self, index: usize, position: f64) -> f32 {
        let data = &self.channels[index];
        if data.is_empty() || position < 0.0 {
            return 0.0;
        }

        let idx = position as usize;
        if idx >= data.len() - 1 {
            return if idx < data.len() { data[idx] } else { 0.0 };
        }

        let frac = (position - idx as f64) as f32;
        data[idx] * (1.0 - frac) + data[idx + 1] * frac
    }
}
