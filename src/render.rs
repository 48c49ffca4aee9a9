//! Offline renderer — sizes the output, runs one graph over the source and
//! returns the finished buffer.
//!
//! Every call builds its own [`SignalGraph`] and owns all intermediate
//! buffers, so renders against the same source may run concurrently and a
//! failed render leaves nothing behind.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::buffer::PcmBuffer;
use crate::dsp::impulse::DEFAULT_IMPULSE_SEED;
use crate::error::{EngineError, Result};
use crate::graph::{MAX_PLAYED_SECONDS, SignalGraph, played_length};
use crate::params::ParameterSet;
use crate::wav;

/// Engine-level render settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderConfig {
    /// Output sample rate, independent of the source rate.
    pub sample_rate: u32,
    /// Silence appended so delay and reverb tails ring out.
    pub tail_seconds: f64,
    /// Source length used by preview renders.
    pub preview_seconds: f64,
    /// Seed for the reverb kernel noise.
    pub impulse_seed: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            tail_seconds: 2.0,
            preview_seconds: 10.0,
            impulse_seed: DEFAULT_IMPULSE_SEED,
        }
    }
}

impl RenderConfig {
    /// Output frames for `source` at `rate`, tail included.
    pub fn output_length(&self, source: &PcmBuffer, rate: f64) -> Result<usize> {
        let tail = (self.tail_seconds * self.sample_rate as f64).ceil() as usize;
        played_length(source, rate, self.sample_rate)?
            .checked_add(tail)
            .ok_or_else(|| EngineError::Render("output length overflows".into()))
    }
}

/// Render `source` through the graph described by `params` at 48 kHz.
///
/// `progress` receives coarse milestones (10, 50, 90, 100).
pub fn render(source: &PcmBuffer, params: &ParameterSet, progress: impl FnMut(u8)) -> Result<PcmBuffer> {
    render_with_config(source, params, &RenderConfig::default(), progress)
}

pub fn render_with_config(
    source: &PcmBuffer,
    params: &ParameterSet,
    config: &RenderConfig,
    mut progress: impl FnMut(u8),
) -> Result<PcmBuffer> {
    progress(10);
    if config.sample_rate == 0 || !(0.0..=MAX_PLAYED_SECONDS).contains(&config.tail_seconds) {
        return Err(EngineError::Render(format!(
            "unusable render config: {} Hz, {} s tail",
            config.sample_rate, config.tail_seconds
        )));
    }

    let mut graph = SignalGraph::build(params, config.sample_rate, config.impulse_seed)?;
    let length = config.output_length(source, graph.playback_rate())?;
    debug!(
        "rendering {} frames ({:.2} s source at {} Hz, {} ch)",
        length,
        source.duration_secs(),
        source.sample_rate(),
        source.channel_count()
    );
    progress(50);

    let output = graph.run(source, length)?;
    if output.channels().iter().flatten().any(|s| !s.is_finite()) {
        return Err(EngineError::Render("graph produced non-finite samples".into()));
    }
    progress(90);

    info!(
        "render complete: {:.2} s at {} Hz, peak {:.3}",
        output.duration_secs(),
        output.sample_rate(),
        output.peak()
    );
    progress(100);
    Ok(output)
}

/// Render the first few seconds of `source` with the full graph.
pub fn render_preview(source: &PcmBuffer, params: &ParameterSet) -> Result<PcmBuffer> {
    let config = RenderConfig::default();
    let head = source.head(config.preview_seconds);
    render_with_config(&head, params, &config, |_| {})
}

/// Render and encode as 16-bit WAV.
pub fn render_wav(source: &PcmBuffer, params: &ParameterSet) -> Result<Vec<u8>> {
    let output = render(source, params, |_| {})?;
    Ok(wav::encode_wav(&output))
}
