//! Dual-source mixer — plays two sources at aligned rates into one limited bus.
//!
//! Source A runs at the shared tempo; source B additionally carries the
//! key and fine shift. Both are summed at a fixed gain and limited. Any
//! failure collapses into the single [`EngineError::Mix`].

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::buffer::PcmBuffer;
use crate::dsp::compressor::{DynamicsSettings, Limiter};
use crate::dsp::mixer::Mixer;
use crate::error::{EngineError, Result};
use crate::graph::{playback, played_length};
use crate::params::RemixAlignment;
use crate::wav;

/// Download name for a finished remix.
pub const REMIX_FILE_NAME: &str = "RaiWave_Remix.wav";

/// Remix bus settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MixConfig {
    pub sample_rate: u32,
    /// Gain applied to each source before summing.
    pub source_gain: f32,
    pub limiter_threshold_db: f64,
    pub limiter_ratio: f64,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            source_gain: 0.8,
            limiter_threshold_db: -2.0,
            limiter_ratio: 10.0,
        }
    }
}

/// Mix two sources with the default bus settings.
pub fn mix(
    source_a: &PcmBuffer,
    source_b: &PcmBuffer,
    alignment: &RemixAlignment,
    progress: impl FnMut(u8),
) -> Result<PcmBuffer> {
    mix_with_config(source_a, source_b, alignment, &MixConfig::default(), progress)
}

pub fn mix_with_config(
    source_a: &PcmBuffer,
    source_b: &PcmBuffer,
    alignment: &RemixAlignment,
    config: &MixConfig,
    progress: impl FnMut(u8),
) -> Result<PcmBuffer> {
    try_mix(source_a, source_b, alignment, config, progress).map_err(|e| {
        warn!("mix failed: {e}");
        EngineError::Mix
    })
}

fn try_mix(
    source_a: &PcmBuffer,
    source_b: &PcmBuffer,
    alignment: &RemixAlignment,
    config: &MixConfig,
    mut progress: impl FnMut(u8),
) -> Result<PcmBuffer> {
    progress(10);
    let rate_a = alignment.rate_a();
    let rate_b = alignment.rate_b();
    for (name, rate) in [("A", rate_a), ("B", rate_b)] {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(EngineError::GraphConstruction(format!(
                "source {name} playback rate must be positive, got {rate}"
            )));
        }
    }
    if config.sample_rate == 0 {
        return Err(EngineError::Render("mix sample rate must be non-zero".into()));
    }

    let sr = config.sample_rate;
    let length = played_length(source_a, rate_a, sr)?.max(played_length(source_b, rate_b, sr)?);
    debug!("mixing {length} frames: rate A {rate_a:.4}, rate B {rate_b:.4}");

    let mut mixer = Mixer::new();
    mixer.source_gain = config.source_gain;
    mixer.clear(length);
    let (a_l, a_r) = playback(source_a, rate_a, sr, length);
    mixer.add_source(&a_l, &a_r);
    let (b_l, b_r) = playback(source_b, rate_b, sr, length);
    mixer.add_source(&b_l, &b_r);
    progress(50);

    let settings = DynamicsSettings {
        threshold_db: config.limiter_threshold_db,
        ratio: config.limiter_ratio,
        ..DynamicsSettings::MIX_BUS_LIMITER
    };
    let mut limiter = Limiter::new(sr as f64, settings);
    let (left, right) = mixer.bus_mut();
    limiter.process_block(left, right);

    let (left, right) = mixer.into_channels();
    if left.iter().chain(&right).any(|s| !s.is_finite()) {
        return Err(EngineError::Render("mix produced non-finite samples".into()));
    }
    let output = PcmBuffer::stereo(left, right, sr)?;
    progress(90);

    info!("mix complete: {:.2} s at {} Hz", output.duration_secs(), sr);
    progress(100);
    Ok(output)
}

/// Decode two WAV files, mix them and encode the result.
pub fn mix_wav(bytes_a: &[u8], bytes_b: &[u8], alignment: &RemixAlignment) -> Result<Vec<u8>> {
    let decode = |bytes: &[u8]| {
        wav::decode_wav(bytes).map_err(|e| {
            warn!("remix source unreadable: {e}");
            EngineError::Mix
        })
    };
    let a = decode(bytes_a)?;
    let b = decode(bytes_b)?;
    let output = mix(&a, &b, alignment, |_| {})?;
    Ok(wav::encode_wav(&output))
}
