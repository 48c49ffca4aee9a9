//! Suggests enhancement settings from a source's loudness and brightness.

use log::{debug, warn};

use crate::buffer::PcmBuffer;
use crate::params::Suggestions;

/// Longest stretch of the source that is inspected.
const ANALYSIS_WINDOW_SEC: f64 = 30.0;
/// Decimation stride over the first channel.
const ANALYSIS_STRIDE: usize = 10;
/// RMS the master gain suggestion aims for.
const TARGET_RMS: f64 = 0.15;
const MAX_SUGGESTED_GAIN_DB: f64 = 9.0;

/// Loudness and brightness measured over the analysis window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalStats {
    pub rms: f64,
    /// Zero crossings per inspected sample.
    pub zero_crossing_rate: f64,
}

/// Measure RMS and zero-crossing rate of the first channel.
///
/// Returns `None` for an empty buffer or non-finite samples.
pub fn measure(source: &PcmBuffer) -> Option<SignalStats> {
    let data = source.channel(0);
    let limit = data
        .len()
        .min((source.sample_rate() as f64 * ANALYSIS_WINDOW_SEC) as usize);
    if limit == 0 {
        return None;
    }

    let mut sum_squares = 0.0_f64;
    let mut crossings = 0usize;
    for i in (0..limit).step_by(ANALYSIS_STRIDE) {
        let v = data[i] as f64;
        sum_squares += v * v;
        if i > 0 && v * (data[i - ANALYSIS_STRIDE] as f64) < 0.0 {
            crossings += 1;
        }
    }

    let count = limit as f64 / ANALYSIS_STRIDE as f64;
    let stats = SignalStats {
        rms: (sum_squares / count).sqrt(),
        zero_crossing_rate: crossings as f64 / count,
    };
    (stats.rms.is_finite() && stats.zero_crossing_rate.is_finite()).then_some(stats)
}

/// Master gain that lifts quiet material toward the target RMS, never cutting.
pub fn suggested_gain_db(rms: f64) -> f64 {
    (20.0 * (TARGET_RMS / rms.max(0.001)).log10()).clamp(0.0, MAX_SUGGESTED_GAIN_DB)
}

/// Suggest parameter values for `source`.
///
/// Analysis is advisory: an unusable buffer yields empty suggestions.
pub fn analyze(source: &PcmBuffer) -> Suggestions {
    let Some(stats) = measure(source) else {
        warn!("analysis skipped: source has no usable samples");
        return Suggestions::default();
    };
    debug!(
        "analysis: rms {:.4}, zcr {:.4}",
        stats.rms, stats.zero_crossing_rate
    );

    let mut s = Suggestions {
        pitch_semitones: Some(0.0),
        time_stretch: Some(1.0),
        drive: Some(0.0),
        vibrato_depth: Some(0.0),
        vibrato_rate_hz: Some(6.0),
        ring_mod_amount: Some(0.0),
        backing_vocals_amount: Some(0.0),
        delay_time_sec: Some(0.3),
        delay_feedback: Some(0.3),
        reverb_decay_sec: Some(1.5),
        reverb_mix: Some(0.2),
        reverb_output_gain: Some(1.0),
        ..Suggestions::default()
    };

    if stats.zero_crossing_rate < 0.02 {
        // Dull or bass-heavy
        s.eq_air = Some(5.0);
        s.eq_mid = Some(2.0);
        s.eq_bass = Some(-2.0);
        s.denoise = Some(0.1);
        s.drive = Some(0.3);
    } else if stats.zero_crossing_rate > 0.15 {
        // Hissy or sibilant
        s.eq_air = Some(-2.0);
        s.denoise = Some(0.4);
        s.de_ess = Some(0.5);
    } else {
        s.eq_air = Some(2.5);
        s.denoise = Some(0.2);
        s.drive = Some(0.1);
    }

    s.master_gain_db = Some(suggested_gain_db(stats.rms));
    s.stereo_width = Some(if source.channel_count() == 1 { 0.5 } else { 0.25 });
    s
}
