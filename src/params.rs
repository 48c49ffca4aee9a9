//! Per-render enhancement controls, the remix alignment and the partial
//! suggestion set produced by analysis.
//!
//! All records serialize with camelCase keys and fill missing keys from
//! their defaults, so partial JSON from a caller is accepted.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Longest delay-send time the feedback delay line can hold, in seconds.
pub const MAX_DELAY_TIME_SEC: f64 = 5.0;

/// Delay time used when `delay_time_sec` is left at zero.
pub const DEFAULT_DELAY_TIME_SEC: f64 = 0.3;
/// Feedback used when `delay_feedback` is left at zero.
pub const DEFAULT_DELAY_FEEDBACK: f64 = 0.3;
/// Reverb length used when `reverb_decay_sec` is left at zero.
pub const DEFAULT_REVERB_DECAY_SEC: f64 = 1.5;
/// Vibrato rate used when `vibrato_rate_hz` is left at zero.
pub const DEFAULT_VIBRATO_RATE_HZ: f64 = 6.0;

/// Enhancement controls consumed read-only by one render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParameterSet {
    // Pitch / time
    /// Semitones, −12..12.
    pub pitch_semitones: f64,
    /// Duration ratio, 0.5..1.5 (1.0 = unchanged).
    pub time_stretch: f64,

    // Tone shaping
    /// 0..1, raises the high-pass and lowers the low-pass corner.
    pub denoise: f64,
    /// 0..1, notch depth at 7 kHz.
    pub de_ess: f64,
    pub eq_bass: f64,
    pub eq_mid: f64,
    pub eq_air: f64,

    // Saturation
    /// 0..1, 0 removes the waveshaper from the graph.
    pub drive: f64,

    // Modulation
    /// 0..10
    pub vibrato_depth: f64,
    pub vibrato_rate_hz: f64,
    /// 0..1
    pub ring_mod_amount: f64,
    /// 0..1, doubling send level.
    pub backing_vocals_amount: f64,

    // Time-based FX
    pub delay_mix: f64,
    pub delay_time_sec: f64,
    /// Must stay below 1.
    pub delay_feedback: f64,
    pub reverb_mix: f64,
    pub reverb_decay_sec: f64,
    pub reverb_output_gain: f64,

    // Global
    /// Carried for callers; the render graph keeps its panner centred.
    pub stereo_width: f64,
    pub master_gain_db: f64,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            pitch_semitones: 0.0,
            time_stretch: 1.0,
            denoise: 0.1,
            de_ess: 0.2,
            eq_bass: 0.0,
            eq_mid: 0.0,
            eq_air: 0.0,
            drive: 0.0,
            vibrato_depth: 0.0,
            vibrato_rate_hz: 0.0,
            ring_mod_amount: 0.0,
            backing_vocals_amount: 0.0,
            delay_mix: 0.0,
            delay_time_sec: DEFAULT_DELAY_TIME_SEC,
            delay_feedback: 0.3,
            reverb_mix: 0.1,
            reverb_decay_sec: DEFAULT_REVERB_DECAY_SEC,
            reverb_output_gain: 1.0,
            stereo_width: 0.1,
            master_gain_db: 0.0,
        }
    }
}

impl ParameterSet {
    /// A set with every amount-style control at zero: only the always-on
    /// filters, EQ, dynamics and master stages remain in the graph.
    pub fn neutral() -> Self {
        Self {
            denoise: 0.0,
            de_ess: 0.0,
            reverb_mix: 0.0,
            stereo_width: 0.0,
            ..Self::default()
        }
    }

    /// Parse a (possibly partial) JSON record; an empty string means defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json)
            .map_err(|e| EngineError::GraphConstruction(format!("parameter JSON: {e}")))
    }

    /// Combined playback rate of the source stage.
    ///
    /// Pitch and speed move together: `2^(pitch/12) / stretch`.
    pub fn playback_rate(&self) -> f64 {
        2.0_f64.powf(self.pitch_semitones / 12.0) / self.time_stretch
    }

    /// Delay time with the zero fallback applied.
    pub fn effective_delay_time(&self) -> f64 {
        if self.delay_time_sec > 0.0 {
            self.delay_time_sec
        } else {
            DEFAULT_DELAY_TIME_SEC
        }
    }

    /// Delay feedback with the zero fallback applied.
    pub fn effective_delay_feedback(&self) -> f64 {
        if self.delay_feedback > 0.0 {
            self.delay_feedback
        } else {
            DEFAULT_DELAY_FEEDBACK
        }
    }

    /// Reverb kernel length with the zero fallback applied.
    pub fn effective_reverb_decay(&self) -> f64 {
        if self.reverb_decay_sec > 0.0 {
            self.reverb_decay_sec
        } else {
            DEFAULT_REVERB_DECAY_SEC
        }
    }

    pub fn effective_vibrato_rate(&self) -> f64 {
        if self.vibrato_rate_hz > 0.0 {
            self.vibrato_rate_hz
        } else {
            DEFAULT_VIBRATO_RATE_HZ
        }
    }

    /// Wet level of the reverb return.
    pub fn reverb_send_level(&self) -> f64 {
        self.reverb_mix * self.reverb_output_gain
    }

    /// Reject combinations that would build an unstable or meaningless graph.
    ///
    /// Runs before any output buffer is allocated.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("pitchSemitones", self.pitch_semitones),
            ("timeStretch", self.time_stretch),
            ("denoise", self.denoise),
            ("deEss", self.de_ess),
            ("eqBass", self.eq_bass),
            ("eqMid", self.eq_mid),
            ("eqAir", self.eq_air),
            ("drive", self.drive),
            ("vibratoDepth", self.vibrato_depth),
            ("vibratoRateHz", self.vibrato_rate_hz),
            ("ringModAmount", self.ring_mod_amount),
            ("backingVocalsAmount", self.backing_vocals_amount),
            ("delayMix", self.delay_mix),
            ("delayTimeSec", self.delay_time_sec),
            ("delayFeedback", self.delay_feedback),
            ("reverbMix", self.reverb_mix),
            ("reverbDecaySec", self.reverb_decay_sec),
            ("reverbOutputGain", self.reverb_output_gain),
            ("stereoWidth", self.stereo_width),
            ("masterGainDb", self.master_gain_db),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(EngineError::GraphConstruction(format!(
                "{name} must be finite, got {value}"
            )));
        }

        if self.time_stretch <= 0.0 {
            return Err(EngineError::GraphConstruction(format!(
                "timeStretch must be positive, got {}",
                self.time_stretch
            )));
        }
        let rate = self.playback_rate();
        if !(rate.is_finite() && rate > 0.0) {
            return Err(EngineError::GraphConstruction(format!(
                "pitch {} st with stretch {} gives an unusable playback rate {rate}",
                self.pitch_semitones, self.time_stretch
            )));
        }
        if !(0.0..1.0).contains(&self.delay_feedback) {
            return Err(EngineError::GraphConstruction(format!(
                "delayFeedback must be in [0, 1), got {}",
                self.delay_feedback
            )));
        }
        for (name, value) in [
            ("reverbDecaySec", self.reverb_decay_sec),
            ("delayTimeSec", self.delay_time_sec),
            ("vibratoDepth", self.vibrato_depth),
            ("vibratoRateHz", self.vibrato_rate_hz),
        ] {
            if value < 0.0 {
                return Err(EngineError::GraphConstruction(format!(
                    "{name} must not be negative, got {value}"
                )));
            }
        }
        if self.delay_time_sec > MAX_DELAY_TIME_SEC {
            return Err(EngineError::GraphConstruction(format!(
                "delayTimeSec exceeds {MAX_DELAY_TIME_SEC} s, got {}",
                self.delay_time_sec
            )));
        }
        Ok(())
    }
}

/// Key/tempo alignment for the dual-source mixer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemixAlignment {
    pub key_semitones: f64,
    /// 0.5..1.5, shared by both sources.
    pub tempo_ratio: f64,
    /// ±0.5, added to `key_semitones` for source B.
    pub fine_shift_semitones: f64,
    /// Reserved for a future mix-level control; not read by the mixer.
    pub balance: f64,
}

impl Default for RemixAlignment {
    fn default() -> Self {
        Self {
            key_semitones: 0.0,
            tempo_ratio: 1.0,
            fine_shift_semitones: 0.0,
            balance: 0.5,
        }
    }
}

impl RemixAlignment {
    pub fn from_json(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json)
            .map_err(|e| EngineError::GraphConstruction(format!("alignment JSON: {e}")))
    }

    pub fn rate_a(&self) -> f64 {
        self.tempo_ratio
    }

    pub fn rate_b(&self) -> f64 {
        self.tempo_ratio * 2.0_f64.powf((self.key_semitones + self.fine_shift_semitones) / 12.0)
    }
}

/// A partial parameter set. `None` fields leave the caller's value alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch_semitones: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_stretch: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denoise: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub de_ess: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eq_bass: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eq_mid: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eq_air: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drive: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vibrato_depth: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vibrato_rate_hz: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ring_mod_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backing_vocals_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_time_sec: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_feedback: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverb_mix: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverb_decay_sec: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverb_output_gain: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stereo_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_gain_db: Option<f64>,
}

impl Suggestions {
    pub fn is_empty(&self) -> bool {
        *self == Suggestions::default()
    }

    /// Overlay every suggested field onto `params`.
    pub fn apply_to(&self, params: &mut ParameterSet) {
        macro_rules! overlay {
            ($($field:ident),* $(,)?) => {
                $(if let Some(v) = self.$field {
                    params.$field = v;
                })*
            };
        }
        overlay!(
            pitch_semitones,
            time_stretch,
            denoise,
            de_ess,
            eq_bass,
            eq_mid,
            eq_air,
            drive,
            vibrato_depth,
            vibrato_rate_hz,
            ring_mod_amount,
            backing_vocals_amount,
            delay_time_sec,
            delay_feedback,
            reverb_mix,
            reverb_decay_sec,
            reverb_output_gain,
            stereo_width,
            master_gain_db,
        );
    }
}
