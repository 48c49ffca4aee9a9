//! Presets — named parameter sets and the built-in voice/style transforms.
//!
//! A [`Preset`] is pure data in the same camelCase JSON shape as
//! [`ParameterSet`]; storing and listing them is the host's job.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::params::ParameterSet;

// ── User presets ────────────────────────────────────────────

/// A named, saved parameter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    #[serde(default)]
    pub params: ParameterSet,
}

impl Preset {
    pub fn new(name: impl Into<String>, params: ParameterSet) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(preset_error)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(preset_error)
    }
}

/// Serialize a preset list as a JSON array.
pub fn presets_to_json(presets: &[Preset]) -> Result<String> {
    serde_json::to_string(presets).map_err(preset_error)
}

pub fn presets_from_json(json: &str) -> Result<Vec<Preset>> {
    serde_json::from_str(json).map_err(preset_error)
}

fn preset_error(e: serde_json::Error) -> EngineError {
    EngineError::Decode(format!("preset: {e}"))
}

// ── Built-in voice and style presets ────────────────────────

/// One-click transforms layered over the current settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoicePreset {
    Child,
    Giant,
    Robot,
    Alien,
    Chorus,
    Nightcore,
    Slowed,
}

impl VoicePreset {
    pub const ALL: [VoicePreset; 7] = [
        VoicePreset::Child,
        VoicePreset::Giant,
        VoicePreset::Robot,
        VoicePreset::Alien,
        VoicePreset::Chorus,
        VoicePreset::Nightcore,
        VoicePreset::Slowed,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            VoicePreset::Child => "Child",
            VoicePreset::Giant => "Giant",
            VoicePreset::Robot => "Robot",
            VoicePreset::Alien => "Alien",
            VoicePreset::Chorus => "Chorus",
            VoicePreset::Nightcore => "Nightcore",
            VoicePreset::Slowed => "Slowed",
        }
    }

    /// Apply to `params`. Ring mod, vibrato and backing vocals are cleared
    /// first so presets do not stack.
    pub fn apply(&self, params: &mut ParameterSet) {
        params.ring_mod_amount = 0.0;
        params.vibrato_depth = 0.0;
        params.backing_vocals_amount = 0.0;

        match self {
            VoicePreset::Child => {
                params.pitch_semitones = 6.0;
                params.time_stretch = 1.0;
                params.eq_bass = -5.0;
                params.eq_air = 5.0;
            }
            VoicePreset::Giant => {
                params.pitch_semitones = -4.0;
                params.time_stretch = 1.0;
                params.eq_bass = 8.0;
                params.eq_air = -5.0;
                params.drive = 0.2;
            }
            VoicePreset::Robot => {
                params.pitch_semitones = 0.0;
                params.ring_mod_amount = 0.6;
                params.drive = 0.4;
            }
            VoicePreset::Alien => {
                params.pitch_semitones = 0.0;
                params.vibrato_depth = 8.0;
                params.vibrato_rate_hz = 10.0;
                params.delay_mix = 0.2;
            }
            VoicePreset::Chorus => {
                params.backing_vocals_amount = 0.6;
                params.reverb_mix = 0.3;
                params.stereo_width = 0.8;
            }
            VoicePreset::Nightcore => {
                params.pitch_semitones = 3.0;
                params.time_stretch = 0.88;
                params.eq_air = 3.0;
                params.denoise = 0.0;
            }
            VoicePreset::Slowed => {
                params.pitch_semitones = -3.0;
                params.time_stretch = 1.15;
                params.reverb_mix = 0.5;
                params.reverb_decay_sec = 2.5;
                params.eq_bass = 4.0;
            }
        }
    }

    /// By-value form of [`apply`](Self::apply).
    pub fn applied_to(&self, mut params: ParameterSet) -> ParameterSet {
        self.apply(&mut params);
        params
    }
}

impl fmt::Display for VoicePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VoicePreset {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        VoicePreset::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EngineError::GraphConstruction(format!("unknown voice preset '{s}'")))
    }
}
