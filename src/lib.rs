pub mod analysis;
pub mod buffer;
pub mod dsp;
pub mod error;
pub mod graph;
pub mod params;
pub mod preset;
pub mod remix;
pub mod render;
pub mod wav;

pub use crate::buffer::PcmBuffer;
pub use crate::error::{EngineError, Result};
pub use crate::params::{ParameterSet, RemixAlignment, Suggestions};

use log::warn;
use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{e}"))
}

/// WASM-exposed: return the raiwave-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// WASM-exposed: decode a WAV, render it with `params_json` and return WAV bytes.
#[wasm_bindgen]
pub fn render_enhanced_wav(wav_bytes: &[u8], params_json: &str) -> std::result::Result<Vec<u8>, JsValue> {
    let params = ParameterSet::from_json(params_json).map_err(js_error)?;
    let source = wav::decode_wav(wav_bytes).map_err(js_error)?;
    render::render_wav(&source, &params).map_err(js_error)
}

/// WASM-exposed: render the first ten seconds only, for auditioning settings.
#[wasm_bindgen]
pub fn preview_enhanced_wav(wav_bytes: &[u8], params_json: &str) -> std::result::Result<Vec<u8>, JsValue> {
    let params = ParameterSet::from_json(params_json).map_err(js_error)?;
    let source = wav::decode_wav(wav_bytes).map_err(js_error)?;
    let preview = render::render_preview(&source, &params).map_err(js_error)?;
    Ok(wav::encode_wav(&preview))
}

/// WASM-exposed: suggest settings for a WAV. Unreadable input yields `{}`.
#[wasm_bindgen]
pub fn analyze_wav(wav_bytes: &[u8]) -> std::result::Result<JsValue, JsValue> {
    let suggestions = match wav::decode_wav(wav_bytes) {
        Ok(source) => analysis::analyze(&source),
        Err(e) => {
            warn!("analysis skipped: {e}");
            Suggestions::default()
        }
    };
    serde_wasm_bindgen::to_value(&suggestions).map_err(js_error)
}

/// WASM-exposed: align and blend two WAVs into one remix WAV.
#[wasm_bindgen]
pub fn mix_wav(wav_a: &[u8], wav_b: &[u8], alignment_json: &str) -> std::result::Result<Vec<u8>, JsValue> {
    let alignment = RemixAlignment::from_json(alignment_json).map_err(|_| js_error(EngineError::Mix))?;
    remix::mix_wav(wav_a, wav_b, &alignment).map_err(js_error)
}
