use thiserror::Error;

/// Errors produced by a single render, preview, or mix invocation.
///
/// None of these leave state behind: every call owns its graph and buffers,
/// so a failed call can simply be retried.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The source could not be read or is not a usable PCM buffer.
    #[error("Decode failed: {0}")]
    Decode(String),

    /// The parameter set describes a graph that cannot be built safely
    /// (e.g. a diverging feedback loop).
    #[error("Invalid parameters: {0}")]
    GraphConstruction(String),

    /// Graph execution failed (non-finite output, impossible buffer size).
    #[error("Processing failed: {0}")]
    Render(String),

    /// Either remix source failed to decode or the combined render failed.
    /// Sources are deliberately not reported individually.
    #[error("mixing failed")]
    Mix,
}

impl From<hound::Error> for EngineError {
    fn from(e: hound::Error) -> Self {
        EngineError::Decode(e.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mix_error_is_aggregate() {
        assert_eq!(EngineError::Mix.to_string(), "mixing failed");
    }

    #[test]
    fn hound_errors_become_decode_failures() {
        let err: EngineError = hound::Error::FormatError("no riff").into();
        assert!(matches!(err, EngineError::Decode(_)));
    }
}
