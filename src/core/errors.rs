// Custom error types for better error handling and debugging
//
// Using thiserror for ergonomic error definitions with:
// - Context preservation
// - Type-safe error matching
// - Automatic Display/Error trait implementations
// - Source error chaining

use thiserror::Error;

use crate::pipeline::StageKind;

/// Fixed remediation suggestions returned alongside `NoTextDetected`.
pub const NO_TEXT_SUGGESTIONS: [&str; 4] = [
    "Make sure the image is clear and not blurry",
    "Ensure the text is printed (not handwritten)",
    "Try a higher resolution image",
    "Check if the image contains readable text",
];

/// Region extraction errors
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("no text detected after {attempts} OCR attempts")]
    NoTextDetected {
        attempts: usize,
        /// Engine failures recorded while walking the ladder, surfaced only
        /// once every strategy has failed.
        attempt_errors: Vec<String>,
    },
}

impl ExtractionError {
    pub fn suggestions(&self) -> &'static [&'static str] {
        &NO_TEXT_SUGGESTIONS
    }
}

/// Agent pipeline errors. Any reached stage that fails aborts the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline stage {stage} failed: {source}")]
    StageFailed {
        stage: StageKind,
        #[source]
        source: anyhow::Error,
    },

    #[error("pipeline stage {stage} timed out after {seconds}s")]
    StageTimedOut { stage: StageKind, seconds: u64 },
}

/// Session store errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session {0} not found or expired")]
    NotFound(String),
}

/// Upload processing errors, combining the recoverable and fatal cases the
/// request surface has to distinguish.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("invalid image: {0}")]
    InvalidImage(#[from] image::ImageError),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("OCR endpoint must not be empty (set OCR_ENDPOINT)")]
    MissingOcrEndpoint,

    #[error("LLM endpoint must not be empty (set LLM_ENDPOINT)")]
    MissingLlmEndpoint,

    #[error("direct translation concurrency must be > 0, got {0}")]
    InvalidConcurrency(usize),

    #[error("session TTL must be > 0 seconds, got {0}")]
    InvalidSessionTtl(u64),

    #[error("stage timeout must be > 0 seconds ({0})")]
    InvalidStageTimeout(String),
}

// Convenience type aliases for Results
pub type ExtractionResult<T> = Result<T, ExtractionError>;
pub type PipelineResult<T> = Result<T, PipelineError>;
