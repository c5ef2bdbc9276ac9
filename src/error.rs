//! Error types for the analysis pipeline.
//!
//! - `AnalysisError`: outcome of a failed call to the model API
//! - `InputError`: a submission that could not be assembled

use thiserror::Error;

/// Failure of a single analysis attempt. Terminal for that attempt.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    /// The call succeeded but carried no text.
    #[error("No response generated from AI.")]
    EmptyResponse,

    /// The text was not JSON of the expected shape.
    #[error("Failed to parse AI response: {0}")]
    ParseError(String),

    /// Network or service-level failure.
    #[error("{0}")]
    TransportError(String),
}

impl AnalysisError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::TransportError(msg.into())
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::TransportError(_))
    }
}

impl From<reqwest::Error> for AnalysisError {
    fn from(error: reqwest::Error) -> Self {
        Self::TransportError(error.to_string())
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(error: serde_json::Error) -> Self {
        Self::ParseError(error.to_string())
    }
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{path} is not an image (detected {mime})")]
    NotAnImage { path: String, mime: String },

    #[error("Failed to read image {path}: {source}")]
    ImageRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid data URI")]
    InvalidDataUri,

    #[error("Failed to decode image: {0}")]
    ImageDecode(String),
}
