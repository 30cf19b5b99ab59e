use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Expected exactly 3 band indices, got {count}")]
    InvalidBands { count: usize },

    #[error("Missing required argument: {arg}")]
    MissingArgument { arg: String },

    #[error(transparent)]
    Geoscope(#[from] geoscope::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
