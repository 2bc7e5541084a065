use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] solsync_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Submission ID cannot be empty")]
    EmptySubmissionId,
    #[error("Submission not found for id/prefix: {0}")]
    SubmissionNotFound(String),
    #[error("{0}")]
    AmbiguousSubmissionId(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Not signed in. Run `solsync auth login` first.")]
    NotSignedIn,
}
