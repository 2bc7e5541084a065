//! Data models for solsync

mod problem;
mod submission;

pub use problem::{Difficulty, ProblemId, SubmissionMetadata};
pub use submission::{Submission, SubmissionId, SubmissionStatus, SyncFailure};
