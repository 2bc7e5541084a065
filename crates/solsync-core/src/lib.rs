//! solsync-core - Core library for solsync
//!
//! This crate contains the capture engine, the serialized storage queue, the
//! repository path deriver, and the sync engine shared by every solsync
//! front end.

pub mod auth;
pub mod capture;
pub mod config;
pub mod error;
pub mod language;
pub mod models;
pub mod pipeline;
pub mod queue;
pub mod remote;
pub mod repo_path;
pub mod store;
pub mod submissions;
pub mod sync;
pub mod util;

pub use error::{Error, ErrorKind, Result};
pub use models::{Submission, SubmissionId, SubmissionStatus};
