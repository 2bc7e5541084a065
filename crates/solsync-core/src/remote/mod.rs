//! Remote content host the sync engine writes to.

mod github;

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use github::{
    classify_response, GitHubClient, DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT,
};

/// Repository and branch that receive solutions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoTarget {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl RepoTarget {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            owner: owner.into().trim().to_string(),
            repo: repo.into().trim().to_string(),
            branch: branch.into().trim().to_string(),
        }
    }
}

impl fmt::Display for RepoTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.branch)
    }
}

/// A file as it currently exists on the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub path: String,
    /// Blob sha, required to update the file
    pub sha: String,
    /// Decoded content, when the host returned it as text
    pub content: Option<String>,
}

/// Create or update one file in a single commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCommit {
    pub path: String,
    pub content: String,
    pub message: String,
    /// Sha of the file being replaced; `None` creates a new file
    pub sha: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub path: String,
    pub content_sha: Option<String>,
    pub commit_sha: Option<String>,
    /// Whether the file did not exist before
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySummary {
    pub full_name: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUser {
    pub login: String,
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
}

/// Content-hosting API used by the sync engine.
///
/// Implementations map host responses onto the crate error taxonomy:
/// expired credentials are [`crate::Error::AuthExpired`], throttling is
/// [`crate::Error::RateLimited`], and a missing file on read is `Ok(None)`.
pub trait RemoteRepository: Send + Sync {
    fn get_file(&self, path: &str) -> impl Future<Output = Result<Option<RemoteFile>>> + Send;

    fn put_file(&self, commit: &FileCommit) -> impl Future<Output = Result<CommitOutcome>> + Send;

    fn list_repositories(&self) -> impl Future<Output = Result<Vec<RepositorySummary>>> + Send;
}
