//! Submission model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{ProblemId, SubmissionMetadata};
use crate::error::{Error, ErrorKind, Result};
use crate::language::{validate_code, Language};
use crate::util::{compact_text, unix_millis_now};

/// A unique identifier for a submission, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubmissionId(Uuid);

impl SubmissionId {
    /// Create a new unique submission ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for SubmissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SubmissionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Lifecycle of a submission.
///
/// ```text
/// pending -> syncing -> synced
///              |  \
///              |   -> failed -> pending (retry)
///              -> pending (interrupted)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Syncing,
    Synced,
    Failed,
}

impl SubmissionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Failed => "failed",
        }
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Syncing)
                | (Self::Syncing, Self::Synced | Self::Failed | Self::Pending)
                | (Self::Failed, Self::Pending)
        )
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "syncing" => Ok(Self::Syncing),
            "synced" => Ok(Self::Synced),
            "failed" => Ok(Self::Failed),
            other => Err(Error::InvalidInput(format!("unknown status '{other}'"))),
        }
    }
}

/// Last recorded sync failure, kept for later inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFailure {
    pub kind: ErrorKind,
    pub message: String,
    /// When the failure was recorded (Unix ms)
    pub at: i64,
}

impl SyncFailure {
    pub fn from_error(error: &Error) -> Self {
        Self {
            kind: error.kind(),
            message: compact_text(&error.to_string()),
            at: unix_millis_now(),
        }
    }
}

/// A validated capture plus its problem metadata.
///
/// The captured code is fixed at construction; a later edit is a new
/// submission. Status only changes through [`Submission::transition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub problem: ProblemId,
    code: String,
    pub language: Language,
    pub metadata: SubmissionMetadata,
    status: SubmissionStatus,
    /// Enqueue timestamp (Unix ms)
    pub added_at: i64,
    /// Last sync attempt timestamp (Unix ms)
    #[serde(default)]
    pub last_attempt_at: Option<i64>,
    /// Number of sync passes that ended in `failed`
    #[serde(default)]
    pub sync_attempts: u32,
    #[serde(default)]
    pub last_error: Option<SyncFailure>,
    /// Repository path the submission was written to
    #[serde(default)]
    pub remote_path: Option<String>,
    /// When the submission reached `synced` (Unix ms)
    #[serde(default)]
    pub synced_at: Option<i64>,
    /// Earliest start of the next sync (Unix ms), set from a rate-limit
    /// reset hint
    #[serde(default)]
    pub not_before: Option<i64>,
}

impl Submission {
    /// Create a pending submission from captured code.
    ///
    /// The code is trimmed and validated for `language`; invalid code never
    /// becomes a submission.
    pub fn new(
        problem: ProblemId,
        code: impl AsRef<str>,
        language: Language,
        metadata: SubmissionMetadata,
    ) -> Result<Self> {
        let code = code.as_ref().trim();
        validate_code(code, &language).map_err(Error::ValidationFailed)?;

        Ok(Self {
            id: SubmissionId::new(),
            problem,
            code: code.to_string(),
            language,
            metadata: metadata.normalized(),
            status: SubmissionStatus::Pending,
            added_at: unix_millis_now(),
            last_attempt_at: None,
            sync_attempts: 0,
            last_error: None,
            remote_path: None,
            synced_at: None,
            not_before: None,
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub const fn status(&self) -> SubmissionStatus {
        self.status
    }

    /// Move to `next`, rejecting skipped or backwards transitions.
    pub fn transition(&mut self, next: SubmissionStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidInput(format!(
                "invalid status transition {} -> {} for {}",
                self.status, next, self.problem
            )));
        }
        self.status = next;
        Ok(())
    }

    /// `pending -> syncing`, stamping the attempt time.
    pub fn begin_sync(&mut self, now: i64) -> Result<()> {
        self.transition(SubmissionStatus::Syncing)?;
        self.last_attempt_at = Some(now);
        self.not_before = None;
        Ok(())
    }

    /// `syncing -> pending` without consuming a pass; the next sync waits
    /// until `until`.
    pub fn defer_sync(&mut self, until: i64) -> Result<()> {
        self.transition(SubmissionStatus::Pending)?;
        self.not_before = Some(until);
        Ok(())
    }

    /// Whether a rate-limit deferral still holds at `now`.
    pub fn is_deferred(&self, now: i64) -> bool {
        self.not_before.is_some_and(|until| now < until)
    }

    /// `syncing -> synced`, recording where the file landed.
    pub fn complete_sync(&mut self, remote_path: impl Into<String>, now: i64) -> Result<()> {
        self.transition(SubmissionStatus::Synced)?;
        self.remote_path = Some(remote_path.into());
        self.synced_at = Some(now);
        self.last_error = None;
        Ok(())
    }

    /// `syncing -> failed`, recording the last error and consuming one pass.
    pub fn fail_sync(&mut self, failure: SyncFailure) -> Result<()> {
        self.transition(SubmissionStatus::Failed)?;
        self.sync_attempts = self.sync_attempts.saturating_add(1);
        self.last_error = Some(failure);
        Ok(())
    }

    /// Whether this submission carries the same problem and code as `other`.
    pub fn is_same_capture(&self, other: &Self) -> bool {
        self.problem == other.problem && self.code == other.code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Submission {
        Submission::new(
            ProblemId::new(1, "two-sum"),
            "\n  class Solution:\n    def twoSum(self): pass  \n",
            Language::Python3,
            SubmissionMetadata::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_submission_id_parse() {
        let id = SubmissionId::new();
        let parsed: SubmissionId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn new_submission_is_trimmed_and_pending() {
        let submission = sample();
        assert_eq!(submission.status(), SubmissionStatus::Pending);
        assert!(submission.code().starts_with("class Solution"));
        assert!(submission.code().ends_with("pass"));
        assert!(submission.added_at > 0);
        assert!(submission.last_attempt_at.is_none());
    }

    #[test]
    fn new_submission_rejects_invalid_code() {
        let error = Submission::new(
            ProblemId::new(1, "two-sum"),
            "   ",
            Language::Python3,
            SubmissionMetadata::default(),
        )
        .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ValidationFailed);
    }

    #[test]
    fn status_cannot_skip_syncing() {
        let mut submission = sample();
        assert!(submission.transition(SubmissionStatus::Synced).is_err());
        assert!(submission.transition(SubmissionStatus::Failed).is_err());
        assert_eq!(submission.status(), SubmissionStatus::Pending);
    }

    #[test]
    fn full_lifecycle_with_retry() {
        let mut submission = sample();
        submission.begin_sync(10).unwrap();
        assert_eq!(submission.last_attempt_at, Some(10));

        submission
            .fail_sync(SyncFailure::from_error(&Error::Offline))
            .unwrap();
        assert_eq!(submission.status(), SubmissionStatus::Failed);
        assert_eq!(submission.sync_attempts, 1);

        submission.transition(SubmissionStatus::Pending).unwrap();
        submission.begin_sync(20).unwrap();
        submission.complete_sync("Array/Easy/0001-two-sum.py", 21).unwrap();
        assert_eq!(submission.status(), SubmissionStatus::Synced);
        assert!(submission.last_error.is_none());
        assert_eq!(
            submission.remote_path.as_deref(),
            Some("Array/Easy/0001-two-sum.py")
        );
    }

    #[test]
    fn deferred_sync_returns_to_pending_until_reset() {
        let mut submission = sample();
        submission.begin_sync(10).unwrap();
        submission.defer_sync(5_000).unwrap();

        assert_eq!(submission.status(), SubmissionStatus::Pending);
        assert_eq!(submission.sync_attempts, 0);
        assert!(submission.is_deferred(4_999));
        assert!(!submission.is_deferred(5_000));

        submission.begin_sync(6_000).unwrap();
        assert_eq!(submission.not_before, None);
    }

    #[test]
    fn synced_is_final() {
        for next in [
            SubmissionStatus::Pending,
            SubmissionStatus::Syncing,
            SubmissionStatus::Failed,
        ] {
            assert!(!SubmissionStatus::Synced.can_transition_to(next));
        }
        assert!(SubmissionStatus::Syncing.can_transition_to(SubmissionStatus::Pending));
        assert!(!SubmissionStatus::Pending.can_transition_to(SubmissionStatus::Pending));
        assert!(!SubmissionStatus::Failed.can_transition_to(SubmissionStatus::Syncing));
    }

    #[test]
    fn status_round_trips_through_serde() {
        let json = serde_json::to_string(&SubmissionStatus::Syncing).unwrap();
        assert_eq!(json, "\"syncing\"");
        assert_eq!(
            "FAILED".parse::<SubmissionStatus>().unwrap(),
            SubmissionStatus::Failed
        );
    }
}
