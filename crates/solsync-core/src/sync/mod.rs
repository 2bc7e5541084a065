//! Pushes queued submissions to the remote repository.
//!
//! One submission at a time: `pending -> syncing -> synced | failed`, with
//! bounded retries and exponential backoff inside a single pass. Status
//! changes go through the [`SubmissionRepository`] and therefore the
//! storage queue.

mod connectivity;
mod policy;

use serde::Serialize;

use crate::error::{Error, ErrorKind, Result};
use crate::models::{ProblemId, Submission, SubmissionId, SubmissionStatus, SyncFailure};
use crate::remote::{FileCommit, RemoteRepository};
use crate::repo_path::{generate_commit_message, generate_file_path, render_file_content};
use crate::submissions::SubmissionRepository;
use crate::util::unix_millis_now;

pub use connectivity::{Connectivity, ConnectivityFlag};
pub use policy::{
    RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RATE_LIMIT_CAP, DEFAULT_RATE_LIMIT_DELAY,
    DEFAULT_RETRY_BACKOFF, DEFAULT_RETRY_DELAY, DEFAULT_SYNC_PASS_BUDGET,
};

/// Result of one successful `sync_submission`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub id: SubmissionId,
    pub problem: ProblemId,
    pub path: String,
    /// The remote file did not exist before
    pub created: bool,
    /// The remote file already had identical content; nothing was committed
    pub unchanged: bool,
    /// Attempts used, including the successful one
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub id: SubmissionId,
    pub problem: ProblemId,
    pub kind: ErrorKind,
    pub message: String,
}

/// Summary of a `sync_pending` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Interrupted `syncing` entries moved back to `pending`
    pub recovered: usize,
    /// `failed` entries moved back to `pending`
    pub requeued: usize,
    /// `pending` entries skipped because a rate-limit reset is still ahead
    pub deferred: usize,
    pub synced: Vec<SyncReport>,
    pub failed: Vec<BatchFailure>,
    /// Set when the pass ended early for a reason that affects every
    /// remaining submission
    pub stopped: Option<ErrorKind>,
}

#[derive(Debug)]
struct PushOutcome {
    created: bool,
    unchanged: bool,
    attempts: u32,
}

pub struct SyncEngine<R, C> {
    remote: R,
    connectivity: C,
    repository: SubmissionRepository,
    policy: RetryPolicy,
}

impl<R: RemoteRepository, C: Connectivity> SyncEngine<R, C> {
    pub const fn new(
        remote: R,
        connectivity: C,
        repository: SubmissionRepository,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            remote,
            connectivity,
            repository,
            policy,
        }
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Push one pending submission.
    ///
    /// Offline fails fast without touching the submission. Expired
    /// credentials put it back to `pending`. A rate limit puts it back to
    /// `pending` held until the server's reset time. Any other error that
    /// survives the retry schedule leaves it `failed` with the error
    /// recorded.
    pub async fn sync_submission(&self, submission: &Submission) -> Result<SyncReport> {
        if !self.connectivity.is_online() {
            return Err(Error::Offline);
        }

        let id = submission.id;
        let submission = self.repository.begin_sync(id).await?;
        let path = generate_file_path(&submission);
        tracing::info!(problem = %submission.problem, %path, "Syncing submission");

        match self.push_with_retry(&submission, &path).await {
            Ok(outcome) => {
                self.repository.complete_sync(id, path.clone()).await?;
                tracing::info!(problem = %submission.problem, %path, attempts = outcome.attempts, "Submission synced");
                Ok(SyncReport {
                    id,
                    problem: submission.problem,
                    path,
                    created: outcome.created,
                    unchanged: outcome.unchanged,
                    attempts: outcome.attempts,
                })
            }
            Err(error @ (Error::AuthExpired | Error::Offline)) => {
                self.repository.revert_to_pending(id).await?;
                tracing::warn!(problem = %submission.problem, %error, "Sync interrupted; submission left pending");
                Err(error)
            }
            Err(Error::RateLimited { retry_after }) => {
                let wait = retry_after.unwrap_or_else(|| {
                    self.policy
                        .rate_limit_delay_for(self.policy.max_retries, None)
                        .unwrap_or(self.policy.rate_limit_cap)
                });
                let until = unix_millis_now()
                    .saturating_add(i64::try_from(wait.as_millis()).unwrap_or(i64::MAX));
                self.repository.defer_sync(id, until).await?;
                tracing::warn!(problem = %submission.problem, ?wait, "Rate limited; submission deferred");
                Err(Error::RateLimited { retry_after })
            }
            Err(error) => {
                self.repository
                    .fail_sync(id, SyncFailure::from_error(&error))
                    .await?;
                tracing::warn!(problem = %submission.problem, kind = %error.kind(), %error, "Submission sync failed");
                Err(error)
            }
        }
    }

    /// Drain every pending submission in capture order.
    ///
    /// Interrupted syncs are recovered and eligible failures requeued first.
    /// Submissions deferred by a rate limit are skipped until their reset
    /// time. A failing submission does not stop the pass; going offline,
    /// losing authorization or hitting a rate limit does.
    pub async fn sync_pending(&self) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        if !self.connectivity.is_online() {
            report.stopped = Some(ErrorKind::Offline);
            return Ok(report);
        }

        report.recovered = self.repository.recover_interrupted().await?.len();
        let policy = self.policy;
        let now = unix_millis_now();
        report.requeued = self
            .repository
            .requeue_failed(move |submission| is_due_for_retry(&policy, submission, now))
            .await?
            .len();

        let mut pending = self
            .repository
            .list_by_status(SubmissionStatus::Pending)
            .await?;
        pending.sort_by_key(|submission| submission.added_at);
        let before = pending.len();
        pending.retain(|submission| !submission.is_deferred(now));
        report.deferred = before - pending.len();
        tracing::info!(
            pending = pending.len(),
            deferred = report.deferred,
            recovered = report.recovered,
            requeued = report.requeued,
            "Starting sync pass"
        );

        for submission in &pending {
            match self.sync_submission(submission).await {
                Ok(synced) => report.synced.push(synced),
                Err(
                    error @ (Error::Offline | Error::AuthExpired | Error::RateLimited { .. }),
                ) => {
                    report.stopped = Some(error.kind());
                    break;
                }
                Err(error) => report.failed.push(BatchFailure {
                    id: submission.id,
                    problem: submission.problem.clone(),
                    kind: error.kind(),
                    message: error.to_string(),
                }),
            }
        }

        Ok(report)
    }

    async fn push_with_retry(&self, submission: &Submission, path: &str) -> Result<PushOutcome> {
        let total = self.policy.total_attempts();
        let mut attempt = 0;

        loop {
            if attempt > 0 && !self.connectivity.is_online() {
                return Err(Error::Offline);
            }

            let error = match self.push_once(submission, path).await {
                Ok((created, unchanged)) => {
                    return Ok(PushOutcome {
                        created,
                        unchanged,
                        attempts: attempt + 1,
                    })
                }
                Err(error) => error,
            };

            if error.is_terminal() || attempt + 1 >= total {
                return Err(error);
            }
            let delay = match &error {
                Error::RateLimited { retry_after } => {
                    match self.policy.rate_limit_delay_for(attempt, *retry_after) {
                        Some(delay) => delay,
                        None => return Err(error),
                    }
                }
                error if error.is_transient() => self.policy.delay_for(attempt),
                _ => return Err(error),
            };

            tracing::warn!(
                attempt = attempt + 1,
                total,
                ?delay,
                %error,
                "Sync attempt failed; retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Read the remote file, then create or update it. Returns
    /// `(created, unchanged)`.
    async fn push_once(&self, submission: &Submission, path: &str) -> Result<(bool, bool)> {
        let content = render_file_content(submission);
        let existing = self.remote.get_file(path).await?;

        if let Some(file) = &existing {
            if file.content.as_deref() == Some(content.as_str()) {
                tracing::debug!(%path, "Remote file already up to date");
                return Ok((false, true));
            }
        }

        let is_update = existing.is_some();
        let commit = FileCommit {
            path: path.to_string(),
            content,
            message: generate_commit_message(submission, is_update),
            sha: existing.map(|file| file.sha),
        };
        let outcome = self.remote.put_file(&commit).await?;
        Ok((outcome.created || !is_update, false))
    }
}

/// Whether a failed submission should return to `pending` this pass.
fn is_due_for_retry(policy: &RetryPolicy, submission: &Submission, now: i64) -> bool {
    if submission.sync_attempts >= policy.sync_pass_budget {
        return false;
    }
    if submission.is_deferred(now) {
        return false;
    }
    let wait = i64::try_from(policy.requeue_after(submission.sync_attempts).as_millis())
        .unwrap_or(i64::MAX);
    submission
        .last_attempt_at
        .map_or(true, |last| now.saturating_sub(last) >= wait)
}
