//! Submission list persisted through the storage queue.
//!
//! The whole list lives under [`SUBMISSIONS_KEY`]; every change is a single
//! queued read-modify-write so concurrent callers never clobber each other.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::language::Language;
use crate::models::{Submission, SubmissionId, SubmissionStatus, SyncFailure};
use crate::queue::{StorageHealth, StorageQueue, SUBMISSIONS_KEY};
use crate::util::unix_millis_now;

/// Key caching the most recently captured language.
pub const LAST_LANGUAGE_KEY: &str = "solsync.last_language";

/// What `enqueue` did with a new submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Inserted,
    /// An earlier capture of the same problem with different code was
    /// dropped in favor of the new one.
    Replaced { previous: SubmissionId },
}

#[derive(Debug, Clone)]
pub struct SubmissionRepository {
    queue: StorageQueue,
}

impl SubmissionRepository {
    pub const fn new(queue: StorageQueue) -> Self {
        Self { queue }
    }

    pub const fn queue(&self) -> &StorageQueue {
        &self.queue
    }

    /// Add a freshly validated submission.
    ///
    /// A capture identical to a stored one for the same problem is rejected
    /// as [`Error::Duplicate`], as is any capture of a problem that is
    /// currently syncing. Otherwise an older entry for the problem is
    /// replaced, so each problem appears at most once.
    pub async fn enqueue(&self, submission: Submission) -> Result<EnqueueOutcome> {
        if submission.status() != SubmissionStatus::Pending {
            return Err(Error::InvalidInput(format!(
                "only pending submissions can be enqueued, got {}",
                submission.status()
            )));
        }

        let problem = submission.problem.clone();
        let outcome = self
            .queue
            .update(SUBMISSIONS_KEY, move |current| {
                let mut submissions = decode(current)?;
                let outcome = match submissions
                    .iter()
                    .position(|existing| existing.problem == submission.problem)
                {
                    Some(index) => {
                        let existing = &submissions[index];
                        if existing.is_same_capture(&submission)
                            || existing.status() == SubmissionStatus::Syncing
                        {
                            return Err(Error::Duplicate(submission.problem.to_string()));
                        }
                        let previous = submissions.remove(index).id;
                        EnqueueOutcome::Replaced { previous }
                    }
                    None => EnqueueOutcome::Inserted,
                };
                submissions.push(submission);
                Ok((Some(encode(&submissions)?), outcome))
            })
            .wait()
            .await?;

        tracing::info!(%problem, ?outcome, "Submission enqueued");
        Ok(outcome)
    }

    pub async fn list(&self) -> Result<Vec<Submission>> {
        decode(self.queue.get(SUBMISSIONS_KEY).wait().await?)
    }

    pub async fn list_by_status(&self, status: SubmissionStatus) -> Result<Vec<Submission>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|submission| submission.status() == status)
            .collect())
    }

    pub async fn get(&self, id: SubmissionId) -> Result<Submission> {
        self.list()
            .await?
            .into_iter()
            .find(|submission| submission.id == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    pub async fn remove(&self, id: SubmissionId) -> Result<()> {
        self.queue
            .update(SUBMISSIONS_KEY, move |current| {
                let mut submissions = decode(current)?;
                let before = submissions.len();
                submissions.retain(|submission| submission.id != id);
                if submissions.len() == before {
                    return Err(Error::NotFound(id.to_string()));
                }
                Ok((Some(encode(&submissions)?), ()))
            })
            .wait()
            .await
    }

    /// `pending -> syncing`
    pub async fn begin_sync(&self, id: SubmissionId) -> Result<Submission> {
        self.modify(id, |submission| submission.begin_sync(unix_millis_now()))
            .await
    }

    /// `syncing -> synced`
    pub async fn complete_sync(
        &self,
        id: SubmissionId,
        remote_path: impl Into<String>,
    ) -> Result<Submission> {
        let remote_path = remote_path.into();
        self.modify(id, move |submission| {
            submission.complete_sync(remote_path, unix_millis_now())
        })
        .await
    }

    /// `syncing -> failed`
    pub async fn fail_sync(&self, id: SubmissionId, failure: SyncFailure) -> Result<Submission> {
        self.modify(id, move |submission| submission.fail_sync(failure))
            .await
    }

    /// `syncing -> pending`, used when a sync pass is cut short.
    pub async fn revert_to_pending(&self, id: SubmissionId) -> Result<Submission> {
        self.modify(id, |submission| {
            submission.transition(SubmissionStatus::Pending)
        })
        .await
    }

    /// `syncing -> pending` after a rate limit, holding the submission back
    /// until `until` (Unix ms).
    pub async fn defer_sync(&self, id: SubmissionId, until: i64) -> Result<Submission> {
        self.modify(id, move |submission| submission.defer_sync(until))
            .await
    }

    /// Manual `failed -> pending`.
    pub async fn retry_failed(&self, id: SubmissionId) -> Result<Submission> {
        self.modify(id, |submission| {
            if submission.status() != SubmissionStatus::Failed {
                return Err(Error::InvalidInput(format!(
                    "{} is {}, only failed submissions can be retried",
                    submission.problem,
                    submission.status()
                )));
            }
            submission.transition(SubmissionStatus::Pending)
        })
        .await
    }

    /// Manual `failed -> pending` for every failed submission.
    pub async fn retry_all_failed(&self) -> Result<Vec<SubmissionId>> {
        self.transition_where(SubmissionStatus::Failed, SubmissionStatus::Pending, |_| true)
            .await
    }

    /// Move submissions stuck in `syncing` back to `pending`.
    pub async fn recover_interrupted(&self) -> Result<Vec<SubmissionId>> {
        let recovered = self
            .transition_where(SubmissionStatus::Syncing, SubmissionStatus::Pending, |_| true)
            .await?;
        if !recovered.is_empty() {
            tracing::warn!(count = recovered.len(), "Recovered interrupted syncs");
        }
        Ok(recovered)
    }

    /// Scheduled `failed -> pending` for submissions `eligible` accepts.
    pub async fn requeue_failed<P>(&self, eligible: P) -> Result<Vec<SubmissionId>>
    where
        P: Fn(&Submission) -> bool + Send + 'static,
    {
        self.transition_where(SubmissionStatus::Failed, SubmissionStatus::Pending, eligible)
            .await
    }

    pub async fn last_language(&self) -> Result<Option<String>> {
        Ok(self
            .queue
            .get(LAST_LANGUAGE_KEY)
            .wait()
            .await?
            .and_then(|value| value.as_str().map(ToOwned::to_owned)))
    }

    pub async fn remember_language(&self, language: &Language) -> Result<()> {
        self.queue
            .set(LAST_LANGUAGE_KEY, Value::String(language.as_str().to_string()))
            .wait()
            .await
    }

    pub async fn check_storage_health(&self) -> Result<StorageHealth> {
        self.queue.check_storage_health().wait().await
    }

    async fn modify<F>(&self, id: SubmissionId, change: F) -> Result<Submission>
    where
        F: FnOnce(&mut Submission) -> Result<()> + Send + 'static,
    {
        let updated = self
            .queue
            .update(SUBMISSIONS_KEY, move |current| {
                let mut submissions = decode(current)?;
                let submission = submissions
                    .iter_mut()
                    .find(|submission| submission.id == id)
                    .ok_or_else(|| Error::NotFound(id.to_string()))?;
                change(submission)?;
                let updated = submission.clone();
                Ok((Some(encode(&submissions)?), updated))
            })
            .wait()
            .await?;

        tracing::debug!(problem = %updated.problem, status = %updated.status(), "Submission updated");
        Ok(updated)
    }

    async fn transition_where<P>(
        &self,
        from: SubmissionStatus,
        to: SubmissionStatus,
        predicate: P,
    ) -> Result<Vec<SubmissionId>>
    where
        P: Fn(&Submission) -> bool + Send + 'static,
    {
        self.queue
            .update(SUBMISSIONS_KEY, move |current| {
                let mut submissions = decode(current)?;
                let mut moved = Vec::new();
                for submission in &mut submissions {
                    if submission.status() == from && predicate(submission) {
                        submission.transition(to)?;
                        moved.push(submission.id);
                    }
                }
                if moved.is_empty() {
                    return Ok((None, moved));
                }
                Ok((Some(encode(&submissions)?), moved))
            })
            .wait()
            .await
    }
}

fn decode(value: Option<Value>) -> Result<Vec<Submission>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => Ok(serde_json::from_value(value)?),
    }
}

fn encode(submissions: &[Submission]) -> Result<Value> {
    Ok(serde_json::to_value(submissions)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::{Difficulty, ProblemId, SubmissionMetadata};
    use crate::queue::QueueOptions;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn repository() -> SubmissionRepository {
        SubmissionRepository::new(StorageQueue::spawn(
            MemoryStore::new(),
            QueueOptions::default(),
        ))
    }

    fn submission(number: u32, slug: &str, body: &str) -> Submission {
        Submission::new(
            ProblemId::new(number, slug),
            format!("class Solution:\n    {body}"),
            Language::Python3,
            SubmissionMetadata {
                title: slug.to_string(),
                difficulty: Difficulty::Easy,
                topics: vec!["Array".to_string()],
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn enqueue_then_list() {
        let repo = repository();
        let first = submission(1, "two-sum", "pass");
        let id = first.id;

        assert_eq!(repo.enqueue(first).await.unwrap(), EnqueueOutcome::Inserted);
        let listed = repo.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
        assert_eq!(repo.get(id).await.unwrap().problem.slug, "two-sum");
    }

    #[tokio::test]
    async fn identical_capture_is_duplicate() {
        let repo = repository();
        repo.enqueue(submission(1, "two-sum", "pass")).await.unwrap();

        let error = repo
            .enqueue(submission(1, "two-sum", "pass"))
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Duplicate);
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn different_code_replaces_previous_capture() {
        let repo = repository();
        let first = submission(1, "two-sum", "pass");
        let first_id = first.id;
        repo.enqueue(first).await.unwrap();

        let second = submission(1, "two-sum", "def twoSum(self): return []");
        let second_id = second.id;
        assert_eq!(
            repo.enqueue(second).await.unwrap(),
            EnqueueOutcome::Replaced { previous: first_id }
        );

        let listed = repo.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, second_id);
    }

    #[tokio::test]
    async fn syncing_problem_rejects_new_capture() {
        let repo = repository();
        let first = submission(1, "two-sum", "pass");
        let id = first.id;
        repo.enqueue(first).await.unwrap();
        repo.begin_sync(id).await.unwrap();

        let error = repo
            .enqueue(submission(1, "two-sum", "def other(self): pass"))
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Duplicate);
    }

    #[tokio::test]
    async fn concurrent_enqueues_keep_every_problem() {
        let repo = SubmissionRepository::new(StorageQueue::spawn(
            MemoryStore::new().with_latency(Duration::from_millis(1)),
            QueueOptions::default(),
        ));

        let tasks: Vec<_> = (1..=8)
            .map(|number| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    repo.enqueue(submission(number, &format!("problem-{number}"), "pass"))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(repo.list().await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn status_flow_through_repository() {
        let repo = repository();
        let first = submission(1, "two-sum", "pass");
        let id = first.id;
        repo.enqueue(first).await.unwrap();

        let error = repo.complete_sync(id, "x").await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidInput);

        repo.begin_sync(id).await.unwrap();
        repo.fail_sync(id, SyncFailure::from_error(&Error::Offline))
            .await
            .unwrap();
        assert_eq!(
            repo.list_by_status(SubmissionStatus::Failed).await.unwrap().len(),
            1
        );

        let retried = repo.retry_failed(id).await.unwrap();
        assert_eq!(retried.status(), SubmissionStatus::Pending);
        assert_eq!(retried.sync_attempts, 1);
        assert!(repo.retry_failed(id).await.is_err());
    }

    #[tokio::test]
    async fn recover_interrupted_resets_syncing() {
        let repo = repository();
        let first = submission(1, "two-sum", "pass");
        let second = submission(2, "add-two-numbers", "pass");
        let (first_id, second_id) = (first.id, second.id);
        repo.enqueue(first).await.unwrap();
        repo.enqueue(second).await.unwrap();
        repo.begin_sync(first_id).await.unwrap();

        assert_eq!(repo.recover_interrupted().await.unwrap(), vec![first_id]);
        assert_eq!(
            repo.get(first_id).await.unwrap().status(),
            SubmissionStatus::Pending
        );
        assert_eq!(
            repo.get(second_id).await.unwrap().status(),
            SubmissionStatus::Pending
        );
        assert!(repo.recover_interrupted().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn requeue_failed_respects_predicate() {
        let repo = repository();
        for number in 1..=2 {
            let entry = submission(number, &format!("p-{number}"), "pass");
            let id = entry.id;
            repo.enqueue(entry).await.unwrap();
            repo.begin_sync(id).await.unwrap();
            repo.fail_sync(id, SyncFailure::from_error(&Error::Offline))
                .await
                .unwrap();
        }

        let moved = repo
            .requeue_failed(|submission| submission.problem.number == 2)
            .await
            .unwrap();
        assert_eq!(moved.len(), 1);
        assert_eq!(
            repo.list_by_status(SubmissionStatus::Failed).await.unwrap().len(),
            1
        );
        assert_eq!(repo.retry_all_failed().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn last_language_round_trips() {
        let repo = repository();
        assert_eq!(repo.last_language().await.unwrap(), None);
        repo.remember_language(&Language::Rust).await.unwrap();
        assert_eq!(repo.last_language().await.unwrap().as_deref(), Some("rust"));
    }

    #[tokio::test]
    async fn remove_missing_is_not_found() {
        let repo = repository();
        let error = repo.remove(SubmissionId::new()).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }
}
