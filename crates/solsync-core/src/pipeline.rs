//! Capture → validate → enqueue, as one entry point for trigger surfaces.

use crate::capture::{
    CaptureEngine, EditorSurface, LanguageDetector, LanguageSource, DEFAULT_MAX_ATTEMPTS,
};
use crate::error::Result;
use crate::language::Language;
use crate::models::{ProblemId, Submission, SubmissionMetadata};
use crate::submissions::{EnqueueOutcome, SubmissionRepository};

/// What a successful `capture_and_enqueue` produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOutcome {
    pub submission: Submission,
    pub enqueue: EnqueueOutcome,
    /// Name of the capture strategy that produced the code
    pub method: &'static str,
    pub language_source: LanguageSource,
}

/// Explicitly constructed context shared by every capture trigger.
#[derive(Debug, Clone)]
pub struct Pipeline {
    capture: CaptureEngine,
    detector: LanguageDetector,
    repository: SubmissionRepository,
    capture_attempts: u32,
}

impl Pipeline {
    pub fn new(repository: SubmissionRepository) -> Self {
        Self {
            capture: CaptureEngine::new(),
            detector: LanguageDetector::default(),
            repository,
            capture_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    #[must_use]
    pub fn with_capture_engine(mut self, capture: CaptureEngine) -> Self {
        self.capture = capture;
        self
    }

    #[must_use]
    pub fn with_default_language(mut self, language: Language) -> Self {
        self.detector = LanguageDetector::new(language);
        self
    }

    #[must_use]
    pub const fn with_capture_attempts(mut self, attempts: u32) -> Self {
        self.capture_attempts = attempts;
        self
    }

    pub const fn repository(&self) -> &SubmissionRepository {
        &self.repository
    }

    /// Capture the editor's code, validate it, and queue it for sync.
    ///
    /// Fails with `CaptureExhausted` when no strategy yields code, with
    /// `ValidationFailed` when the code is rejected, and with `Duplicate`
    /// when the same capture is already queued. The detected language is
    /// remembered for the next capture when the store allows it.
    pub async fn capture_and_enqueue(
        &self,
        surface: &dyn EditorSurface,
        problem: ProblemId,
        metadata: SubmissionMetadata,
    ) -> Result<CaptureOutcome> {
        let captured = self
            .capture
            .capture_code(surface, self.capture_attempts)
            .await
            .into_result()?;

        let cached = match self.repository.last_language().await {
            Ok(cached) => cached,
            Err(error) => {
                tracing::debug!(%error, "Last-used language unavailable");
                None
            }
        };
        let detected = self.detector.detect(surface, cached.as_deref());
        if !detected.language.is_known() {
            tracing::warn!(language = %detected.language, "Unrecognized language; file extension falls back to txt");
        }

        let submission = Submission::new(problem, &captured.code, detected.language, metadata)?;
        let enqueue = self.repository.enqueue(submission.clone()).await?;
        if let Err(error) = self.repository.remember_language(&submission.language).await {
            tracing::warn!(%error, "Could not remember last-used language");
        }

        tracing::info!(
            problem = %submission.problem,
            language = %submission.language,
            strategy = captured.method,
            attempt = captured.attempt,
            "Submission queued"
        );
        Ok(CaptureOutcome {
            submission,
            enqueue,
            method: captured.method,
            language_source: detected.source,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::capture::SurfaceResult;
    use crate::error::{Error, ErrorKind, ValidationFailure};
    use crate::models::SubmissionStatus;
    use crate::queue::{QueueOptions, StorageQueue};
    use crate::store::{KeyValueStore, MemoryStore};
    use crate::submissions::LAST_LANGUAGE_KEY;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    /// Rejects writes to the last-language key.
    #[derive(Default)]
    struct LanguageLockedStore(MemoryStore);

    impl KeyValueStore for LanguageLockedStore {
        async fn get(&self, key: &str) -> Result<Option<Value>> {
            self.0.get(key).await
        }

        async fn set(&self, key: &str, value: &Value) -> Result<()> {
            if key == LAST_LANGUAGE_KEY {
                return Err(Error::Storage("disk full".to_string()));
            }
            self.0.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<()> {
            self.0.remove(key).await
        }

        async fn bytes_in_use(&self) -> Result<usize> {
            self.0.bytes_in_use().await
        }
    }

    #[derive(Default)]
    struct StaticSurface {
        code: Option<String>,
        language: Option<String>,
    }

    impl EditorSurface for StaticSurface {
        fn input_surface_text(&self) -> SurfaceResult<Option<String>> {
            Ok(self.code.clone())
        }

        fn model_language(&self) -> SurfaceResult<Option<String>> {
            Ok(self.language.clone())
        }
    }

    fn pipeline() -> Pipeline {
        let queue = StorageQueue::spawn(MemoryStore::new(), QueueOptions::default());
        Pipeline::new(SubmissionRepository::new(queue))
            .with_capture_engine(CaptureEngine::new().with_retry_delay(Duration::from_millis(1)))
    }

    fn surface(code: &str, language: Option<&str>) -> StaticSurface {
        StaticSurface {
            code: Some(code.to_string()),
            language: language.map(ToOwned::to_owned),
        }
    }

    const PYTHON: &str = "class Solution:\n    def twoSum(self, nums, target):\n        return []";

    #[tokio::test]
    async fn captured_code_becomes_pending_submission() {
        let pipeline = pipeline();
        let outcome = pipeline
            .capture_and_enqueue(
                &surface(PYTHON, Some("py")),
                ProblemId::new(1, "two-sum"),
                SubmissionMetadata::default(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.enqueue, EnqueueOutcome::Inserted);
        assert_eq!(outcome.language_source, LanguageSource::EditorModel);
        assert_eq!(outcome.submission.language, Language::Python3);
        assert_eq!(outcome.submission.status(), SubmissionStatus::Pending);

        let stored = pipeline.repository().list().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(
            pipeline.repository().last_language().await.unwrap().as_deref(),
            Some("python3")
        );
    }

    #[tokio::test]
    async fn empty_surface_requires_manual_capture() {
        let pipeline = pipeline().with_capture_attempts(2);
        let error = pipeline
            .capture_and_enqueue(
                &StaticSurface::default(),
                ProblemId::new(1, "two-sum"),
                SubmissionMetadata::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            Error::CaptureExhausted {
                attempts: 2,
                requires_manual: true
            }
        ));
        assert!(pipeline.repository().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_code_is_never_queued() {
        let pipeline = pipeline();
        let error = pipeline
            .capture_and_enqueue(
                &surface("x = 1  # nothing structured here", Some("python3")),
                ProblemId::new(1, "two-sum"),
                SubmissionMetadata::default(),
            )
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::ValidationFailed);
        assert!(matches!(
            error,
            Error::ValidationFailed(ValidationFailure::PatternMismatch { .. })
        ));
        assert!(pipeline.repository().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cached_language_is_used_when_surface_is_silent() {
        let pipeline = pipeline();
        pipeline
            .repository()
            .remember_language(&Language::Cpp)
            .await
            .unwrap();

        let outcome = pipeline
            .capture_and_enqueue(
                &surface("class Solution { public: int solve() { return 0; } };", None),
                ProblemId::new(2, "add-two-numbers"),
                SubmissionMetadata::default(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.language_source, LanguageSource::Cached);
        assert_eq!(outcome.submission.language, Language::Cpp);
    }

    #[tokio::test]
    async fn same_capture_twice_is_duplicate() {
        let pipeline = pipeline();
        let editor = surface(PYTHON, Some("python3"));
        pipeline
            .capture_and_enqueue(&editor, ProblemId::new(1, "two-sum"), SubmissionMetadata::default())
            .await
            .unwrap();

        let error = pipeline
            .capture_and_enqueue(&editor, ProblemId::new(1, "two-sum"), SubmissionMetadata::default())
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Duplicate);
        assert_eq!(pipeline.repository().list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn language_cache_failure_does_not_fail_queued_capture() {
        let queue = StorageQueue::spawn(LanguageLockedStore::default(), QueueOptions::default());
        let pipeline = Pipeline::new(SubmissionRepository::new(queue));

        let outcome = pipeline
            .capture_and_enqueue(
                &surface(PYTHON, Some("python3")),
                ProblemId::new(1, "two-sum"),
                SubmissionMetadata::default(),
            )
            .await
            .unwrap();

        let stored = pipeline.repository().list().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, outcome.submission.id);
        assert_eq!(pipeline.repository().last_language().await.unwrap(), None);
    }
}
