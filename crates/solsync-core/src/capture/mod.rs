//! Code capture from an embedded editor surface.
//!
//! The editor's internals are undocumented and change without notice, so
//! capture walks a fixed, ordered list of strategies on every attempt. The
//! order is reliability priority: the structured document model first, the
//! raw input element next, then a legacy editor instance, and scraping of the
//! rendered lines last. The first strategy that yields non-empty text wins.

mod detect;

use std::time::Duration;

use thiserror::Error;

use crate::error::Error;

pub use detect::{DetectedLanguage, LanguageDetector, LanguageSource};

/// Default number of capture attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Fixed pause between capture attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Failure raised by an editor surface accessor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct SurfaceError(pub String);

impl SurfaceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub type SurfaceResult<T> = Result<T, SurfaceError>;

/// Read-only view of the live editor.
///
/// Every accessor is optional: `Ok(None)` means the structure is absent on
/// this page, `Err` means it was present but could not be read. Accessors
/// must not mutate the editor.
pub trait EditorSurface: Sync {
    /// Text from the editor's structured document-model API.
    fn document_model_text(&self) -> SurfaceResult<Option<String>> {
        Ok(None)
    }

    /// Value of the editor's backing input element.
    fn input_surface_text(&self) -> SurfaceResult<Option<String>> {
        Ok(None)
    }

    /// Text from a legacy editor instance, when the page still embeds one.
    fn legacy_editor_text(&self) -> SurfaceResult<Option<String>> {
        Ok(None)
    }

    /// Rendered text of each visible editor line, top to bottom.
    fn rendered_lines(&self) -> SurfaceResult<Vec<String>> {
        Ok(Vec::new())
    }

    /// Language id reported by the editor's document model.
    fn model_language(&self) -> SurfaceResult<Option<String>> {
        Ok(None)
    }

    /// Label of the visible language-selector control.
    fn language_selector_text(&self) -> SurfaceResult<Option<String>> {
        Ok(None)
    }

    /// URL of the page hosting the editor.
    fn page_url(&self) -> SurfaceResult<Option<String>> {
        Ok(None)
    }
}

/// Signature shared by every capture strategy.
pub type StrategyFn = fn(&dyn EditorSurface) -> SurfaceResult<Option<String>>;

/// A named extraction function.
#[derive(Clone, Copy)]
pub struct CaptureStrategy {
    pub name: &'static str,
    pub extract: StrategyFn,
}

impl std::fmt::Debug for CaptureStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureStrategy")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Strategies in reliability order. Do not reorder.
pub const DEFAULT_STRATEGIES: [CaptureStrategy; 4] = [
    CaptureStrategy {
        name: "document_model",
        extract: from_document_model,
    },
    CaptureStrategy {
        name: "input_surface",
        extract: from_input_surface,
    },
    CaptureStrategy {
        name: "legacy_editor",
        extract: from_legacy_editor,
    },
    CaptureStrategy {
        name: "rendered_lines",
        extract: from_rendered_lines,
    },
];

fn from_document_model(surface: &dyn EditorSurface) -> SurfaceResult<Option<String>> {
    surface.document_model_text()
}

fn from_input_surface(surface: &dyn EditorSurface) -> SurfaceResult<Option<String>> {
    surface.input_surface_text()
}

fn from_legacy_editor(surface: &dyn EditorSurface) -> SurfaceResult<Option<String>> {
    surface.legacy_editor_text()
}

fn from_rendered_lines(surface: &dyn EditorSurface) -> SurfaceResult<Option<String>> {
    let lines = surface.rendered_lines()?;
    if lines.is_empty() {
        return Ok(None);
    }

    // Rendered lines use non-breaking spaces for indentation.
    let text = lines
        .iter()
        .map(|line| line.replace('\u{a0}', " ").replace('\u{200b}', ""))
        .collect::<Vec<_>>()
        .join("\n");
    Ok(Some(text))
}

/// Code captured by a strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedCode {
    /// Trimmed, non-empty code
    pub code: String,
    /// Name of the winning strategy
    pub method: &'static str,
    /// 1-based attempt that produced the code
    pub attempt: u32,
}

/// Outcome of [`CaptureEngine::capture_code`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureResult {
    Captured(CapturedCode),
    Failed {
        error: String,
        attempts: u32,
        requires_manual: bool,
    },
}

impl CaptureResult {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Captured(_))
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Captured(captured) => Some(&captured.code),
            Self::Failed { .. } => None,
        }
    }

    pub const fn requires_manual(&self) -> bool {
        match self {
            Self::Captured(_) => false,
            Self::Failed {
                requires_manual, ..
            } => *requires_manual,
        }
    }

    /// Convert into a `Result`, mapping exhaustion to [`Error::CaptureExhausted`].
    pub fn into_result(self) -> crate::Result<CapturedCode> {
        match self {
            Self::Captured(captured) => Ok(captured),
            Self::Failed {
                attempts,
                requires_manual,
                ..
            } => Err(Error::CaptureExhausted {
                attempts,
                requires_manual,
            }),
        }
    }
}

/// Runs the ordered strategy list with bounded retries.
#[derive(Debug, Clone)]
pub struct CaptureEngine {
    strategies: Vec<CaptureStrategy>,
    retry_delay: Duration,
}

impl Default for CaptureEngine {
    fn default() -> Self {
        Self {
            strategies: DEFAULT_STRATEGIES.to_vec(),
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl CaptureEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the strategy list (order is preserved as given).
    #[must_use]
    pub fn with_strategies(mut self, strategies: Vec<CaptureStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    #[must_use]
    pub const fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|strategy| strategy.name).collect()
    }

    /// Capture the current code from `surface`.
    ///
    /// Each attempt tries every strategy in order; strategy errors are logged
    /// and skipped. Attempts are separated by the retry delay. `max_attempts`
    /// of zero is treated as one.
    pub async fn capture_code(&self, surface: &dyn EditorSurface, max_attempts: u32) -> CaptureResult {
        let max_attempts = max_attempts.max(1);

        for attempt in 1..=max_attempts {
            if let Some(captured) = self.try_strategies(surface, attempt) {
                tracing::debug!(
                    strategy = captured.method,
                    attempt,
                    length = captured.code.len(),
                    "Captured code"
                );
                return CaptureResult::Captured(captured);
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        tracing::warn!(
            attempts = max_attempts,
            "No capture strategy produced code; manual capture required"
        );
        CaptureResult::Failed {
            error: format!("no capture strategy produced code after {max_attempts} attempt(s)"),
            attempts: max_attempts,
            requires_manual: true,
        }
    }

    fn try_strategies(&self, surface: &dyn EditorSurface, attempt: u32) -> Option<CapturedCode> {
        for strategy in &self.strategies {
            match (strategy.extract)(surface) {
                Ok(Some(text)) => {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        return Some(CapturedCode {
                            code: trimmed.to_string(),
                            method: strategy.name,
                            attempt,
                        });
                    }
                    tracing::debug!(strategy = strategy.name, attempt, "Strategy returned blank text");
                }
                Ok(None) => {
                    tracing::debug!(strategy = strategy.name, attempt, "Strategy not available");
                }
                Err(error) => {
                    tracing::warn!(
                        strategy = strategy.name,
                        attempt,
                        %error,
                        "Capture strategy failed"
                    );
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct FakeSurface {
        model: Option<SurfaceResult<Option<String>>>,
        input: Option<String>,
        legacy: Option<String>,
        lines: Vec<String>,
        model_reads: AtomicU32,
        model_ready_after: u32,
    }

    impl EditorSurface for FakeSurface {
        fn document_model_text(&self) -> SurfaceResult<Option<String>> {
            let reads = self.model_reads.fetch_add(1, Ordering::SeqCst) + 1;
            if reads <= self.model_ready_after {
                return Ok(None);
            }
            self.model.clone().unwrap_or(Ok(None))
        }

        fn input_surface_text(&self) -> SurfaceResult<Option<String>> {
            Ok(self.input.clone())
        }

        fn legacy_editor_text(&self) -> SurfaceResult<Option<String>> {
            Ok(self.legacy.clone())
        }

        fn rendered_lines(&self) -> SurfaceResult<Vec<String>> {
            Ok(self.lines.clone())
        }
    }

    fn engine() -> CaptureEngine {
        CaptureEngine::new().with_retry_delay(Duration::from_millis(1))
    }

    #[test]
    fn default_strategy_order_is_most_structured_first() {
        assert_eq!(
            CaptureEngine::new().strategy_names(),
            vec![
                "document_model",
                "input_surface",
                "legacy_editor",
                "rendered_lines"
            ]
        );
    }

    #[tokio::test]
    async fn empty_surface_requires_manual_capture() {
        let surface = FakeSurface::default();
        let result = engine().capture_code(&surface, 3).await;

        assert!(!result.is_success());
        assert!(result.requires_manual());
        assert_eq!(surface.model_reads.load(Ordering::SeqCst), 3);
        let error = result.into_result().unwrap_err();
        assert!(matches!(
            error,
            Error::CaptureExhausted {
                attempts: 3,
                requires_manual: true
            }
        ));
    }

    #[tokio::test]
    async fn first_non_empty_strategy_wins_and_is_trimmed() {
        let surface = FakeSurface {
            model: Some(Ok(Some("   \n ".to_string()))),
            input: Some("\n  def solve(): pass  \n".to_string()),
            legacy: Some("legacy text".to_string()),
            ..Default::default()
        };
        let result = engine().capture_code(&surface, 3).await;

        assert_eq!(
            result,
            CaptureResult::Captured(CapturedCode {
                code: "def solve(): pass".to_string(),
                method: "input_surface",
                attempt: 1,
            })
        );
    }

    #[tokio::test]
    async fn strategy_errors_fall_through_to_next_strategy() {
        let surface = FakeSurface {
            model: Some(Err(SurfaceError::new("model detached"))),
            legacy: Some("int main() { return 0; }".to_string()),
            ..Default::default()
        };
        let result = engine().capture_code(&surface, 1).await;

        assert_eq!(result.code(), Some("int main() { return 0; }"));
        match result {
            CaptureResult::Captured(captured) => assert_eq!(captured.method, "legacy_editor"),
            CaptureResult::Failed { .. } => panic!("expected capture"),
        }
    }

    #[tokio::test]
    async fn later_attempt_succeeds_when_editor_finishes_loading() {
        let surface = FakeSurface {
            model: Some(Ok(Some("fn main() {}".to_string()))),
            model_ready_after: 2,
            ..Default::default()
        };
        let result = engine().capture_code(&surface, 3).await;

        match result {
            CaptureResult::Captured(captured) => {
                assert_eq!(captured.method, "document_model");
                assert_eq!(captured.attempt, 3);
            }
            CaptureResult::Failed { .. } => panic!("expected capture on third attempt"),
        }
    }

    #[tokio::test]
    async fn rendered_lines_are_joined_and_cleaned() {
        let surface = FakeSurface {
            lines: vec![
                "class Solution:".to_string(),
                "\u{a0}\u{a0}\u{a0}\u{a0}def f(self):".to_string(),
                "\u{a0}\u{a0}\u{a0}\u{a0}\u{a0}\u{a0}\u{a0}\u{a0}return 1\u{200b}".to_string(),
            ],
            ..Default::default()
        };
        let result = engine().capture_code(&surface, 1).await;

        assert_eq!(
            result.code(),
            Some("class Solution:\n    def f(self):\n        return 1")
        );
    }

    #[tokio::test]
    async fn any_non_blank_strategy_output_is_captured() {
        let samples = ["x", "  leading", "trailing  ", "\tmulti\nline\t", "ünïcode"];
        for sample in samples {
            let surface = FakeSurface {
                input: Some(sample.to_string()),
                ..Default::default()
            };
            let result = engine().capture_code(&surface, 1).await;
            assert!(result.is_success());
            assert_eq!(result.code(), Some(sample.trim()));
        }
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let surface = FakeSurface::default();
        let result = engine().capture_code(&surface, 0).await;
        assert_eq!(surface.model_reads.load(Ordering::SeqCst), 1);
        assert!(matches!(result, CaptureResult::Failed { attempts: 1, .. }));
    }
}
