//! Best-effort language detection layered on the editor surface.

use url::Url;

use super::{EditorSurface, SurfaceResult};
use crate::language::{normalize_language, Language};

const URL_LANGUAGE_PARAMS: [&str; 2] = ["lang", "language"];

/// Where a detected language came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageSource {
    EditorModel,
    LanguageSelector,
    UrlParameter,
    Cached,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedLanguage {
    pub language: Language,
    pub source: LanguageSource,
}

/// Tries editor metadata, the selector control, the page URL, and the cached
/// last-used language, in that order, before falling back to a default.
///
/// A source only wins with a recognized language. An unrecognized token is
/// kept as a fallback in case no later source knows better.
#[derive(Debug, Clone)]
pub struct LanguageDetector {
    default_language: Language,
}

impl Default for LanguageDetector {
    fn default() -> Self {
        Self {
            default_language: Language::Python3,
        }
    }
}

impl LanguageDetector {
    pub const fn new(default_language: Language) -> Self {
        Self { default_language }
    }

    pub fn detect(&self, surface: &dyn EditorSurface, cached: Option<&str>) -> DetectedLanguage {
        let candidates: [(LanguageSource, SurfaceResult<Option<String>>); 4] = [
            (LanguageSource::EditorModel, surface.model_language()),
            (
                LanguageSource::LanguageSelector,
                surface.language_selector_text(),
            ),
            (
                LanguageSource::UrlParameter,
                surface.page_url().map(|url| url.as_deref().and_then(language_from_url)),
            ),
            (LanguageSource::Cached, Ok(cached.map(ToOwned::to_owned))),
        ];

        let mut unrecognized = None;
        for (source, candidate) in candidates {
            let token = match candidate {
                Ok(Some(token)) if !token.trim().is_empty() => token,
                Ok(_) => continue,
                Err(error) => {
                    tracing::debug!(?source, %error, "Language source unavailable");
                    continue;
                }
            };

            let language = normalize_language(&token);
            if language.is_known() {
                return DetectedLanguage { language, source };
            }
            unrecognized.get_or_insert(DetectedLanguage { language, source });
        }

        unrecognized.unwrap_or_else(|| DetectedLanguage {
            language: self.default_language.clone(),
            source: LanguageSource::Default,
        })
    }
}

fn language_from_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    url.query_pairs()
        .find(|(key, _)| URL_LANGUAGE_PARAMS.iter().any(|param| key == param))
        .map(|(_, value)| value.into_owned())
}
