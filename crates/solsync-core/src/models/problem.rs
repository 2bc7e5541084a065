//! Problem identity and metadata

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::util::normalize_text_option;

/// Stable slug/number pair identifying a source problem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProblemId {
    /// Frontend question number (e.g. 1 for "Two Sum")
    pub number: u32,
    /// URL slug (e.g. "two-sum")
    pub slug: String,
}

impl ProblemId {
    /// Create a problem identifier, normalizing the slug to trimmed lowercase.
    pub fn new(number: u32, slug: impl AsRef<str>) -> Self {
        Self {
            number,
            slug: slug.as_ref().trim().to_lowercase(),
        }
    }

    /// Key used for duplicate detection.
    pub fn key(&self) -> String {
        format!("{}:{}", self.number, self.slug)
    }
}

impl fmt::Display for ProblemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{}", self.number, self.slug)
    }
}

/// Problem difficulty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    #[default]
    Unknown,
}

impl Difficulty {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "Easy",
            Self::Medium => "Medium",
            Self::Hard => "Hard",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Self::Easy,
            "medium" | "med" => Self::Medium,
            "hard" => Self::Hard,
            _ => Self::Unknown,
        })
    }
}

/// Descriptive metadata attached to a submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionMetadata {
    /// Human-readable problem title
    pub title: String,
    pub difficulty: Difficulty,
    /// Ordered topics; the first one is the primary topic
    #[serde(default)]
    pub topics: Vec<String>,
    /// Runtime as reported by the judge (e.g. "3 ms")
    #[serde(default)]
    pub runtime: Option<String>,
    /// Percentage of submissions beaten on runtime
    #[serde(default)]
    pub runtime_percentile: Option<f64>,
    /// Memory as reported by the judge (e.g. "16.4 MB")
    #[serde(default)]
    pub memory: Option<String>,
    /// Percentage of submissions beaten on memory
    #[serde(default)]
    pub memory_percentile: Option<f64>,
    /// Acceptance rate in percent
    #[serde(default)]
    pub acceptance_rate: Option<f64>,
    /// Source URL of the problem
    #[serde(default)]
    pub url: Option<String>,
}

impl SubmissionMetadata {
    /// First non-blank topic, if any.
    pub fn primary_topic(&self) -> Option<&str> {
        self.topics
            .first()
            .map(|topic| topic.trim())
            .filter(|topic| !topic.is_empty())
    }

    /// Trim text fields and drop blank optional values and topics.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self.topics = self
            .topics
            .into_iter()
            .filter_map(|topic| normalize_text_option(Some(topic)))
            .collect();
        self.runtime = normalize_text_option(self.runtime);
        self.memory = normalize_text_option(self.memory);
        self.url = normalize_text_option(self.url);
        self
    }
}
