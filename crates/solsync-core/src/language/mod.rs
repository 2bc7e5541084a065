//! Language classification and structural validation of captured code.
//!
//! Editors, selectors, and URLs all spell languages differently ("py",
//! "Python3", "python"). Everything is funnelled through [`normalize_language`]
//! into a [`Language`] so file extensions, comment prefixes, and validation
//! patterns are looked up from one canonical identifier.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationFailure;

/// Minimum trimmed length (in characters) for code to be accepted.
pub const MIN_CODE_LENGTH: usize = 10;

const DEFAULT_EXTENSION: &str = "txt";
const DEFAULT_COMMENT_PREFIX: &str = "//";

/// Canonical language identifier.
///
/// Unknown tokens are preserved verbatim in [`Language::Other`] so newer
/// editor languages still flow through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Language {
    Python3,
    Python,
    Java,
    Cpp,
    C,
    CSharp,
    JavaScript,
    TypeScript,
    Php,
    Swift,
    Kotlin,
    Dart,
    Go,
    Ruby,
    Scala,
    Rust,
    Racket,
    Erlang,
    Elixir,
    MySql,
    MsSql,
    OracleSql,
    PostgreSql,
    Bash,
    Other(String),
}

/// Synonym table: canonical language followed by every accepted spelling
/// (lowercase). The canonical identifier must appear in its own list.
const SYNONYMS: &[(Language, &[&str])] = &[
    (Language::Python3, &["python3", "py", "py3", "python 3"]),
    (Language::Python, &["python", "python2", "py2"]),
    (Language::Java, &["java"]),
    (Language::Cpp, &["cpp", "c++", "cxx", "cc"]),
    (Language::C, &["c"]),
    (Language::CSharp, &["csharp", "c#", "cs"]),
    (
        Language::JavaScript,
        &["javascript", "js", "node", "nodejs", "ecmascript"],
    ),
    (Language::TypeScript, &["typescript", "ts"]),
    (Language::Php, &["php"]),
    (Language::Swift, &["swift"]),
    (Language::Kotlin, &["kotlin", "kt"]),
    (Language::Dart, &["dart"]),
    (Language::Go, &["go", "golang"]),
    (Language::Ruby, &["ruby", "rb"]),
    (Language::Scala, &["scala"]),
    (Language::Rust, &["rust", "rs"]),
    (Language::Racket, &["racket", "rkt"]),
    (Language::Erlang, &["erlang", "erl"]),
    (Language::Elixir, &["elixir", "ex", "exs"]),
    (Language::MySql, &["mysql", "sql"]),
    (Language::MsSql, &["mssql", "ms sql server", "sql server", "tsql"]),
    (Language::OracleSql, &["oraclesql", "oracle", "plsql"]),
    (Language::PostgreSql, &["postgresql", "postgres", "pgsql"]),
    (Language::Bash, &["bash", "shell", "sh"]),
];

/// Map an arbitrary language token to its canonical [`Language`].
///
/// Lookup is case-insensitive and ignores surrounding whitespace. Unknown
/// tokens pass through unchanged and are logged for review. The mapping is
/// idempotent: normalizing a canonical identifier yields the same language.
pub fn normalize_language(token: &str) -> Language {
    let trimmed = token.trim();
    let lowered = trimmed.to_lowercase();
    if let Some((language, _)) = SYNONYMS
        .iter()
        .find(|(_, spellings)| spellings.contains(&lowered.as_str()))
    {
        return language.clone();
    }

    tracing::warn!(token = trimmed, "Unrecognized language token");
    Language::Other(trimmed.to_string())
}

impl Language {
    /// Canonical identifier string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Python3 => "python3",
            Self::Python => "python",
            Self::Java => "java",
            Self::Cpp => "cpp",
            Self::C => "c",
            Self::CSharp => "csharp",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Php => "php",
            Self::Swift => "swift",
            Self::Kotlin => "kotlin",
            Self::Dart => "dart",
            Self::Go => "go",
            Self::Ruby => "ruby",
            Self::Scala => "scala",
            Self::Rust => "rust",
            Self::Racket => "racket",
            Self::Erlang => "erlang",
            Self::Elixir => "elixir",
            Self::MySql => "mysql",
            Self::MsSql => "mssql",
            Self::OracleSql => "oraclesql",
            Self::PostgreSql => "postgresql",
            Self::Bash => "bash",
            Self::Other(token) => token,
        }
    }

    /// Whether this identifier came from the synonym table.
    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// File extension (without the dot), `txt` when unmapped.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Python3 | Self::Python => "py",
            Self::Java => "java",
            Self::Cpp => "cpp",
            Self::C => "c",
            Self::CSharp => "cs",
            Self::JavaScript => "js",
            Self::TypeScript => "ts",
            Self::Php => "php",
            Self::Swift => "swift",
            Self::Kotlin => "kt",
            Self::Dart => "dart",
            Self::Go => "go",
            Self::Ruby => "rb",
            Self::Scala => "scala",
            Self::Rust => "rs",
            Self::Racket => "rkt",
            Self::Erlang => "erl",
            Self::Elixir => "ex",
            Self::MySql | Self::MsSql | Self::OracleSql | Self::PostgreSql => "sql",
            Self::Bash => "sh",
            Self::Other(_) => DEFAULT_EXTENSION,
        }
    }

    /// Single-line comment prefix, `//` when unmapped.
    pub fn comment_prefix(&self) -> &'static str {
        match self {
            Self::Python3 | Self::Python | Self::Ruby | Self::Elixir | Self::Bash => "#",
            Self::MySql | Self::MsSql | Self::OracleSql | Self::PostgreSql => "--",
            Self::Racket => ";;",
            Self::Erlang => "%",
            Self::Php
            | Self::Java
            | Self::Cpp
            | Self::C
            | Self::CSharp
            | Self::JavaScript
            | Self::TypeScript
            | Self::Swift
            | Self::Kotlin
            | Self::Dart
            | Self::Go
            | Self::Scala
            | Self::Rust
            | Self::Other(_) => DEFAULT_COMMENT_PREFIX,
        }
    }

    fn structural_pattern(&self) -> Option<&'static Regex> {
        static PYTHON: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"\b(def|class|import)\b").expect("Invalid regex"));
        static CLASS_BASED: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"\b(class|interface|enum|record)\b").expect("Invalid regex")
        });
        static BRACED: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"[{};]").expect("Invalid regex"));
        static SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"\bfunction\b|=>|\bclass\b|\b(const|let|var)\b").expect("Invalid regex")
        });
        static GO: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"\bfunc\b").expect("Invalid regex"));
        static RUST: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"\b(fn|impl|struct|enum)\b").expect("Invalid regex"));
        static SQL: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"(?i)\b(select|insert|update|delete|with|create)\b")
                .expect("Invalid regex")
        });

        match self {
            Self::Python3 | Self::Python => Some(&*PYTHON),
            Self::Java | Self::CSharp => Some(&*CLASS_BASED),
            Self::Cpp | Self::C => Some(&*BRACED),
            Self::JavaScript | Self::TypeScript => Some(&*SCRIPT),
            Self::Go => Some(&*GO),
            Self::Rust => Some(&*RUST),
            Self::MySql | Self::MsSql | Self::OracleSql | Self::PostgreSql => Some(&*SQL),
            _ => None,
        }
    }
}

/// File extension for a canonical language.
pub fn extension(language: &Language) -> &'static str {
    language.extension()
}

/// Comment prefix for a canonical language.
pub fn comment_prefix(language: &Language) -> &'static str {
    language.comment_prefix()
}

/// Check that captured code is plausibly a real solution.
///
/// Rejects empty text, text shorter than [`MIN_CODE_LENGTH`] after trimming,
/// and text that fails the language's coarse structural pattern when one is
/// defined. Never panics; the caller decides whether to retry or accept.
pub fn validate_code(code: &str, language: &Language) -> Result<(), ValidationFailure> {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        return Err(ValidationFailure::Empty);
    }

    let length = trimmed.chars().count();
    if length < MIN_CODE_LENGTH {
        return Err(ValidationFailure::TooShort {
            length,
            minimum: MIN_CODE_LENGTH,
        });
    }

    if let Some(pattern) = language.structural_pattern() {
        if !pattern.is_match(trimmed) {
            return Err(ValidationFailure::PatternMismatch {
                language: language.as_str().to_string(),
            });
        }
    }

    Ok(())
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(normalize_language(s))
    }
}

impl From<String> for Language {
    fn from(value: String) -> Self {
        normalize_language(&value)
    }
}

impl From<Language> for String {
    fn from(value: Language) -> Self {
        value.as_str().to_string()
    }
}
