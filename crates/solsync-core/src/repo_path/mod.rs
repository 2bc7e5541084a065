//! Deterministic repository paths, file headers, and commit messages.
//!
//! Everything here is a pure function of submission metadata: the same
//! problem always maps to the same path, so a re-sync overwrites the earlier
//! file instead of creating a second one.

use crate::language::{comment_prefix, Language};
use crate::models::{Difficulty, ProblemId, Submission, SubmissionMetadata};
use crate::util::truncate_chars;

/// Longest allowed path segment, in characters.
pub const MAX_SEGMENT_LENGTH: usize = 80;
/// Longest commit message, in characters.
pub const MAX_COMMIT_MESSAGE_LENGTH: usize = 120;

const UNCATEGORIZED: &str = "Uncategorized";
const FORBIDDEN_PATH_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// `{primary topic}/{difficulty}/{number:04}-{slug}.{extension}`
pub fn generate_file_path(submission: &Submission) -> String {
    file_path(
        &submission.problem,
        &submission.metadata,
        &submission.language,
    )
}

pub fn file_path(problem: &ProblemId, metadata: &SubmissionMetadata, language: &Language) -> String {
    let topic = metadata
        .primary_topic()
        .map(sanitize_segment)
        .filter(|segment| !segment.is_empty())
        .unwrap_or_else(|| UNCATEGORIZED.to_string());
    let difficulty = sanitize_segment(metadata.difficulty.as_str());
    let stem = sanitize_segment(&format!("{:04}-{}", problem.number, problem.slug));

    format!("{topic}/{difficulty}/{stem}.{}", language.extension())
}

/// Make `raw` safe as one path segment.
///
/// Forbidden and control characters become `-`, whitespace runs collapse to
/// a single `-`, dash runs collapse, leading/trailing dashes and dots are
/// stripped, and the result is cut to [`MAX_SEGMENT_LENGTH`] characters.
pub fn sanitize_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.trim().chars() {
        let mapped = if ch.is_whitespace() || ch.is_control() || FORBIDDEN_PATH_CHARS.contains(&ch) {
            '-'
        } else {
            ch
        };
        if mapped == '-' && out.ends_with('-') {
            continue;
        }
        out.push(mapped);
    }

    let trimmed = truncate_chars(
        out.trim_matches(|ch| ch == '-' || ch == '.'),
        MAX_SEGMENT_LENGTH,
    );
    trimmed.trim_end_matches(['-', '.']).to_string()
}

/// Comment block placed above the code in the uploaded file.
pub fn generate_metadata_header(submission: &Submission) -> String {
    let prefix = comment_prefix(&submission.language);
    let metadata = &submission.metadata;
    let title = if metadata.title.is_empty() {
        submission.problem.slug.as_str()
    } else {
        metadata.title.as_str()
    };

    let mut lines = vec![
        format!("Problem: {}. {}", submission.problem.number, single_line(title)),
        format!("Difficulty: {}", metadata.difficulty),
    ];
    if !metadata.topics.is_empty() {
        let topics: Vec<String> = metadata.topics.iter().map(|topic| single_line(topic)).collect();
        lines.push(format!("Topics: {}", topics.join(", ")));
    }
    if let Some(runtime) = &metadata.runtime {
        lines.push(with_percentile("Runtime", runtime, metadata.runtime_percentile));
    }
    if let Some(memory) = &metadata.memory {
        lines.push(with_percentile("Memory", memory, metadata.memory_percentile));
    }
    if let Some(rate) = metadata.acceptance_rate {
        lines.push(format!("Acceptance: {rate:.1}%"));
    }
    if let Some(url) = &metadata.url {
        lines.push(format!("URL: {}", single_line(url)));
    }

    let mut header: String = lines
        .iter()
        .map(|line| format!("{prefix} {line}\n"))
        .collect();
    header.push('\n');
    header
}

/// File body uploaded for a submission: header followed by the code.
pub fn render_file_content(submission: &Submission) -> String {
    let mut content = generate_metadata_header(submission);
    content.push_str(submission.code());
    content.push('\n');
    content
}

/// One-line commit message, e.g. `🟢 Add 0001. Two Sum (Easy, python3)`.
pub fn generate_commit_message(submission: &Submission, is_update: bool) -> String {
    let action = if is_update { "Update" } else { "Add" };
    let title = if submission.metadata.title.is_empty() {
        submission.problem.slug.as_str()
    } else {
        submission.metadata.title.as_str()
    };

    let message = format!(
        "{} {action} {:04}. {} ({}, {})",
        difficulty_marker(submission.metadata.difficulty),
        submission.problem.number,
        title,
        submission.metadata.difficulty,
        submission.language,
    );
    truncate_chars(&single_line(&message), MAX_COMMIT_MESSAGE_LENGTH)
}

pub const fn difficulty_marker(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Easy => "🟢",
        Difficulty::Medium => "🟡",
        Difficulty::Hard => "🔴",
        Difficulty::Unknown => "⚪",
    }
}

fn with_percentile(label: &str, value: &str, percentile: Option<f64>) -> String {
    let value = single_line(value);
    match percentile {
        Some(percentile) => format!("{label}: {value} (beats {percentile:.2}%)"),
        None => format!("{label}: {value}"),
    }
}

/// Replace control characters (newlines included) with spaces and collapse
/// whitespace runs.
fn single_line(raw: &str) -> String {
    raw.split(|ch: char| ch.is_whitespace() || ch.is_control())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn submission(metadata: SubmissionMetadata, language: Language) -> Submission {
        Submission::new(
            ProblemId::new(1, "two-sum"),
            "class Solution:\n    def twoSum(self): pass",
            language,
            metadata,
        )
        .unwrap()
    }

    fn two_sum() -> SubmissionMetadata {
        SubmissionMetadata {
            title: "Two Sum".to_string(),
            difficulty: Difficulty::Easy,
            topics: vec!["Array".to_string(), "Hash Table".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn canonical_two_sum_path() {
        let path = generate_file_path(&submission(two_sum(), Language::Python3));
        assert_eq!(path, "Array/Easy/0001-two-sum.py");
    }

    #[test]
    fn path_is_stable_and_ignores_secondary_topics() {
        let base = submission(two_sum(), Language::Python3);
        let mut extra = two_sum();
        extra.topics.push("Sorting".to_string());
        let mut fewer = two_sum();
        fewer.topics.truncate(1);

        let path = generate_file_path(&base);
        assert_eq!(path, generate_file_path(&base));
        assert_eq!(path, generate_file_path(&submission(extra, Language::Python3)));
        assert_eq!(path, generate_file_path(&submission(fewer, Language::Python3)));
    }

    #[test]
    fn missing_topic_and_unmapped_language() {
        let metadata = SubmissionMetadata {
            topics: vec![],
            ..two_sum()
        };
        let path = file_path(
            &ProblemId::new(42, "trapping-rain-water"),
            &metadata,
            &Language::Other("brainfuck".to_string()),
        );
        assert_eq!(path, "Uncategorized/Easy/0042-trapping-rain-water.txt");
    }

    #[test]
    fn sanitize_segment_cases() {
        assert_eq!(sanitize_segment("Hash  Table"), "Hash-Table");
        assert_eq!(sanitize_segment("Divide / Conquer"), "Divide-Conquer");
        assert_eq!(sanitize_segment("a:b*c?d"), "a-b-c-d");
        assert_eq!(sanitize_segment("--..hidden..--"), "hidden");
        assert_eq!(sanitize_segment("line\nbreak"), "line-break");
        assert_eq!(sanitize_segment(&"x".repeat(200)).len(), MAX_SEGMENT_LENGTH);
        assert_eq!(sanitize_segment("  "), "");
    }

    #[test]
    fn header_uses_language_comment_prefix() {
        let metadata = SubmissionMetadata {
            runtime: Some("3 ms".to_string()),
            runtime_percentile: Some(95.2),
            memory: Some("16.4 MB".to_string()),
            acceptance_rate: Some(52.34),
            url: Some("https://example.com/problems/two-sum/".to_string()),
            ..two_sum()
        };
        let header = generate_metadata_header(&submission(metadata, Language::Python3));
        assert_eq!(
            header,
            "# Problem: 1. Two Sum\n\
             # Difficulty: Easy\n\
             # Topics: Array, Hash Table\n\
             # Runtime: 3 ms (beats 95.20%)\n\
             # Memory: 16.4 MB\n\
             # Acceptance: 52.3%\n\
             # URL: https://example.com/problems/two-sum/\n\n"
        );

        let cpp = Submission::new(
            ProblemId::new(1, "two-sum"),
            "class Solution { public: int x; };",
            Language::Cpp,
            two_sum(),
        )
        .unwrap();
        assert!(generate_metadata_header(&cpp).starts_with("// Problem: 1. Two Sum\n"));
    }

    #[test]
    fn file_content_ends_with_code() {
        let entry = submission(two_sum(), Language::Python3);
        let content = render_file_content(&entry);
        assert!(content.starts_with("# Problem"));
        assert!(content.ends_with("def twoSum(self): pass\n"));
    }

    #[test]
    fn commit_message_add_and_update() {
        let entry = submission(two_sum(), Language::Python3);
        assert_eq!(
            generate_commit_message(&entry, false),
            "🟢 Add 0001. Two Sum (Easy, python3)"
        );
        assert!(generate_commit_message(&entry, true).starts_with("🟢 Update 0001."));
    }

    #[test]
    fn commit_message_is_single_line_and_bounded() {
        let metadata = SubmissionMetadata {
            title: format!("Evil\ntitle\r\u{7}{}", "y".repeat(300)),
            difficulty: Difficulty::Hard,
            ..Default::default()
        };
        let message = generate_commit_message(&submission(metadata, Language::Python3), false);
        assert!(!message.contains('\n') && !message.contains('\r') && !message.contains('\u{7}'));
        assert!(message.starts_with("🔴 Add 0001. Evil title "));
        assert_eq!(message.chars().count(), MAX_COMMIT_MESSAGE_LENGTH);
    }
}
