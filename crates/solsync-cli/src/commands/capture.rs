use std::path::PathBuf;

use solsync_core::config::SolsyncConfig;
use solsync_core::models::{Difficulty, ProblemId, SubmissionMetadata};
use solsync_core::pipeline::Pipeline;
use solsync_core::submissions::{EnqueueOutcome, SubmissionRepository};

use crate::error::CliError;
use crate::surface::FileSurface;

#[derive(Debug, Clone)]
pub struct CaptureArgs {
    pub file: PathBuf,
    pub number: u32,
    pub slug: String,
    pub title: Option<String>,
    pub difficulty: Difficulty,
    pub topics: Vec<String>,
    pub lang: Option<String>,
    pub url: Option<String>,
}

pub async fn run_capture(
    args: CaptureArgs,
    config: &SolsyncConfig,
    repository: SubmissionRepository,
) -> Result<(), CliError> {
    let slug = args.slug.trim();
    if slug.is_empty() {
        return Err(CliError::Config("--slug must not be empty".to_string()));
    }

    let surface = FileSurface::new(&args.file, args.lang);
    let problem = ProblemId::new(args.number, slug);
    let metadata = SubmissionMetadata {
        title: args.title.unwrap_or_else(|| slug.to_string()),
        difficulty: args.difficulty,
        topics: args.topics,
        url: args.url,
        ..SubmissionMetadata::default()
    };

    let pipeline = Pipeline::new(repository)
        .with_capture_engine(config.capture_engine())
        .with_capture_attempts(config.capture.attempts)
        .with_default_language(config.default_language());
    let outcome = pipeline
        .capture_and_enqueue(&surface, problem, metadata)
        .await?;

    let submission = &outcome.submission;
    match outcome.enqueue {
        EnqueueOutcome::Inserted => println!(
            "Queued {} [{}] as {}",
            submission.problem, submission.language, submission.id
        ),
        EnqueueOutcome::Replaced { previous } => println!(
            "Queued {} [{}] as {} (replaces {previous})",
            submission.problem, submission.language, submission.id
        ),
    }
    Ok(())
}
