use solsync_core::submissions::SubmissionRepository;

use crate::commands::common::{normalize_submission_identifier, resolve_submission};
use crate::error::CliError;

pub async fn run_retry(id: &str, repository: &SubmissionRepository) -> Result<(), CliError> {
    if normalize_submission_identifier(id)? == "all" {
        let requeued = repository.retry_all_failed().await?;
        println!("Moved {} failed submission(s) back to pending", requeued.len());
        return Ok(());
    }

    let submissions = repository.list().await?;
    let target = resolve_submission(&submissions, id)?;
    let retried = repository.retry_failed(target.id).await?;
    println!("{} is pending again", retried.problem);
    Ok(())
}
