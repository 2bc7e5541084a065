use solsync_core::submissions::SubmissionRepository;
use solsync_core::util::unix_millis_now;
use solsync_core::SubmissionStatus;

use crate::commands::common::{format_submission_lines, submission_to_list_item, SubmissionListItem};
use crate::error::CliError;

pub async fn run_list(
    status: Option<SubmissionStatus>,
    as_json: bool,
    repository: &SubmissionRepository,
) -> Result<(), CliError> {
    let mut submissions = match status {
        Some(status) => repository.list_by_status(status).await?,
        None => repository.list().await?,
    };
    submissions.sort_by_key(|submission| std::cmp::Reverse(submission.added_at));
    let now = unix_millis_now();

    if as_json {
        let json_items = submissions
            .iter()
            .map(|submission| submission_to_list_item(submission, now))
            .collect::<Vec<SubmissionListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if submissions.is_empty() {
        println!("No submissions stored.");
        return Ok(());
    }
    for line in format_submission_lines(&submissions, now) {
        println!("{line}");
    }
    Ok(())
}
