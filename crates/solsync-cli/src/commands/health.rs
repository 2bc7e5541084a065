use solsync_core::submissions::SubmissionRepository;

use crate::error::CliError;

pub async fn run_health(as_json: bool, repository: &SubmissionRepository) -> Result<(), CliError> {
    let health = repository.check_storage_health().await?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&health)?);
        return Ok(());
    }

    println!(
        "Storage: {} / {} bytes ({:.1}%)",
        health.bytes_in_use,
        health.quota_bytes,
        health.usage_ratio * 100.0
    );
    if health.cleanup_recommended {
        println!("Cleanup recommended: old synced submissions will be pruned on the next write.");
    }
    Ok(())
}
