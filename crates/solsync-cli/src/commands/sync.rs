use solsync_core::config::SolsyncConfig;
use solsync_core::submissions::SubmissionRepository;
use solsync_core::sync::{BatchReport, ConnectivityFlag, SyncEngine};

use crate::commands::common::github_client;
use crate::error::CliError;

pub async fn run_sync(
    offline: bool,
    as_json: bool,
    config: &SolsyncConfig,
    repository: SubmissionRepository,
) -> Result<(), CliError> {
    let client = github_client(config)?;
    println!("Syncing to {}", client.target());
    let engine = SyncEngine::new(
        client,
        ConnectivityFlag::new(!offline),
        repository,
        config.retry_policy(),
    );

    let report = engine.sync_pending().await?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_batch_report(&report) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn format_batch_report(report: &BatchReport) -> Vec<String> {
    let mut lines = Vec::new();
    if report.recovered > 0 {
        lines.push(format!("Recovered {} interrupted sync(s)", report.recovered));
    }
    if report.requeued > 0 {
        lines.push(format!("Requeued {} failed submission(s)", report.requeued));
    }
    if report.deferred > 0 {
        lines.push(format!(
            "Deferred {} rate-limited submission(s)",
            report.deferred
        ));
    }
    for synced in &report.synced {
        let verb = if synced.unchanged {
            "unchanged"
        } else if synced.created {
            "added"
        } else {
            "updated"
        };
        lines.push(format!("  {verb:<9} {} -> {}", synced.problem, synced.path));
    }
    for failed in &report.failed {
        lines.push(format!(
            "  failed    {} ({}): {}",
            failed.problem, failed.kind, failed.message
        ));
    }
    lines.push(format!(
        "Synced {}, failed {}",
        report.synced.len(),
        report.failed.len()
    ));
    if let Some(kind) = report.stopped {
        lines.push(match kind {
            solsync_core::ErrorKind::Offline => {
                "Stopped: offline. Pending submissions will sync later.".to_string()
            }
            solsync_core::ErrorKind::AuthExpired => {
                "Stopped: authorization expired. Run `solsync auth login`.".to_string()
            }
            solsync_core::ErrorKind::RateLimited => {
                "Stopped: rate limited. Remaining submissions wait for the reset.".to_string()
            }
            other => format!("Stopped: {other}"),
        });
    }
    lines
}
