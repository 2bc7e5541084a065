use solsync_core::config::SolsyncConfig;
use solsync_core::remote::RemoteRepository;

use crate::commands::common::github_client;
use crate::error::CliError;

pub async fn run_repos(config: &SolsyncConfig) -> Result<(), CliError> {
    let client = github_client(config)?;
    let repositories = client.list_repositories().await?;
    if repositories.is_empty() {
        println!("No repositories visible to this token.");
        return Ok(());
    }

    for repository in repositories {
        let visibility = if repository.private { "private" } else { "public" };
        match &repository.default_branch {
            Some(branch) => println!("{} ({visibility}, default branch {branch})", repository.full_name),
            None => println!("{} ({visibility})", repository.full_name),
        }
    }
    Ok(())
}
