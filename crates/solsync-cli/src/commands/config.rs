use std::path::Path;

use solsync_core::config::SolsyncConfig;
use solsync_core::util::normalize_text_option;

use crate::cli::ConfigCommands;
use crate::commands::common::load_config;
use crate::error::CliError;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigInitArgs {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub branch: Option<String>,
    pub client_id: Option<String>,
    pub api_base_url: Option<String>,
}

pub fn run_config(command: ConfigCommands, config_path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            owner,
            repo,
            branch,
            client_id,
            api_base_url,
        } => {
            let mut config = SolsyncConfig::load_from_path(config_path)?;
            apply_init_args(
                &mut config,
                ConfigInitArgs {
                    owner,
                    repo,
                    branch,
                    client_id,
                    api_base_url,
                },
            )?;
            config.save_to_path(config_path)?;
            println!("Saved config to {}", config_path.display());
            match config.repo_target() {
                Ok(target) => println!("Target repository: {target}"),
                Err(_) => println!("Target repository is not set yet (use --owner and --repo)."),
            }
            Ok(())
        }
        ConfigCommands::Show => {
            let config = load_config(config_path)?;
            println!("# {}", config_path.display());
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// Merge explicit `config init` flags into `config`; omitted flags keep the
/// current value.
pub fn apply_init_args(config: &mut SolsyncConfig, args: ConfigInitArgs) -> Result<(), CliError> {
    if let Some(owner) = normalize_text_option(args.owner) {
        config.github.owner = Some(owner);
    }
    if let Some(repo) = normalize_text_option(args.repo) {
        config.github.repo = Some(repo);
    }
    if let Some(branch) = normalize_text_option(args.branch) {
        config.github.branch = branch;
    }
    if let Some(client_id) = normalize_text_option(args.client_id) {
        config.github.client_id = Some(client_id);
    }
    if let Some(api_base_url) = normalize_text_option(args.api_base_url) {
        config.github.api_base_url = api_base_url;
    }
    config.validate()?;
    Ok(())
}
