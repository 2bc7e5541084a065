use solsync_core::config::SolsyncConfig;

use crate::cli::AuthCommands;
use crate::commands::common::{auth_service, format_timestamp, github_client};
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, config: &SolsyncConfig) -> Result<(), CliError> {
    let service = auth_service(config)?;
    match command {
        AuthCommands::Login => {
            let code = service
                .start()
                .await
                .map_err(|error| CliError::Auth(error.to_string()))?;
            println!(
                "Open {} and enter the code {}",
                code.verification_uri, code.user_code
            );
            println!(
                "Waiting for authorization (expires in {} minutes)...",
                code.expires_in.as_secs() / 60
            );

            let token = service
                .wait_for_token(&code)
                .await
                .map_err(|error| CliError::Auth(error.to_string()))?;
            println!("Authorized with scope '{}'", token.scope);
            Ok(())
        }
        AuthCommands::Status => {
            let Some(token) = service
                .stored_token()
                .map_err(|error| CliError::Auth(error.to_string()))?
            else {
                println!("Not signed in.");
                return Ok(());
            };

            if config.repo_target().is_err() {
                println!(
                    "Signed in (scope '{}', authorized {}); no repository configured to verify against.",
                    token.scope,
                    format_timestamp(token.obtained_at.saturating_mul(1000))
                );
                return Ok(());
            }

            let client = github_client(config)?;
            match client.current_user().await {
                Ok(user) => println!(
                    "Signed in as {} (scope '{}', authorized {})",
                    user.login,
                    token.scope,
                    format_timestamp(token.obtained_at.saturating_mul(1000))
                ),
                Err(solsync_core::Error::AuthExpired) => {
                    println!("Stored token is no longer valid. Run `solsync auth login`.");
                }
                Err(error) => return Err(error.into()),
            }
            Ok(())
        }
        AuthCommands::Logout => {
            service
                .sign_out()
                .map_err(|error| CliError::Auth(error.to_string()))?;
            println!("Signed out");
            Ok(())
        }
    }
}
