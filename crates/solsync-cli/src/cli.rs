use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use solsync_core::models::{Difficulty, SubmissionStatus};

#[derive(Parser)]
#[command(name = "solsync")]
#[command(about = "Capture practice solutions and sync them to a GitHub repository")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the local submission store
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Configure the target repository and OAuth app
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Authorize with GitHub through the device flow
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Capture a solution from a file and queue it for sync
    Capture {
        /// Source file holding the solution
        file: PathBuf,
        /// Problem number
        #[arg(long)]
        number: u32,
        /// Problem slug, e.g. two-sum
        #[arg(long)]
        slug: String,
        /// Problem title (defaults to the slug)
        #[arg(long)]
        title: Option<String>,
        #[arg(long, value_enum, default_value_t = DifficultyArg::Unknown)]
        difficulty: DifficultyArg,
        /// Topic tag; repeat for several, the first one picks the folder
        #[arg(long = "topic", value_name = "TOPIC")]
        topics: Vec<String>,
        /// Language override (detected from the file extension otherwise)
        #[arg(long, value_name = "LANG")]
        lang: Option<String>,
        /// Problem URL recorded in the file header
        #[arg(long)]
        url: Option<String>,
    },
    /// List stored submissions
    List {
        /// Only show submissions with this status
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Move failed submissions back to pending
    Retry {
        /// Submission ID, unique ID prefix, or `all`
        id: String,
    },
    /// Push pending submissions to the configured repository
    Sync {
        /// Treat the network as unavailable
        #[arg(long)]
        offline: bool,
        /// Output the pass summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show local storage usage
    Health {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List repositories the stored token can access
    Repos,
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum DifficultyArg {
    Easy,
    Medium,
    Hard,
    Unknown,
}

impl From<DifficultyArg> for Difficulty {
    fn from(value: DifficultyArg) -> Self {
        match value {
            DifficultyArg::Easy => Self::Easy,
            DifficultyArg::Medium => Self::Medium,
            DifficultyArg::Hard => Self::Hard,
            DifficultyArg::Unknown => Self::Unknown,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum StatusArg {
    Pending,
    Syncing,
    Synced,
    Failed,
}

impl From<StatusArg> for SubmissionStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Pending => Self::Pending,
            StatusArg::Syncing => Self::Syncing,
            StatusArg::Synced => Self::Synced,
            StatusArg::Failed => Self::Failed,
        }
    }
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Create or update the config file
    Init {
        /// Repository owner (user or organization)
        #[arg(long)]
        owner: Option<String>,
        /// Repository name
        #[arg(long)]
        repo: Option<String>,
        /// Branch to commit to
        #[arg(long)]
        branch: Option<String>,
        /// GitHub OAuth app client id for `solsync auth login`
        #[arg(long, value_name = "ID")]
        client_id: Option<String>,
        /// API base URL, for GitHub Enterprise
        #[arg(long, value_name = "URL")]
        api_base_url: Option<String>,
    },
    /// Print the effective configuration
    Show,
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Authorize through the GitHub device flow and store the token in the keychain
    Login,
    /// Check that the stored token still works
    Status,
    /// Forget the stored token
    Logout,
}
