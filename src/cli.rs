use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sqldash")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Deploy SQL dashboards from a folder of annotated queries", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create or update every dashboard, then delete what is no longer defined
    #[command(
        long_about = "Create or update every dashboard, then delete what is no longer defined.\n\n\
                      Runs are not locked: never run two deploys against the same remote folder \
                      at the same time."
    )]
    Deploy(DeployArgs),

    /// Check every definition without contacting the workspace
    Validate(ValidateArgs),

    /// Inspect the deployment state stored in the remote folder
    #[command(subcommand)]
    State(StateCommand),

    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Values that override `config.toml`.
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    /// Workspace host (e.g. https://example.cloud.databricks.com)
    #[arg(long)]
    pub host: Option<String>,

    /// Remote folder holding the deployed dashboards and their state
    #[arg(long)]
    pub remote_folder: Option<String>,

    /// Warehouse to run queries on (default: first available)
    #[arg(long)]
    pub warehouse_id: Option<String>,
}

#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Local folder with dashboard definitions
    #[arg(long, visible_alias = "local-folder")]
    pub folder: Option<PathBuf>,

    /// Prefix for dashboard names
    #[arg(long)]
    pub name_prefix: Option<String>,

    #[command(flatten)]
    pub overrides: Overrides,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Local folder with dashboard definitions
    #[arg(long, visible_alias = "local-folder")]
    pub folder: Option<PathBuf>,
}

// ============================================================================
// State Commands
// ============================================================================

#[derive(Subcommand)]
pub enum StateCommand {
    /// Print every state entry
    Show {
        /// Print raw JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Print the web link of every deployed dashboard
    Links {
        #[command(flatten)]
        overrides: Overrides,
    },
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the resolved configuration (token redacted)
    Show,
}
