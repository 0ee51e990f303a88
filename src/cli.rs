use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::fmt;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "archup")]
#[command(version)]
#[command(about = "Staged Arch Linux provisioning", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: /etc/archup/archup.toml, then ~/.config/archup/archup.toml)
    #[arg(short, long, global = true, env = "ARCHUP_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Stage 1: run archinstall from the live ISO and stage archup onto the new root
    Install(InstallArgs),

    /// Stage 2: configure the installed system (run as root)
    PostInstall(StageArgs),

    /// Stage 3: install AUR software (run as the provisioned user)
    Extras(StageArgs),

    /// Show what a stage would still do, without changing anything
    Status {
        #[arg(value_enum)]
        stage: StageName,

        /// Only show steps of one kind (e.g. "service") or one id (e.g. "pkg:git")
        #[arg(long)]
        only: Option<String>,
    },

    /// Check that the system is ready to provision
    Doctor,

    /// Manage the archup config file
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Args)]
pub struct InstallArgs {
    /// Report what would happen without running archinstall or copying files
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct StageArgs {
    /// Report pending steps without applying them
    #[arg(long)]
    pub dry_run: bool,

    /// Install optional package groups without asking
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StageName {
    Install,
    PostInstall,
    Extras,
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Install => write!(f, "install"),
            Self::PostInstall => write!(f, "post-install"),
            Self::Extras => write!(f, "extras"),
        }
    }
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show where config is looked up and the effective values
    Show,

    /// Write the default config
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,

        /// Destination (default: ~/.config/archup/archup.toml)
        path: Option<PathBuf>,
    },

    /// Parse and validate the config
    Validate,
}
