use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// CLI arguments parser using `clap`
#[derive(Parser, Debug)]
#[command(name = "ctx", version, about = "Pick the right GitHub identity for every repository")]
pub struct Cli {
    /// Path to config.toml (defaults to ~/.config/ctx/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Print debug logs to stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,
    /// Subcommand chosen to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by commands that resolve a profile
#[derive(Args, Debug, Clone, Default)]
pub struct ResolveArgs {
    /// Profile to use instead of resolving one
    #[arg(long, short)]
    pub profile: Option<String>,
    /// Do not install the pre-push guard
    #[arg(long)]
    pub no_guard: bool,
}

// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Clones a repository with the profile that owns it
    Clone {
        /// owner/repo, SSH or HTTPS URL
        repo: String,
        /// Target directory (defaults to the repository name)
        dir: Option<PathBuf>,
        #[command(flatten)]
        resolve: ResolveArgs,
    },
    /// Binds the current repository to a profile
    Init {
        #[command(flatten)]
        resolve: ResolveArgs,
    },
    /// Displays the profile bound to the current repository
    Status,
    /// Lists configured profiles
    Profiles,
    /// Pre-push guard management
    Guard {
        #[command(subcommand)]
        command: GuardCommands,
    },
    /// Resolution cache management
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum GuardCommands {
    /// Checks the current repository against its profile
    Check,
    /// Installs the guard into .git/hooks/pre-push
    Install,
    /// Removes the guard from .git/hooks/pre-push
    Uninstall,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Displays cached resolutions
    List,
    /// Drops every cached resolution for a profile
    Invalidate {
        /// Profile whose entries are dropped
        profile: String,
    },
    /// Drops every cached resolution
    Clear,
}
