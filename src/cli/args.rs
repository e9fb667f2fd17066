//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Resolve relative paths against this directory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// solkit - isolate, fork and package solution trees
#[derive(Parser, Debug)]
#[command(name = "solkit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Resolve relative paths as if solkit was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve ${...} expressions for one environment
    #[command(
        name = "isolate",
        long_about = "Resolve every ${...} expression in a solution for one environment.\n\n\
            The manifest is resolved first, so its name becomes available to every \
            other file as sys.solutionId. Expressions read variables from either an \
            explicit --tag or a JSON --env-file; exactly one of the two is required.\n\n\
            Markers whose expression starts with '.' are left untouched for \
            downstream templating.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Isolate a directory for the dev environment
    solkit isolate --source acme --tag dev --target-dir acme-dev

    # Isolate an archive using an environment file, packing the result
    solkit isolate --source acme.zip --env-file envs/qa.json --target-file acme-qa.zip

    # The archive wraps the solution in one top-level directory
    solkit isolate --source acme.zip --skip-levels 1 --tag dev --target-dir out

ENVIRONMENT FILE:
    {\"env\": {\"tag\": \"qa\", \"dependencyTags\": {\"core\": \"beta\"}}}"
    )]
    Isolate {
        #[command(flatten)]
        source: SourceArgs,

        /// Environment tag, exposed as env.tag
        #[arg(long, conflicts_with = "env_file")]
        tag: Option<String>,

        /// JSON file holding the variable environment
        #[arg(long, value_name = "PATH")]
        env_file: Option<PathBuf>,

        /// Write the result to this directory
        #[arg(
            long,
            value_name = "DIR",
            conflicts_with = "target_file",
            required_unless_present = "target_file"
        )]
        target_dir: Option<PathBuf>,

        /// Pack the result into this zip file
        #[arg(long, value_name = "ZIP")]
        target_file: Option<PathBuf>,

        /// Overwrite a non-empty target
        #[arg(long)]
        force: bool,
    },

    /// Copy a solution under a new name
    #[command(
        name = "fork",
        long_about = "Copy a solution under a new identifier.\n\n\
            Every JSON and YAML file is decoded and the old identifier is replaced \
            in string values wherever it appears as a whole word. Keys are never \
            changed and files without a match keep their exact bytes. The namespace \
            object file is renamed, the cached .tag file is dropped, and the \
            manifest's name and object types are updated. A trailing ${...} \
            suffix on the name is kept.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Fork into a new directory
    solkit fork --source acme --name globex --target-dir globex

    # Preview what would change
    solkit fork --source acme --name globex --dry-run

    # Fork an archive into a new archive
    solkit fork --source acme.zip --name globex --target-file globex.zip"
    )]
    Fork {
        #[command(flatten)]
        source: SourceArgs,

        /// New solution identifier (without any ${...} suffix)
        #[arg(long)]
        name: String,

        /// Write the result to this directory
        #[arg(
            long,
            value_name = "DIR",
            conflicts_with = "target_file",
            required_unless_present_any = ["target_file", "dry_run"]
        )]
        target_dir: Option<PathBuf>,

        /// Pack the result into this zip file
        #[arg(long, value_name = "ZIP")]
        target_file: Option<PathBuf>,

        /// Overwrite a non-empty target
        #[arg(long)]
        force: bool,

        /// Print the report without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the annotated solution tree
    #[command(
        name = "info",
        long_about = "Show every file of a solution with the role the manifest gives it.\n\n\
            Each line lists the path, the file kind, the object type if any, and \
            the encoding.",
        after_help = "\
WORKFLOW EXAMPLES:
    solkit info --source acme
    solkit info --source acme.zip --skip-levels 1"
    )]
    Info {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Get, set, or list configuration values
    #[command(
        name = "config",
        long_about = "View or modify solkit configuration.\n\n\
            Configuration is stored in ~/.solkit/config.toml, or the file named by \
            SOLKIT_CONFIG. Use this command to inspect or change settings like the \
            default tag.",
        after_help = "\
WORKFLOW EXAMPLES:
    # List all configuration values
    solkit config list

    # Get a specific value
    solkit config get isolation.default_tag

    # Set a value
    solkit config set archive.skip_levels 1"
    )]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        long_about = "Generate shell completion scripts for tab-completion.\n\n\
            Outputs a completion script for the specified shell. Add the output \
            to your shell's configuration to enable tab-completion for solkit commands.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Bash (add to ~/.bashrc)
    solkit completion bash >> ~/.bashrc

    # Zsh
    solkit completion zsh > ~/.zfunc/_solkit

    # Fish
    solkit completion fish > ~/.config/fish/completions/solkit.fish"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Where to read a solution from.
#[derive(clap::Args, Debug, Clone)]
pub struct SourceArgs {
    /// Solution directory or .zip archive
    #[arg(long, value_name = "PATH")]
    pub source: PathBuf,

    /// Leading directory levels to strip from archive entries
    /// (defaults to archive.skip_levels)
    #[arg(long, value_name = "N")]
    pub skip_levels: Option<usize>,
}

/// Config subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },
    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Value to set
        value: String,
    },
    /// List all configuration values
    List,
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
