//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Resolves paths and config defaults for its arguments
//! 2. Calls the engine to run the operation
//! 3. Formats and displays the report
//!
//! Handlers never touch solution files directly.

mod completion;
mod config_cmd;
mod fork;
mod info;
mod isolate;

// Re-export command functions for testing and direct invocation
pub use completion::completion;
pub use config_cmd::{get as config_get, list as config_list, set as config_set};
pub use fork::fork;
pub use info::info;
pub use isolate::isolate;

use std::path::PathBuf;

use crate::cli::args::{Command, ConfigAction, SourceArgs};
use crate::core::config::Config;
use crate::engine::{Context, Source, Target};
use crate::ui::output::Verbosity;
use anyhow::{Context as _, Result};

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Isolate {
            source,
            tag,
            env_file,
            target_dir,
            target_file,
            force,
        } => isolate::isolate(
            ctx,
            &source,
            tag,
            env_file,
            target(ctx, target_dir, target_file),
            force,
        ),
        Command::Fork {
            source,
            name,
            target_dir,
            target_file,
            force,
            dry_run,
        } => fork::fork(
            ctx,
            &source,
            &name,
            target(ctx, target_dir, target_file),
            force,
            dry_run,
        ),
        Command::Info { source } => info::info(ctx, &source),
        Command::Config { action } => match action {
            ConfigAction::Get { key } => config_cmd::get(ctx, &key),
            ConfigAction::Set { key, value } => config_cmd::set(ctx, &key, &value),
            ConfigAction::List => config_cmd::list(ctx),
        },
        Command::Completion { shell } => completion::completion(shell),
    }
}

/// Load the global config.
fn load_config() -> Result<Config> {
    Ok(Config::load().context("Failed to load config")?.config)
}

fn verbosity(ctx: &Context) -> Verbosity {
    Verbosity::from_flags(ctx.quiet, ctx.debug)
}

/// Resolve the source path and the skip depth, falling back to config.
fn source(ctx: &Context, args: &SourceArgs, config: &Config) -> Result<(Source, usize)> {
    let path = ctx.resolve(&args.source);
    let source = Source::from_path(&path)
        .with_context(|| format!("Cannot read solution from '{}'", path.display()))?;
    Ok((source, args.skip_levels.unwrap_or(config.skip_levels())))
}

fn target(ctx: &Context, dir: Option<PathBuf>, file: Option<PathBuf>) -> Option<Target> {
    match (dir, file) {
        (Some(dir), _) => Some(Target::Dir(ctx.resolve(dir))),
        (None, Some(file)) => Some(Target::Archive(ctx.resolve(file))),
        (None, None) => None,
    }
}
