//! fork command - Copy a solution under a new name

use super::{load_config, source, verbosity};
use crate::cli::args::SourceArgs;
use crate::engine::{self, Context, ForkRequest, Target};
use crate::ui::output;
use anyhow::{Context as _, Result};

/// Fork a solution.
pub fn fork(
    ctx: &Context,
    source_args: &SourceArgs,
    name: &str,
    target: Option<Target>,
    force: bool,
    dry_run: bool,
) -> Result<()> {
    let config = load_config()?;
    let verbosity = verbosity(ctx);
    let (source, skip_levels) = source(ctx, source_args, &config)?;
    let target_path = target.as_ref().map(|t| t.path().to_path_buf());

    let outcome = engine::fork(
        &config,
        ForkRequest {
            source,
            new_name: name.to_string(),
            target,
            skip_levels,
            force,
            dry_run,
        },
    )
    .with_context(|| format!("Failed to fork '{}'", source_args.source.display()))?;
    let report = &outcome.report;

    for warning in &report.warnings {
        output::warn(warning, verbosity);
    }
    for change in &report.changed {
        output::print(
            output::format_file_count(&change.path, change.count, "replacement"),
            verbosity,
        );
    }
    for (from, to) in &report.renamed {
        output::print(format!("{from} -> {to}"), verbosity);
    }
    for path in &report.deleted {
        output::print(format!("{path}: removed"), verbosity);
    }
    for (path, reason) in &report.skipped {
        output::debug(format!("{path}: skipped ({reason})"), verbosity);
    }

    let summary = format!(
        "'{}' -> '{}' ({} replacements in {} files)",
        report.old_name,
        report.new_name,
        report.replacements(),
        report.changed.len()
    );
    match (outcome.written, target_path) {
        (true, Some(path)) => output::print(
            format!("Forked {summary} into {}", path.display()),
            verbosity,
        ),
        _ => output::print(format!("Dry run: would fork {summary}"), verbosity),
    }
    Ok(())
}
