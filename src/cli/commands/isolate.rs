//! isolate command - Resolve expressions for one environment

use std::path::PathBuf;

use super::{load_config, source, verbosity};
use crate::cli::args::SourceArgs;
use crate::engine::{self, Context, EngineError, IsolateRequest, Target};
use crate::isolation::EnvironmentSource;
use crate::ui::output;
use anyhow::{Context as _, Result};

/// Isolate a solution.
pub fn isolate(
    ctx: &Context,
    source_args: &SourceArgs,
    tag: Option<String>,
    env_file: Option<PathBuf>,
    target: Option<Target>,
    force: bool,
) -> Result<()> {
    let config = load_config()?;
    let verbosity = verbosity(ctx);
    let (source, skip_levels) = source(ctx, source_args, &config)?;
    let environment = EnvironmentSource::resolve(tag, env_file.map(|p| ctx.resolve(p)))?;
    let target = target.ok_or(EngineError::MissingTarget)?;
    let target_path = target.path().to_path_buf();

    let outcome = engine::isolate(
        &config,
        IsolateRequest {
            source,
            environment,
            target,
            skip_levels,
            force,
        },
    )
    .with_context(|| format!("Failed to isolate '{}'", source_args.source.display()))?;

    for (path, count) in &outcome.report.changed {
        output::print(output::format_file_count(path, *count, "marker"), verbosity);
    }
    for leftover in &outcome.leftovers {
        output::warn(
            format!("unresolved marker {} in {}", leftover.marker, leftover.path),
            verbosity,
        );
    }
    output::print(
        format!(
            "Isolated '{}' into {} ({} markers in {} files)",
            outcome.report.solution_id,
            target_path.display(),
            outcome.report.resolved(),
            outcome.report.changed.len()
        ),
        verbosity,
    );
    Ok(())
}
