//! engine::runner
//!
//! Operation runners: one function per command, each running the full
//! Load -> Transform -> Check -> Emit lifecycle.

use tracing::{info, warn};

use super::{EngineError, Source, Target};
use crate::core::config::Config;
use crate::core::tree::SolutionTree;
use crate::fork::{self as forking, ForkOptions, ForkReport};
use crate::isolation::{
    find_leftover_markers, Environment, EnvironmentSource, IsolationReport, Isolator,
    LeftoverMarker,
};

/// Inputs for an isolation.
#[derive(Debug, Clone)]
pub struct IsolateRequest {
    pub source: Source,
    pub environment: EnvironmentSource,
    pub target: Target,
    pub skip_levels: usize,
    pub force: bool,
}

/// Result of an isolation.
#[derive(Debug, Clone)]
pub struct IsolateOutcome {
    pub report: IsolationReport,
    /// Non-inert markers still present in the output.
    pub leftovers: Vec<LeftoverMarker>,
}

/// Inputs for a fork.
#[derive(Debug, Clone)]
pub struct ForkRequest {
    pub source: Source,
    pub new_name: String,
    /// `None` only for dry runs.
    pub target: Option<Target>,
    pub skip_levels: usize,
    pub force: bool,
    pub dry_run: bool,
}

/// Result of a fork.
#[derive(Debug, Clone)]
pub struct ForkOutcome {
    pub report: ForkReport,
    /// Whether anything was written.
    pub written: bool,
}

/// Isolate a solution into a new directory or archive.
pub fn isolate(config: &Config, request: IsolateRequest) -> Result<IsolateOutcome, EngineError> {
    request.target.check(request.force)?;

    let environment = Environment::load(&request.environment)?;
    let loaded = request.source.load(request.skip_levels)?;

    let mut isolator = Isolator::new(config.default_tag());
    let (tree, report) = isolator.isolate(&loaded.tree, environment)?;

    let leftovers = find_leftover_markers(&tree)?;
    for leftover in &leftovers {
        warn!(path = %leftover.path, marker = %leftover.marker, "unresolved marker after isolation");
    }
    if !leftovers.is_empty() && !config.allow_leftover_markers() {
        return Err(EngineError::LeftoverMarkers {
            count: leftovers.len(),
        });
    }

    request.target.emit(&tree, request.force)?;
    info!(target = %request.target.path().display(), "isolated solution written");
    Ok(IsolateOutcome { report, leftovers })
}

/// Fork a solution under a new name.
///
/// With `dry_run` the report is computed and nothing is written.
pub fn fork(config: &Config, request: ForkRequest) -> Result<ForkOutcome, EngineError> {
    let target = match (&request.target, request.dry_run) {
        (Some(target), false) => {
            target.check(request.force)?;
            Some(target)
        }
        (_, true) => None,
        (None, false) => return Err(EngineError::MissingTarget),
    };

    let mut loaded = request.source.load(request.skip_levels)?;
    let options = ForkOptions {
        path_warnings: config.fork_path_warnings(),
    };
    let report = forking::fork(&mut loaded.tree, &request.new_name, &options)?;

    let written = match target {
        Some(target) => {
            target.emit(&loaded.tree, request.force)?;
            info!(target = %target.path().display(), "forked solution written");
            true
        }
        None => false,
    };
    Ok(ForkOutcome { report, written })
}

/// Load and annotate a solution without changing it.
pub fn info(source: &Source, skip_levels: usize) -> Result<SolutionTree, EngineError> {
    Ok(source.load(skip_levels)?.tree)
}
