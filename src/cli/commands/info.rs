//! info command - Show the annotated solution tree

use super::{load_config, source};
use crate::cli::args::SourceArgs;
use crate::core::tree::SolutionTree;
use crate::engine::{self, Context};
use anyhow::{Context as _, Result};

/// Print every file with its kind, object type and encoding.
///
/// This is a read-only listing and is printed even with `--quiet`.
pub fn info(ctx: &Context, source_args: &SourceArgs) -> Result<()> {
    let config = load_config()?;
    let (source, skip_levels) = source(ctx, source_args, &config)?;
    let tree = engine::info(&source, skip_levels)
        .with_context(|| format!("Failed to load '{}'", source_args.source.display()))?;

    for line in render(&tree) {
        println!("{line}");
    }
    Ok(())
}

fn render(tree: &SolutionTree) -> Vec<String> {
    let manifest = &tree.manifest;
    let mut lines = vec![format!("Solution: {}", manifest.name)];
    if let Some(version) = manifest.version() {
        lines.push(format!("Version: {version}"));
    }
    lines.push(format!("Manifest: {}", manifest.file_name()));
    lines.push(String::new());

    for (path, file) in tree.files() {
        let object_type = file
            .kind
            .object_type()
            .map(|t| t.as_str())
            .unwrap_or("-");
        lines.push(format!(
            "{path}\t{}\t{object_type}\t{}",
            file.kind.label(),
            file.encoding
        ));
    }
    lines
}
