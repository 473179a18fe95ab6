//! Inspect command - print a container file's group tree.

use std::path::Path;

use anyhow::{Context, Result};
use grainflow::io::layout::read_tree_file;

/// Run the inspect command.
pub fn run(file: &Path) -> Result<()> {
    tracing::info!(file = %file.display(), "inspecting container file");
    let root = read_tree_file(file)
        .with_context(|| format!("failed to read container file {}", file.display()))?;
    print!("{root}");
    Ok(())
}
