//! Loads intake documents from disk.

use std::path::Path;

use anyhow::Context;
use declara_core::models::SourceFile;
use declara_core::{DocumentValidator, ValidationError};

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Read a file whole, named after its last path component.
pub fn read_source(path: &Path) -> anyhow::Result<SourceFile> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(SourceFile::new(display_name(path), bytes))
}

/// Read every path, rejecting oversized files from their metadata without reading them.
pub fn load_sources<P: AsRef<Path>>(
    paths: &[P],
    validator: &DocumentValidator,
) -> anyhow::Result<(Vec<SourceFile>, Vec<ValidationError>)> {
    let mut sources = Vec::new();
    let mut rejected = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let size = std::fs::metadata(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
            .len();
        if let Err(e) = validator.validate_size(&display_name(path), size) {
            rejected.push(e);
            continue;
        }
        sources.push(read_source(path)?);
    }

    Ok((sources, rejected))
}
