//! Schema sink: SQL text and relationship metadata written to disk.

mod metadata;
mod sql;

pub use metadata::{TABLES_FILE, render_metadata, table_file_name};
pub use sql::render_sql;

use crate::emit::SchemaDescriptors;
use anyhow::Context;
use std::fs;
use std::path::Path;

/// Write the DDL script, replacing whatever the file held before.
pub fn write_sql(path: &Path, descriptors: &SchemaDescriptors) -> anyhow::Result<()> {
    let sql = render_sql(descriptors)?;
    fs::write(path, sql).with_context(|| format!("write sql file {}", path.display()))?;
    tracing::info!(path = %path.display(), tables = descriptors.tables.len(), "wrote sql");
    Ok(())
}

/// Write one metadata document per table plus the include index into `dir`.
pub fn write_metadata(dir: &Path, descriptors: &SchemaDescriptors) -> anyhow::Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("create metadata directory {}", dir.display()))?;
    let files = render_metadata(descriptors)?;
    for (name, text) in &files {
        let path = dir.join(name);
        fs::write(&path, text).with_context(|| format!("write metadata file {}", path.display()))?;
    }
    tracing::info!(dir = %dir.display(), files = files.len(), "wrote metadata");
    Ok(())
}

/// Pretty JSON snapshot of every descriptor.
pub fn write_descriptors(path: &Path, descriptors: &SchemaDescriptors) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(descriptors)?;
    fs::write(path, json).with_context(|| format!("write descriptors {}", path.display()))?;
    Ok(())
}
