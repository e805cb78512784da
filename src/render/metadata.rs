//! Relationship configuration for the query layer: one YAML document per
//! table plus an index that includes them.

use crate::emit::SchemaDescriptors;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

const SCHEMA: &str = "public";
const ROLE: &str = "public";

/// File listing every per-table document.
pub const TABLES_FILE: &str = "tables.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct TableRef {
    name: String,
    schema: String,
}

impl TableRef {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            schema: SCHEMA.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ObjectRelationship {
    name: String,
    using: ObjectUsing,
}

#[derive(Debug, Serialize)]
struct ObjectUsing {
    foreign_key_constraint_on: String,
}

#[derive(Debug, Serialize)]
struct ArrayRelationship {
    name: String,
    using: ArrayUsing,
}

#[derive(Debug, Serialize)]
struct ArrayUsing {
    foreign_key_constraint_on: RemoteColumn,
}

#[derive(Debug, Serialize)]
struct RemoteColumn {
    column: String,
    table: TableRef,
}

#[derive(Debug, Serialize)]
struct SelectPermission {
    role: String,
    permission: Permission,
}

#[derive(Debug, Serialize)]
struct Permission {
    columns: Vec<String>,
    filter: BTreeMap<String, String>,
    allow_aggregations: bool,
}

#[derive(Debug, Serialize)]
struct TableMetadata {
    table: TableRef,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    object_relationships: Vec<ObjectRelationship>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    array_relationships: Vec<ArrayRelationship>,
    select_permissions: Vec<SelectPermission>,
}

impl TableMetadata {
    fn new(table: &str, columns: Vec<String>) -> Self {
        Self {
            table: TableRef::new(table),
            object_relationships: Vec::new(),
            array_relationships: Vec::new(),
            select_permissions: vec![SelectPermission {
                role: ROLE.to_string(),
                permission: Permission {
                    columns,
                    filter: BTreeMap::new(),
                    allow_aggregations: true,
                },
            }],
        }
    }
}

pub fn table_file_name(table: &str) -> String {
    format!("{}_{}.yaml", SCHEMA, table)
}

/// Render every metadata document, keyed by file name.
pub fn render_metadata(descriptors: &SchemaDescriptors) -> anyhow::Result<BTreeMap<String, String>> {
    let mut tables: BTreeMap<&str, TableMetadata> = BTreeMap::new();
    for table in &descriptors.tables {
        let columns = descriptors
            .readable_columns
            .get(&table.name)
            .cloned()
            .unwrap_or_default();
        tables.insert(&table.name, TableMetadata::new(&table.name, columns));
    }

    for rel in &descriptors.relationships {
        if let Some(source) = tables.get_mut(rel.source_table.as_str()) {
            source.object_relationships.push(ObjectRelationship {
                name: rel.object_relationship_name.clone(),
                using: ObjectUsing {
                    foreign_key_constraint_on: rel.foreign_key_column.clone(),
                },
            });
        }
        if let Some(destination) = tables.get_mut(rel.destination_table.as_str()) {
            destination.array_relationships.push(ArrayRelationship {
                name: rel.array_relationship_name.clone(),
                using: ArrayUsing {
                    foreign_key_constraint_on: RemoteColumn {
                        column: rel.foreign_key_column.clone(),
                        table: TableRef::new(&rel.source_table),
                    },
                },
            });
        }
    }

    let mut files = BTreeMap::new();
    let mut includes = Vec::with_capacity(tables.len());
    for (name, metadata) in &tables {
        warn_on_duplicate_relationships(name, metadata);
        let file_name = table_file_name(name);
        files.insert(file_name.clone(), serde_yaml::to_string(metadata)?);
        includes.push(format!("!include {}", file_name));
    }
    files.insert(TABLES_FILE.to_string(), render_includes(&includes)?);
    Ok(files)
}

/// The metadata loader expects `- "!include <file>"`, double-quoted.
/// A JSON string literal is a valid double-quoted YAML scalar.
fn render_includes(includes: &[String]) -> anyhow::Result<String> {
    if includes.is_empty() {
        return Ok("[]\n".to_string());
    }
    let mut out = String::new();
    for include in includes {
        out.push_str("- ");
        out.push_str(&serde_json::to_string(include)?);
        out.push('\n');
    }
    Ok(out)
}

fn warn_on_duplicate_relationships(table: &str, metadata: &TableMetadata) {
    let names = metadata
        .object_relationships
        .iter()
        .map(|r| &r.name)
        .chain(metadata.array_relationships.iter().map(|r| &r.name));
    let mut seen = BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            tracing::warn!(table, relationship = %name, "duplicate relationship name");
        }
    }
}
