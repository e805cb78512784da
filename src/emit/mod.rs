//! Descriptor emission: tables, foreign keys and named relationships for
//! the writable part of a built graph.

use crate::error::Result;
use crate::field::StorageType;
use crate::graph::Graph;
use crate::naming::truncate_identifier;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Surrogate identity column present on every table.
pub const IDENTITY_COLUMN: &str = "_id";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    pub name: String,
    pub storage_type: StorageType,
    pub nullable: bool,
    pub unique: bool,
    pub indexed: bool,
    pub primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ConstraintDescriptor {
    /// Named explicitly; relationship tooling cannot use engine-generated names.
    Unique { name: String, columns: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub constraints: Vec<ConstraintDescriptor>,
    pub indexes: Vec<IndexDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDescriptor {
    pub name: String,
    pub columns: Vec<String>,
}

impl TableDescriptor {
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyDescriptor {
    pub source_table: String,
    pub foreign_key_column: String,
    pub destination_table: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipDescriptor {
    pub source_table: String,
    pub object_relationship_name: String,
    pub array_relationship_name: String,
    pub destination_table: String,
    pub foreign_key_column: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDescriptors {
    pub tables: Vec<TableDescriptor>,
    pub foreign_keys: Vec<ForeignKeyDescriptor>,
    pub relationships: Vec<RelationshipDescriptor>,
    /// Columns the public role may read, per table.
    pub readable_columns: BTreeMap<String, Vec<String>>,
}

impl SchemaDescriptors {
    pub fn table(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn foreign_keys_from<'a>(
        &'a self,
        table: &'a str,
    ) -> impl Iterator<Item = &'a ForeignKeyDescriptor> + 'a {
        self.foreign_keys.iter().filter(move |fk| fk.source_table == table)
    }
}

/// Emit descriptors for the entities selected by `filter` (empty = all).
pub fn build_descriptors(graph: &Graph, filter: &[String]) -> Result<SchemaDescriptors> {
    let writable = graph.writable_nodes(filter)?;
    let mut out = SchemaDescriptors::default();

    // Phase 1: one table per writable node, in key order.
    for key in &writable {
        let Some(node) = graph.node(key) else {
            continue;
        };
        let table_name = node.database_name();

        let mut columns = vec![ColumnDescriptor {
            name: IDENTITY_COLUMN.to_string(),
            storage_type: StorageType::Integer,
            nullable: false,
            unique: false,
            indexed: false,
            primary_key: true,
        }];
        let mut constraints = Vec::new();
        let mut indexes = Vec::new();

        let fields = node.fields();
        for field in fields.base_fields() {
            let Some(storage_type) = field.storage_type(&table_name) else {
                continue;
            };
            let column_name = field.database_name();
            if field.is_unique() {
                constraints.push(ConstraintDescriptor::Unique {
                    name: truncate_identifier(&format!("{}_{}_key", table_name, column_name)),
                    columns: vec![column_name.clone()],
                });
            }
            if field.is_indexed() {
                indexes.push(IndexDescriptor {
                    name: truncate_identifier(&format!("ix_{}_{}", table_name, column_name)),
                    columns: vec![column_name.clone()],
                });
            }
            columns.push(ColumnDescriptor {
                name: column_name,
                storage_type,
                nullable: !field.ordinality.is_required(),
                unique: field.is_unique(),
                indexed: field.is_indexed(),
                primary_key: false,
            });
        }

        out.readable_columns.insert(
            table_name.clone(),
            columns.iter().map(|c| c.name.clone()).collect(),
        );
        out.tables.push(TableDescriptor {
            name: table_name,
            columns,
            constraints,
            indexes,
        });
    }

    // Phase 2: foreign keys and relationships for edges inside the selection.
    for edge in graph.edges() {
        if !writable.contains(&edge.origin) || !writable.contains(&edge.destination) {
            continue;
        }
        let (Some(origin), Some(destination)) =
            (graph.node(&edge.origin), graph.node(&edge.destination))
        else {
            continue;
        };
        let source_table = origin.database_name();
        let destination_table = destination.database_name();
        let column = edge.column_name();

        out.foreign_keys.push(ForeignKeyDescriptor {
            source_table: source_table.clone(),
            foreign_key_column: column.clone(),
            destination_table: destination_table.clone(),
        });
        out.relationships.push(RelationshipDescriptor {
            source_table: source_table.clone(),
            object_relationship_name: edge.object_relationship_name(),
            array_relationship_name: edge.array_relationship_name(),
            destination_table,
            foreign_key_column: column.clone(),
        });
        out.readable_columns
            .entry(source_table)
            .or_default()
            .push(column);
    }

    warn_on_collisions(&out);
    tracing::info!(
        tables = out.tables.len(),
        foreign_keys = out.foreign_keys.len(),
        "emitted schema descriptors"
    );
    Ok(out)
}

/// Abbreviation can map distinct names onto one identifier; report it.
fn warn_on_collisions(descriptors: &SchemaDescriptors) {
    for (table, columns) in &descriptors.readable_columns {
        let mut seen = BTreeSet::new();
        for column in columns {
            if !seen.insert(column) {
                tracing::warn!(table = %table, column = %column, "duplicate column name");
            }
        }
    }

    let mut tables = BTreeSet::new();
    for table in &descriptors.tables {
        if !tables.insert(&table.name) {
            tracing::warn!(table = %table.name, "duplicate table name");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;
    use crate::node::nodes_from_block;
    use crate::row::RowParser;
    use pretty_assertions::assert_eq;

    const RESOURCE: &[&str] = &[
        "[ a fhir:Resource;",
        "  fhir:Resource.id [ id ]; # 0..1 Logical id of this artifact",
        "]",
    ];

    const ORGANIZATION: &[&str] = &[
        "[ a fhir:Organization;",
        "  # from Resource: .id",
        "  fhir:Organization.name [ string ]; # 0..1 Name used for the organization",
        "]",
    ];

    const PATIENT: &[&str] = &[
        "[ a fhir:Patient;",
        "  # from Resource: .id",
        "  fhir:Patient.active [ boolean ]; # 0..1 Whether this patient's record is in active use",
        "  fhir:Patient.gender [ code ]; # 0..1 male | female | other | unknown",
        "  fhir:Patient.birthDate [ date ]; # 1..1 The date of birth for the individual",
        "  fhir:Patient.managingOrganization [ Reference(Organization) ]; # 0..1 Organization that is the custodian",
        "]",
    ];

    fn graph() -> Graph {
        let parser = RowParser::new().unwrap();
        let mut builder = GraphBuilder::new();
        for block in [RESOURCE, ORGANIZATION, PATIENT] {
            builder
                .add_parsed_nodes(nodes_from_block(&parser, block).unwrap())
                .unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    fn base_fields_become_typed_columns() {
        let descriptors = build_descriptors(&graph(), &[]).unwrap();
        let patient = descriptors.table("patient").unwrap();

        let names: Vec<&str> = patient.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["_id", "id", "active", "gender", "birth_date"]);

        let identity = patient.column(IDENTITY_COLUMN).unwrap();
        assert!(identity.primary_key && !identity.nullable);

        let active = patient.column("active").unwrap();
        assert_eq!(active.storage_type, StorageType::Boolean);
        assert!(active.nullable);
        assert!(!active.unique);

        assert!(!patient.column("birth_date").unwrap().nullable);
        assert_eq!(
            patient.column("gender").unwrap().storage_type,
            StorageType::Enum {
                name: "patient_gender_code".into(),
                options: vec!["female".into(), "male".into(), "other".into(), "unknown".into()],
            }
        );
    }

    #[test]
    fn unique_and_indexed_fields_get_named_objects() {
        let descriptors = build_descriptors(&graph(), &[]).unwrap();
        let patient = descriptors.table("patient").unwrap();
        assert_eq!(
            patient.constraints,
            vec![ConstraintDescriptor::Unique {
                name: "patient_id_key".into(),
                columns: vec!["id".into()],
            }]
        );
        assert_eq!(patient.indexes[0].name, "ix_patient_id");
    }

    #[test]
    fn edges_between_writable_tables_become_foreign_keys() {
        let descriptors = build_descriptors(&graph(), &[]).unwrap();
        let from_patient: Vec<_> = descriptors.foreign_keys_from("patient").collect();
        assert_eq!(
            from_patient,
            vec![&ForeignKeyDescriptor {
                source_table: "patient".into(),
                foreign_key_column: "managing_organization_id".into(),
                destination_table: "organization".into(),
            }]
        );
        let readable = &descriptors.readable_columns["patient"];
        assert_eq!(readable.last().map(String::as_str), Some("managing_organization_id"));

        let relationship = descriptors
            .relationships
            .iter()
            .find(|r| r.source_table == "patient")
            .unwrap();
        assert_eq!(relationship.object_relationship_name, "managing_organization");
        assert_eq!(relationship.array_relationship_name, "patient_managing_organization");
    }

    #[test]
    fn filtered_emission_drops_edges_leaving_the_selection() {
        let descriptors = build_descriptors(&graph(), &["Patient".to_string()]).unwrap();
        let tables: Vec<&str> = descriptors.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tables, vec!["patient"]);
        assert!(descriptors.foreign_keys.is_empty());
    }
}
