//! PostgreSQL DDL for emitted descriptors.

use crate::emit::{ConstraintDescriptor, IDENTITY_COLUMN, SchemaDescriptors, TableDescriptor};
use crate::field::StorageType;
use std::collections::BTreeMap;
use std::fmt::Write;

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn column_type(storage_type: &StorageType) -> String {
    match storage_type {
        StorageType::Integer => "integer".to_string(),
        StorageType::BigInt => "bigint".to_string(),
        StorageType::Numeric => "numeric".to_string(),
        StorageType::Boolean => "boolean".to_string(),
        StorageType::Date => "date".to_string(),
        StorageType::Timestamptz => "timestamp with time zone".to_string(),
        StorageType::Time => "time".to_string(),
        StorageType::Varchar => "varchar".to_string(),
        StorageType::Uuid => "uuid".to_string(),
        StorageType::Jsonb => "jsonb".to_string(),
        StorageType::Enum { name, .. } => quote_ident(name),
    }
}

/// Render the whole schema as one script: enum types, tables, indexes,
/// then foreign-key columns once every referenced table exists.
pub fn render_sql(descriptors: &SchemaDescriptors) -> anyhow::Result<String> {
    let mut out = String::new();

    let mut enums: BTreeMap<&str, &[String]> = BTreeMap::new();
    for table in &descriptors.tables {
        for column in &table.columns {
            if let StorageType::Enum { name, options } = &column.storage_type {
                enums.insert(name, options);
            }
        }
    }
    for (name, options) in &enums {
        let options: Vec<String> = options.iter().map(|o| quote_literal(o)).collect();
        writeln!(
            out,
            "CREATE TYPE {} AS ENUM ({});",
            quote_ident(name),
            options.join(", ")
        )?;
    }
    if !enums.is_empty() {
        writeln!(out)?;
    }

    for table in &descriptors.tables {
        write_table(&mut out, table)?;
    }

    for fk in &descriptors.foreign_keys {
        writeln!(
            out,
            "ALTER TABLE {} ADD COLUMN {} integer REFERENCES {} ({});",
            quote_ident(&fk.source_table),
            quote_ident(&fk.foreign_key_column),
            quote_ident(&fk.destination_table),
            quote_ident(IDENTITY_COLUMN)
        )?;
    }

    Ok(out)
}

fn write_table(out: &mut String, table: &TableDescriptor) -> std::fmt::Result {
    let mut lines = Vec::with_capacity(table.columns.len() + table.constraints.len());
    for column in &table.columns {
        if column.primary_key {
            lines.push(format!("{} serial PRIMARY KEY", quote_ident(&column.name)));
            continue;
        }
        let mut line = format!(
            "{} {}",
            quote_ident(&column.name),
            column_type(&column.storage_type)
        );
        if !column.nullable {
            line.push_str(" NOT NULL");
        }
        lines.push(line);
    }
    for constraint in &table.constraints {
        match constraint {
            ConstraintDescriptor::Unique { name, columns } => {
                let columns: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
                lines.push(format!(
                    "CONSTRAINT {} UNIQUE ({})",
                    quote_ident(name),
                    columns.join(", ")
                ));
            }
        }
    }

    writeln!(out, "CREATE TABLE {} (", quote_ident(&table.name))?;
    writeln!(out, "    {}", lines.join(",\n    "))?;
    writeln!(out, ");")?;

    for index in &table.indexes {
        let columns: Vec<String> = index.columns.iter().map(|c| quote_ident(c)).collect();
        writeln!(
            out,
            "CREATE INDEX {} ON {} ({});",
            quote_ident(&index.name),
            quote_ident(&table.name),
            columns.join(", ")
        )?;
    }
    writeln!(out)
}
