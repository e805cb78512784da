//! Row-to-entity assembly.
//!
//! A block of rows is walked depth-first with a stack of open tiers: each
//! row lands on the innermost open entity, a subnode-opening row pushes a
//! fresh child after it is appended, and a closing row pops.

use crate::error::{Result, SchemaError};
use crate::field::FieldSet;
use crate::node::{BACKBONE_ELEMENT_KEY, BACKBONE_INHERITED_FIELDS, ParentRef, ParsedNode};
use crate::row::{Row, RowParser};

/// Mutable accumulator of rows for one entity.
#[derive(Debug, Default)]
pub struct NodeBuilder {
    rows: Vec<Row>,
}

impl NodeBuilder {
    pub fn append_row(&mut self, row: Row) {
        self.rows.push(row);
    }

    /// Freeze the rows into a [`ParsedNode`], deriving key, own fields and
    /// parent references.
    pub fn finish(self) -> Result<ParsedNode> {
        let key = self
            .rows
            .iter()
            .find_map(|row| row.key.clone())
            .ok_or_else(|| {
                let first = self.rows.first().map(|r| r.line.trim()).unwrap_or("<empty>");
                SchemaError::model(first, "entity has no keyed row")
            })?;

        let mut own_fields = FieldSet::default();
        for row in self.rows.iter().filter(|row| row.key.is_some()) {
            own_fields.insert(row.as_field(&key)?);
        }

        let mut parents: Vec<ParentRef> = Vec::new();
        for annotation in self.rows.iter().filter_map(|row| row.parent.as_ref()) {
            push_parent(&mut parents, &annotation.parent, annotation.fields.clone());
        }
        if key.contains('.') {
            push_parent(
                &mut parents,
                BACKBONE_ELEMENT_KEY,
                BACKBONE_INHERITED_FIELDS.iter().map(|f| f.to_string()).collect(),
            );
        }

        tracing::debug!(
            key = %key,
            fields = own_fields.len(),
            parents = parents.len(),
            "finished entity"
        );
        Ok(ParsedNode::new(key, own_fields, parents))
    }
}

/// A later annotation for the same parent replaces the earlier one.
fn push_parent(parents: &mut Vec<ParentRef>, key: &str, fields: Vec<String>) {
    match parents.iter_mut().find(|p| p.key == key) {
        Some(existing) => existing.fields = fields,
        None => parents.push(ParentRef {
            key: key.to_string(),
            fields,
        }),
    }
}

/// Assemble one text block's rows into the root entity plus one entity per
/// nested subnode.
pub fn nodes_from_rows(rows: impl IntoIterator<Item = Row>) -> Result<Vec<ParsedNode>> {
    let mut builders: Vec<NodeBuilder> = vec![NodeBuilder::default()];
    let mut tiers: Vec<usize> = vec![0];

    for row in rows {
        if row.closes_subnode {
            tiers.pop();
            continue;
        }
        if !row.is_informative() {
            continue;
        }

        let Some(&current) = tiers.last() else {
            return Err(SchemaError::parse(
                row.line,
                "row appears after its entity was closed",
            ));
        };

        let opens = row.opens_subnode;
        builders[current].append_row(row);

        if opens {
            builders.push(NodeBuilder::default());
            tiers.push(builders.len() - 1);
        }
    }

    builders.into_iter().map(NodeBuilder::finish).collect()
}

pub fn nodes_from_block<S: AsRef<str>>(parser: &RowParser, lines: &[S]) -> Result<Vec<ParsedNode>> {
    nodes_from_rows(lines.iter().map(|line| parser.parse(line.as_ref())))
}
