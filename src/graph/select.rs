//! Writable-set selection: which entities get materialized together.

use super::Graph;
use crate::error::{Result, SchemaError};
use crate::field::FieldKind;
use crate::node::Node;
use std::collections::BTreeSet;

impl Graph {
    /// Entities to materialize for `filter`.
    ///
    /// An empty filter selects every concrete entity. Otherwise each
    /// requested resource brings its nested backbone subnodes (reference
    /// relationships are not followed) plus every junction node derived from
    /// a requested resource that points at a requested resource. Junctions
    /// owned by subnodes are never selected.
    pub fn writable_nodes(&self, filter: &[String]) -> Result<BTreeSet<String>> {
        if filter.is_empty() {
            return Ok(self.concrete_nodes().map(|n| n.key().to_string()).collect());
        }

        let requested: BTreeSet<&str> = filter.iter().map(String::as_str).collect();
        let mut selected: BTreeSet<String> = BTreeSet::new();
        for key in &requested {
            if !self.nodes.contains_key(*key) {
                return Err(SchemaError::Selection {
                    key: key.to_string(),
                });
            }
            self.collect_subnodes(key, &mut selected)?;
            selected.insert(key.to_string());
        }

        for node in self.nodes.values() {
            let Node::Derived(derived) = node else {
                continue;
            };
            if selected.contains(&derived.key)
                || !requested.contains(derived.derived_from.as_str())
            {
                continue;
            }
            let connects_selection = self.edges.values().any(|edge| {
                edge.origin == derived.key
                    && edge.is_back_reference()
                    && requested.contains(edge.destination.as_str())
            });
            if connects_selection {
                tracing::debug!(key = %derived.key, "selected junction node");
                selected.insert(derived.key.clone());
            }
        }

        Ok(selected)
    }

    /// Depth-first walk over nested subnodes; `visited` doubles as the result.
    fn collect_subnodes(&self, key: &str, visited: &mut BTreeSet<String>) -> Result<()> {
        let Some(Node::Parsed(node)) = self.nodes.get(key) else {
            return Ok(());
        };
        if !visited.insert(key.to_string()) {
            return Ok(());
        }
        tracing::debug!(key, "collecting subnodes");

        for field in node.fields().relationship_fields() {
            let FieldKind::Exclusive { target } = &field.kind else {
                continue;
            };
            // Backbone elements only, not references to other resources.
            if !target.contains('.') {
                continue;
            }
            if !self.nodes.contains_key(target) {
                return Err(SchemaError::resolution(
                    key,
                    &field.key,
                    format!("subnode {} is not in the graph", target),
                ));
            }
            self.collect_subnodes(target, visited)?;
        }
        Ok(())
    }
}
