//! Graph resolution phases.
//!
//! 1) inheritance, 2) wildcard edges, 3) field edges and junction nodes,
//! 4) self-referencing back references, 5) shared references.
//! Every pass iterates in key order so the output is reproducible.

use super::{BuildPhase, Edge, EdgeKey, Graph, insert_unique};
use crate::error::{Result, SchemaError};
use crate::field::{Field, FieldKind, FieldSet};
use crate::node::{ANY_KEY, DerivedNode, Node, NodeKind, RESOURCE_KEY};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Default)]
struct InheritancePass {
    resolved: BTreeSet<String>,
    in_progress: Vec<String>,
}

impl Graph {
    pub(super) fn run_phases(&mut self) -> Result<()> {
        insert_unique(&mut self.nodes, Node::Any)?;
        insert_unique(&mut self.nodes, Node::Element)?;

        // Phase 1: inheritance, before any edge exists.
        let mut pass = InheritancePass::default();
        for key in self.parsed_keys() {
            self.resolve_inheritance_with(&key, &mut pass)?;
        }
        self.advance(BuildPhase::InheritanceResolved);

        // Phase 2: the wildcard node reaches every concrete entity.
        for key in self.concrete_parsed_keys() {
            self.add_edge(Edge::new(ANY_KEY, NodeKind::Any, None, key));
        }
        self.advance(BuildPhase::UniversalEdges);

        // Phase 3: one or more edges per relationship field.
        for key in self.concrete_parsed_keys() {
            let fields: Vec<Field> = match self.nodes.get(&key) {
                Some(node) => node.fields().relationship_fields().cloned().collect(),
                None => continue,
            };
            for field in fields {
                self.add_field_edges(&key, field)?;
            }
        }
        self.advance(BuildPhase::FieldEdges);

        // Phase 4 and 5 only look at the complete edge population.
        self.mark_self_referencing_back_references();
        self.advance(BuildPhase::SelfReferencesMarked);
        self.mark_shared_references();
        self.advance(BuildPhase::Complete);

        tracing::debug!(
            nodes = self.nodes.len(),
            meta_nodes = self.meta_nodes.len(),
            edges = self.edges.len(),
            "graph build complete"
        );
        Ok(())
    }

    fn parsed_keys(&self) -> Vec<String> {
        self.nodes
            .values()
            .filter(|n| n.kind() == NodeKind::Parsed)
            .map(|n| n.key().to_string())
            .collect()
    }

    fn concrete_parsed_keys(&self) -> Vec<String> {
        self.parsed_keys()
            .into_iter()
            .filter(|key| !self.is_meta(key))
            .collect()
    }

    fn add_meta_node(&mut self, key: &str) {
        if key == RESOURCE_KEY {
            return;
        }
        self.meta_nodes.insert(key.to_string());
    }

    /// Resolve the inherited fields of one entity, parents first.
    ///
    /// Recomputes from the parents' resolved fields each time, so calling it
    /// again yields the same field set.
    #[cfg(test)]
    pub(crate) fn resolve_inheritance(&mut self, key: &str) -> Result<()> {
        self.resolve_inheritance_with(key, &mut InheritancePass::default())
    }

    fn resolve_inheritance_with(&mut self, key: &str, pass: &mut InheritancePass) -> Result<()> {
        if pass.resolved.contains(key) {
            return Ok(());
        }
        let parents = match self.nodes.get(key) {
            Some(Node::Parsed(node)) => node.parents().to_vec(),
            Some(_) => return Ok(()),
            None => return Err(SchemaError::model(key, "entity is not in the graph")),
        };
        if pass.in_progress.iter().any(|k| k == key) {
            return Err(SchemaError::model(
                key,
                format!("inheritance cycle: {} -> {}", pass.in_progress.join(" -> "), key),
            ));
        }
        pass.in_progress.push(key.to_string());

        let mut inherited = FieldSet::default();
        for parent in &parents {
            match self.nodes.get(&parent.key) {
                Some(Node::Parsed(_)) => self.resolve_inheritance_with(&parent.key, pass)?,
                Some(Node::Element) => {}
                Some(other) => {
                    return Err(SchemaError::model(
                        key,
                        format!(
                            "parent {} is a {:?} node; only parsed or element nodes can be inherited from",
                            parent.key,
                            other.kind()
                        ),
                    ));
                }
                None => {
                    return Err(SchemaError::model(
                        key,
                        format!("parent {} is not in the graph", parent.key),
                    ));
                }
            }
            self.add_meta_node(&parent.key);

            let parent_fields = match self.nodes.get(&parent.key) {
                Some(node) => node.fields().into_owned(),
                None => FieldSet::default(),
            };
            for name in &parent.fields {
                let field = parent_fields.get_ignore_case(name).ok_or_else(|| {
                    SchemaError::model(
                        key,
                        format!("parent {} has no field {}", parent.key, name),
                    )
                })?;
                inherited.insert(field.rehomed(key));
            }
        }

        if let Some(Node::Parsed(node)) = self.nodes.get_mut(key) {
            tracing::debug!(key, inherited = inherited.len(), "resolved inheritance");
            node.set_inherited(inherited);
        }
        pass.in_progress.pop();
        pass.resolved.insert(key.to_string());
        Ok(())
    }

    fn add_edge(&mut self, edge: Edge) {
        let key = edge.key();
        tracing::debug!(?key, "edge");
        if self.edges.insert(key.clone(), edge).is_some() {
            tracing::debug!(?key, "edge replaced an existing edge with the same identity");
        }
    }

    fn node_kind(&self, owner: &str, field: &Field, key: &str) -> Result<NodeKind> {
        self.nodes.get(key).map(Node::kind).ok_or_else(|| {
            SchemaError::resolution(
                owner,
                &field.key,
                format!("destination {} is not in the graph", key),
            )
        })
    }

    /// Cardinality and polymorphism decide direction: the "many" side
    /// always holds the foreign key.
    fn add_field_edges(&mut self, owner: &str, field: Field) -> Result<()> {
        match field.kind.clone() {
            FieldKind::Exclusive { target } => {
                let target_kind = self.node_kind(owner, &field, &target)?;
                let edge = if field.ordinality.is_max_one() {
                    Edge::new(owner, NodeKind::Parsed, Some(field), target)
                } else {
                    Edge::new(target, target_kind, Some(field), owner)
                };
                self.add_edge(edge);
            }
            FieldKind::Reference { targets }
                if targets.len() == 1 && field.ordinality.is_max_one() =>
            {
                let target = targets[0].clone();
                self.node_kind(owner, &field, &target)?;
                self.add_edge(Edge::new(owner, NodeKind::Parsed, Some(field), target));
            }
            FieldKind::Reference { targets }
                if targets.len() == 1 && field.ordinality.is_many() =>
            {
                let target = targets[0].clone();
                let target_kind = self.node_kind(owner, &field, &target)?;
                self.add_edge(Edge::new(target, target_kind, Some(field), owner));
            }
            FieldKind::Reference { targets } => {
                for target in &targets {
                    self.node_kind(owner, &field, target)?;
                }

                let derived_key = format!("{}.{}", owner, field.key);
                insert_unique(
                    &mut self.nodes,
                    Node::Derived(DerivedNode {
                        key: derived_key.clone(),
                        derived_from: owner.to_string(),
                    }),
                )?;
                tracing::debug!(key = %derived_key, "derived junction node");

                for target in targets {
                    self.add_edge(Edge::new(
                        &derived_key,
                        NodeKind::Derived,
                        Some(field.clone()),
                        target,
                    ));
                }

                let link = if field.ordinality.is_max_one() {
                    Edge::new(owner, NodeKind::Parsed, Some(field), derived_key)
                } else {
                    Edge::new(derived_key, NodeKind::Derived, Some(field), owner)
                };
                self.add_edge(link);
            }
            FieldKind::Primitive { .. } | FieldKind::Code { .. } | FieldKind::Markup => {
                return Err(SchemaError::resolution(
                    owner,
                    &field.key,
                    "base field has no relationship edge",
                ));
            }
        }
        Ok(())
    }

    /// Phase 4: two edges with the same origin, foreign-key column and
    /// destination cannot both keep that column name; the back reference of
    /// the pair is renamed.
    ///
    /// [claim] <- claim_id [claim_related] claim_id -> [claim]
    fn mark_self_referencing_back_references(&mut self) {
        let mut first_seen: BTreeMap<(String, String, String), EdgeKey> = BTreeMap::new();
        let keys: Vec<EdgeKey> = self.edges.keys().cloned().collect();

        for key in keys {
            let (triplet, is_back) = match self.edges.get(&key) {
                Some(edge) => (
                    (edge.origin.clone(), edge.column_name(), edge.destination.clone()),
                    edge.is_back_reference(),
                ),
                None => continue,
            };

            if let Some(other_key) = first_seen.get(&triplet) {
                let other_is_back = self
                    .edges
                    .get(other_key)
                    .is_some_and(Edge::is_back_reference);

                let marked = if is_back && !other_is_back {
                    Some(key.clone())
                } else if other_is_back && !is_back {
                    Some(other_key.clone())
                } else {
                    None
                };
                if let Some(marked) = marked {
                    if let Some(edge) = self.edges.get_mut(&marked) {
                        tracing::debug!(key = ?marked, "self-referencing back reference");
                        edge.self_referencing_back_reference = true;
                    }
                    continue;
                }
            }
            first_seen.insert(triplet, key);
        }
    }

    /// Phase 5: several many-valued relationships between the same two
    /// entities get field-qualified names.
    ///
    /// [care_plan] based_on <- [care_plan]
    /// [care_plan] part_of <- [care_plan]
    fn mark_shared_references(&mut self) {
        let mut first_seen: BTreeMap<(String, String), EdgeKey> = BTreeMap::new();
        let keys: Vec<EdgeKey> = self.edges.keys().cloned().collect();

        for key in keys {
            let pair = match self.edges.get(&key) {
                Some(edge) if edge.is_many_valued() && !edge.self_referencing_back_reference => {
                    (edge.origin.clone(), edge.destination.clone())
                }
                _ => continue,
            };

            match first_seen.get(&pair) {
                Some(shared_key) => {
                    for k in [shared_key.clone(), key] {
                        if let Some(edge) = self.edges.get_mut(&k) {
                            edge.shares_references = true;
                        }
                    }
                }
                None => {
                    first_seen.insert(pair, key);
                }
            }
        }
    }
}
