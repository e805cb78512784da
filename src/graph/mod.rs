//! Schema graph: entities, inheritance, relationship edges.
//!
//! Entities are collected into a key-indexed arena by [`GraphBuilder`]
//! first; [`GraphBuilder::build`] then runs the resolution phases in order
//! and hands back a read-only [`Graph`].

mod build;
pub mod edge;
mod select;

pub use edge::{Edge, EdgeKey};

use crate::error::{Result, SchemaError};
use crate::node::{Node, ParsedNode};
use std::collections::{BTreeMap, BTreeSet};

/// Build phases, strictly ordered. Edges are only readable once `Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BuildPhase {
    Collecting,
    InheritanceResolved,
    UniversalEdges,
    FieldEdges,
    SelfReferencesMarked,
    Complete,
}

/// Collects entities before resolution.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: BTreeMap<String, Node>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node; its key must not be taken.
    pub fn add_node(&mut self, node: Node) -> Result<()> {
        insert_unique(&mut self.nodes, node)
    }

    pub fn add_parsed_nodes(&mut self, nodes: impl IntoIterator<Item = ParsedNode>) -> Result<()> {
        for node in nodes {
            self.add_node(Node::Parsed(node))?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Run every resolution phase and freeze the result.
    pub fn build(self) -> Result<Graph> {
        let mut graph = Graph {
            nodes: self.nodes,
            meta_nodes: BTreeSet::new(),
            edges: BTreeMap::new(),
            phase: BuildPhase::Collecting,
        };
        graph.run_phases()?;
        Ok(graph)
    }
}

fn insert_unique(nodes: &mut BTreeMap<String, Node>, node: Node) -> Result<()> {
    let key = node.key().to_string();
    if nodes.contains_key(&key) {
        return Err(SchemaError::model(key, "node already exists in graph"));
    }
    nodes.insert(key, node);
    Ok(())
}

#[derive(Debug)]
pub struct Graph {
    nodes: BTreeMap<String, Node>,
    /// Entities only ever used as inheritance parents; never materialized.
    meta_nodes: BTreeSet<String>,
    edges: BTreeMap<EdgeKey, Edge>,
    phase: BuildPhase,
}

impl Graph {
    pub fn phase(&self) -> BuildPhase {
        self.phase
    }

    pub fn node(&self, key: &str) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn meta_nodes(&self) -> &BTreeSet<String> {
        &self.meta_nodes
    }

    pub fn is_meta(&self, key: &str) -> bool {
        self.meta_nodes.contains(key)
    }

    /// Every node that is not an inheritance-only meta node.
    pub fn concrete_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(|n| !self.is_meta(n.key()))
    }

    /// Edges in identity order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn edge(&self, key: &EdgeKey) -> Option<&Edge> {
        self.edges.get(key)
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn advance(&mut self, next: BuildPhase) {
        debug_assert!(next > self.phase, "phase {:?} after {:?}", next, self.phase);
        tracing::debug!(from = ?self.phase, to = ?next, "graph phase");
        self.phase = next;
    }
}
