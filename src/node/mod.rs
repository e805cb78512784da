//! Node model: the entities the graph is built from.
//!
//! Parsed nodes are assembled by [`NodeBuilder`] and frozen by
//! [`NodeBuilder::finish`]; their full field set (own plus inherited) is
//! filled in later by the graph, once every entity is known.

pub mod builder;

pub use builder::{NodeBuilder, nodes_from_block, nodes_from_rows};

use crate::field::{Cardinality, Field, FieldKind, FieldSet, Ordinality, PrimitiveType};
use crate::naming::key_to_database_name;
use serde::Serialize;
use std::borrow::Cow;

pub const ANY_KEY: &str = "Any";
pub const ELEMENT_KEY: &str = "Element";
/// Root of the resource hierarchy; inheriting from it never makes it a meta node.
pub const RESOURCE_KEY: &str = "Resource";
/// Implicit parent of every nested subnode.
pub const BACKBONE_ELEMENT_KEY: &str = "BackboneElement";
pub const BACKBONE_INHERITED_FIELDS: &[&str] = &["extension", "modifierExtension"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum NodeKind {
    Any,
    Element,
    Parsed,
    Derived,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Wildcard destination for untyped references.
    Any,
    /// Built-in base element with the common identity/extension fields.
    Element,
    Parsed(ParsedNode),
    Derived(DerivedNode),
}

impl Node {
    pub fn key(&self) -> &str {
        match self {
            Node::Any => ANY_KEY,
            Node::Element => ELEMENT_KEY,
            Node::Parsed(node) => &node.key,
            Node::Derived(node) => &node.key,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Any => NodeKind::Any,
            Node::Element => NodeKind::Element,
            Node::Parsed(_) => NodeKind::Parsed,
            Node::Derived(_) => NodeKind::Derived,
        }
    }

    pub fn database_name(&self) -> String {
        key_to_database_name(self.key())
    }

    pub fn fields(&self) -> Cow<'_, FieldSet> {
        match self {
            Node::Any | Node::Derived(_) => Cow::Owned(FieldSet::default()),
            Node::Element => Cow::Owned(element_fields()),
            Node::Parsed(node) => Cow::Borrowed(node.fields()),
        }
    }

    pub fn as_parsed(&self) -> Option<&ParsedNode> {
        match self {
            Node::Parsed(node) => Some(node),
            _ => None,
        }
    }
}

/// Fields of the built-in base element, which has no source text.
pub fn element_fields() -> FieldSet {
    [
        Field::new(
            "id",
            ELEMENT_KEY,
            Ordinality::default(),
            FieldKind::Primitive {
                ty: PrimitiveType::Id,
                unique: true,
                indexed: true,
            },
        ),
        Field::new(
            "extension",
            ELEMENT_KEY,
            Ordinality::new(Cardinality::Zero, Cardinality::Many),
            FieldKind::Exclusive {
                target: "Extension".to_string(),
            },
        ),
    ]
    .into_iter()
    .collect()
}

/// Parent reference recorded from `# from Parent: ...` annotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    pub key: String,
    pub fields: Vec<String>,
}

/// Entity assembled from source rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedNode {
    key: String,
    own_fields: FieldSet,
    parents: Vec<ParentRef>,
    /// Inherited fields followed by own fields; equals `own_fields` until
    /// inheritance has been resolved.
    fields: FieldSet,
}

impl ParsedNode {
    pub(crate) fn new(key: String, own_fields: FieldSet, parents: Vec<ParentRef>) -> Self {
        Self {
            key,
            fields: own_fields.clone(),
            own_fields,
            parents,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn own_fields(&self) -> &FieldSet {
        &self.own_fields
    }

    pub fn parents(&self) -> &[ParentRef] {
        &self.parents
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    /// Nested subnodes carry the parent's path in their key.
    pub fn is_child_element(&self) -> bool {
        self.key.contains('.')
    }

    /// Fold `inherited` and own fields into the resolved field set.
    /// Own fields win over inherited copies of the same key.
    pub(crate) fn set_inherited(&mut self, inherited: FieldSet) {
        let mut fields = inherited;
        for field in self.own_fields.iter() {
            fields.insert(field.clone());
        }
        self.fields = fields;
    }
}

/// Junction entity hosting the foreign keys of a polymorphic reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedNode {
    pub key: String,
    pub derived_from: String,
}
