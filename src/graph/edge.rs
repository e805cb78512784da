//! Edges and the naming rules for the columns and relationships they produce.
//!
//! The "many" side of a relationship always holds the foreign key, so an
//! edge runs from the entity that owns the column to the entity it points at.

use crate::field::Field;
use crate::naming::{key_to_database_name, pluralize, to_snake_case};
use crate::node::NodeKind;
use serde::Serialize;

/// `(origin key, originating field key or "", destination key)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EdgeKey {
    pub origin: String,
    pub field: String,
    pub destination: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub origin: String,
    pub origin_kind: NodeKind,
    /// `None` for wildcard edges out of the `Any` node.
    pub field: Option<Field>,
    pub destination: String,
    pub self_referencing_back_reference: bool,
    pub shares_references: bool,
}

impl Edge {
    pub fn new(
        origin: impl Into<String>,
        origin_kind: NodeKind,
        field: Option<Field>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            origin: origin.into(),
            origin_kind,
            field,
            destination: destination.into(),
            self_referencing_back_reference: false,
            shares_references: false,
        }
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            origin: self.origin.clone(),
            field: self.field.as_ref().map(|f| f.key.clone()).unwrap_or_default(),
            destination: self.destination.clone(),
        }
    }

    /// The destination is one of the targets the originating field declares.
    pub fn is_back_reference(&self) -> bool {
        self.field
            .as_ref()
            .is_some_and(|field| field.declares_target(&self.destination))
    }

    /// Many-valued originating field; wildcard edges are never many-valued.
    pub fn is_many_valued(&self) -> bool {
        self.field.as_ref().is_some_and(|f| f.ordinality.is_many())
    }

    fn base_column_name(&self) -> String {
        let Some(field) = &self.field else {
            return self.destination.clone();
        };

        if self.shares_references {
            return format!("{}.{}", self.destination, field.key);
        }
        if self.self_referencing_back_reference {
            return format!("back{}", self.destination);
        }
        if field.ordinality.is_many() {
            return self.destination.clone();
        }
        if field.is_polymorphic() && self.origin_kind != NodeKind::Parsed {
            return self.destination.clone();
        }
        field.key.clone()
    }

    /// Foreign-key column on the origin's table.
    pub fn column_name(&self) -> String {
        key_to_database_name(&format!("{}_id", self.base_column_name()))
    }

    /// Singular relationship name on the origin's side.
    pub fn object_relationship_name(&self) -> String {
        let origin_table = key_to_database_name(&self.origin);
        let destination_table = key_to_database_name(&self.destination);
        let name = match &self.field {
            // [extension] extension <- [extension]
            Some(field)
                if field.database_name() == destination_table
                    && destination_table == origin_table =>
            {
                format!("back{}", self.destination)
            }
            _ => self.base_column_name(),
        };
        to_snake_case(&name)
    }

    /// Plural relationship name on the destination's side.
    pub fn array_relationship_name(&self) -> String {
        let Some(field) = &self.field else {
            return "anys".to_string();
        };

        let name = if field.ordinality.is_many() {
            if field.origin == self.destination {
                field.key.clone()
            } else {
                pluralize(&self.origin)
            }
        } else if field.is_polymorphic() {
            pluralize(&self.origin)
        } else {
            format!("{}.{}", self.origin, field.key)
        };
        to_snake_case(&name)
    }
}
