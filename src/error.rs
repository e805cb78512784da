//! Error kinds raised while compiling specification text into a schema.
//!
//! Every error is fatal to the build: there is no partial-success mode.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SchemaError>;

#[derive(Debug, Error)]
pub enum SchemaError {
    /// A row could not be turned into a field.
    #[error("parse error: {message} (row: {line:?})")]
    Parse { line: String, message: String },

    /// The entity set itself is inconsistent (duplicate keys, bad parents).
    #[error("model error in {entity}: {message}")]
    Model { entity: String, message: String },

    /// A relationship points somewhere the graph cannot follow.
    #[error("resolution error in {entity}.{field}: {message}")]
    Resolution {
        entity: String,
        field: String,
        message: String,
    },

    /// A requested filter key is not an entity in the graph.
    #[error("selection error: resource {key} is not in the graph")]
    Selection { key: String },

    #[error(transparent)]
    Pattern(#[from] regex::Error),
}

impl SchemaError {
    pub fn parse(line: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            line: line.into(),
            message: message.into(),
        }
    }

    pub fn model(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Model {
            entity: entity.into(),
            message: message.into(),
        }
    }

    pub fn resolution(
        entity: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Resolution {
            entity: entity.into(),
            field: field.into(),
            message: message.into(),
        }
    }
}
