//! Rows: one line of specification text plus the facts derived from it.

pub mod parse;

pub use parse::RowParser;

use crate::error::{Result, SchemaError};
use crate::field::{Field, FieldKind, Ordinality, PrimitiveType};
use std::collections::BTreeSet;

/// `# from Parent: .a, .b, and .c`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentAnnotation {
    pub parent: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub line: String,
    /// `Resource.path` preceding the declared field.
    pub key: Option<String>,
    pub field_key: Option<String>,
    /// Bracketed type annotation after synonym overrides.
    pub type_token: Option<String>,
    pub ordinality: Ordinality,
    pub options: BTreeSet<String>,
    pub parent: Option<ParentAnnotation>,
    pub opens_subnode: bool,
    pub closes_subnode: bool,
}

impl Row {
    /// A row with neither a declaration nor a parent annotation carries nothing.
    pub fn is_informative(&self) -> bool {
        self.key.is_some() || self.parent.is_some()
    }

    fn require_field_key(&self) -> Result<&str> {
        self.field_key
            .as_deref()
            .ok_or_else(|| SchemaError::parse(&self.line, "row declares no field key"))
    }

    /// Map this row's declared type onto a field variant owned by `owner`.
    ///
    /// Subnode detection comes first: a nested block's own type token says
    /// nothing about the relationship it declares.
    pub fn as_field(&self, owner: &str) -> Result<Field> {
        let field_key = self.require_field_key()?;
        let field = |kind| Field::new(field_key, owner, self.ordinality, kind);

        if self.opens_subnode {
            let key = self
                .key
                .as_deref()
                .ok_or_else(|| SchemaError::parse(&self.line, "subnode row has no key"))?;
            return Ok(field(FieldKind::Exclusive {
                target: format!("{}.{}", key, field_key),
            }));
        }

        let token = self
            .type_token
            .as_deref()
            .ok_or_else(|| SchemaError::parse(&self.line, "row has no type annotation"))?;

        if let Some(ty) = PrimitiveType::from_token(token) {
            let identity = field_key == "id";
            return Ok(field(FieldKind::Primitive {
                ty,
                unique: identity,
                indexed: identity,
            }));
        }

        if token == "code" {
            return Ok(field(FieldKind::Code {
                options: self.options.clone(),
            }));
        }

        if token.starts_with("canonical") {
            return Ok(field(FieldKind::Primitive {
                ty: PrimitiveType::String,
                unique: false,
                indexed: false,
            }));
        }

        if token.contains("Reference(") {
            let targets = parse::reference_targets(token).ok_or_else(|| {
                SchemaError::parse(&self.line, format!("malformed reference type {token:?}"))
            })?;
            return Ok(field(FieldKind::Reference { targets }));
        }

        if let Some(rest) = token.strip_prefix("See") {
            let target = rest.trim();
            if rest.starts_with(char::is_whitespace) && !target.is_empty() {
                return Ok(field(FieldKind::Exclusive {
                    target: target.to_string(),
                }));
            }
            return Err(SchemaError::parse(
                &self.line,
                format!("malformed cross-reference {token:?}"),
            ));
        }

        if token.starts_with(|c: char| c.is_ascii_uppercase()) {
            return Ok(field(FieldKind::Exclusive {
                target: token.to_string(),
            }));
        }

        if token.contains("xhtml") {
            return Ok(field(FieldKind::Markup));
        }

        Err(SchemaError::parse(
            &self.line,
            format!("unrecognized type {token:?}"),
        ))
    }
}
