//! Field type system: the closed set of field variants an entity can carry.
//!
//! Base variants become columns; relationship variants become graph edges.

use crate::naming::key_to_database_name;
use serde::Serialize;
use std::collections::BTreeSet;

/// One end of an ordinality annotation such as `0..*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Cardinality {
    Zero,
    One,
    Many,
}

impl Cardinality {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "0" => Some(Self::Zero),
            "1" => Some(Self::One),
            "*" => Some(Self::Many),
            _ => None,
        }
    }
}

/// `(min, max)` cardinality pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Ordinality {
    pub min: Cardinality,
    pub max: Cardinality,
}

impl Default for Ordinality {
    fn default() -> Self {
        Self::new(Cardinality::Zero, Cardinality::One)
    }
}

impl Ordinality {
    pub const fn new(min: Cardinality, max: Cardinality) -> Self {
        Self { min, max }
    }

    /// Parse `0..1` / `1..*`. Anything else is `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let (min, max) = text.split_once("..")?;
        Some(Self::new(
            Cardinality::from_token(min)?,
            Cardinality::from_token(max)?,
        ))
    }

    pub fn is_many(&self) -> bool {
        self.max == Cardinality::Many
    }

    pub fn is_max_one(&self) -> bool {
        self.max == Cardinality::One
    }

    pub fn is_required(&self) -> bool {
        self.min == Cardinality::One
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PrimitiveType {
    Date,
    DateTime,
    Instant,
    Time,
    Boolean,
    Integer,
    PositiveInt,
    UnsignedInt,
    Integer64,
    Decimal,
    String,
    Uri,
    Base64Binary,
    Url,
    Markdown,
    Id,
    Oid,
    Uuid,
}

impl PrimitiveType {
    /// Exact match against the specification's primitive type names.
    pub fn from_token(token: &str) -> Option<Self> {
        let ty = match token {
            "date" => Self::Date,
            "dateTime" => Self::DateTime,
            "instant" => Self::Instant,
            "time" => Self::Time,
            "boolean" => Self::Boolean,
            "integer" => Self::Integer,
            "positiveInt" => Self::PositiveInt,
            "unsignedInt" => Self::UnsignedInt,
            "integer64" => Self::Integer64,
            "decimal" => Self::Decimal,
            "string" => Self::String,
            "uri" => Self::Uri,
            "base64Binary" => Self::Base64Binary,
            "url" => Self::Url,
            "markdown" => Self::Markdown,
            "id" => Self::Id,
            "oid" => Self::Oid,
            "uuid" => Self::Uuid,
            _ => return None,
        };
        Some(ty)
    }

    pub fn storage_type(&self) -> StorageType {
        match self {
            Self::Date => StorageType::Date,
            Self::DateTime | Self::Instant => StorageType::Timestamptz,
            Self::Time => StorageType::Time,
            Self::Boolean => StorageType::Boolean,
            Self::Integer | Self::PositiveInt | Self::UnsignedInt => StorageType::Integer,
            Self::Integer64 => StorageType::BigInt,
            Self::Decimal => StorageType::Numeric,
            Self::Uuid => StorageType::Uuid,
            Self::String
            | Self::Uri
            | Self::Base64Binary
            | Self::Url
            | Self::Markdown
            | Self::Id
            | Self::Oid => StorageType::Varchar,
        }
    }
}

/// Column storage type as handed to the schema sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StorageType {
    Integer,
    BigInt,
    Numeric,
    Boolean,
    Date,
    Timestamptz,
    Time,
    Varchar,
    Uuid,
    Jsonb,
    /// Named enumerated type scoped by table and column.
    Enum { name: String, options: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Primitive {
        ty: PrimitiveType,
        unique: bool,
        indexed: bool,
    },
    /// Coded value; an empty option set degrades to free text.
    Code { options: BTreeSet<String> },
    Markup,
    /// Points at exactly one destination entity.
    Exclusive { target: String },
    /// Points at one of several destination entities.
    Reference { targets: Vec<String> },
}

/// A field keyed by `(origin, key)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub key: String,
    /// Key of the entity that owns this field (rewritten on inheritance).
    pub origin: String,
    pub ordinality: Ordinality,
    pub kind: FieldKind,
}

impl Field {
    pub fn new(
        key: impl Into<String>,
        origin: impl Into<String>,
        ordinality: Ordinality,
        kind: FieldKind,
    ) -> Self {
        Self {
            key: key.into(),
            origin: origin.into(),
            ordinality,
            kind,
        }
    }

    pub fn database_name(&self) -> String {
        key_to_database_name(&self.key)
    }

    pub fn is_relationship(&self) -> bool {
        match self.kind {
            FieldKind::Exclusive { .. } | FieldKind::Reference { .. } => true,
            FieldKind::Primitive { .. } | FieldKind::Code { .. } | FieldKind::Markup => false,
        }
    }

    pub fn is_polymorphic(&self) -> bool {
        match &self.kind {
            FieldKind::Reference { targets } => targets.len() > 1,
            _ => false,
        }
    }

    pub fn is_unique(&self) -> bool {
        matches!(self.kind, FieldKind::Primitive { unique: true, .. })
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self.kind, FieldKind::Primitive { indexed: true, .. })
    }

    /// Whether `destination` is one of the entities this field declares as a target.
    pub fn declares_target(&self, destination: &str) -> bool {
        match &self.kind {
            FieldKind::Reference { targets } => targets.iter().any(|t| t == destination),
            FieldKind::Exclusive { target } => target == destination,
            FieldKind::Primitive { .. } | FieldKind::Code { .. } | FieldKind::Markup => false,
        }
    }

    /// Column storage type for base fields; `None` for relationships.
    ///
    /// `table` is the owning table's storage name, used to scope enum types.
    pub fn storage_type(&self, table: &str) -> Option<StorageType> {
        if self.is_relationship() {
            return None;
        }
        if self.ordinality.is_many() {
            return Some(StorageType::Jsonb);
        }
        let ty = match &self.kind {
            FieldKind::Primitive { ty, .. } => ty.storage_type(),
            FieldKind::Code { options } if options.is_empty() => StorageType::Varchar,
            FieldKind::Code { options } => StorageType::Enum {
                name: key_to_database_name(&format!("{}_{}_code", table, self.database_name())),
                options: options.iter().cloned().collect(),
            },
            FieldKind::Markup => StorageType::Varchar,
            FieldKind::Exclusive { .. } | FieldKind::Reference { .. } => return None,
        };
        Some(ty)
    }

    /// Copy of this field owned by `origin`.
    pub fn rehomed(&self, origin: &str) -> Self {
        Self {
            origin: origin.to_string(),
            ..self.clone()
        }
    }
}

/// Insertion-ordered field map. Re-inserting a key replaces the field in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet {
    fields: Vec<Field>,
}

impl FieldSet {
    pub fn insert(&mut self, field: Field) {
        match self.fields.iter_mut().find(|f| f.key == field.key) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Case-insensitive lookup, used when resolving parent annotations.
    pub fn get_ignore_case(&self, key: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.key.eq_ignore_ascii_case(key))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn base_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| !f.is_relationship())
    }

    pub fn relationship_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_relationship())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<Field> for FieldSet {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        let mut set = FieldSet::default();
        for field in iter {
            set.insert(field);
        }
        set
    }
}
