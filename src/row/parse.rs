use crate::field::Ordinality;
use crate::row::{ParentAnnotation, Row};
use regex::Regex;
use std::collections::BTreeSet;

/// Type names the specification text uses as synonyms for `Quantity`.
const TYPE_OVERRIDES: &[(&str, &str)] = &[
    ("Duration", "Quantity"),
    ("Distance", "Quantity"),
    ("Age", "Quantity"),
    ("Count", "Quantity"),
    ("Quantity(SimpleQuantity)", "Quantity"),
];

/// Fields never inherited from a parent, even when the annotation lists them.
const NEVER_INHERITED: &[&str] = &["contained"];

/// Compiled row patterns. Build once per run and reuse for every line.
///
/// The patterns match the specification's turtle-like notation directly;
/// this is not a general grammar. Example row:
///
/// fhir:Patient.gender [ code ]; # 0..1 male | female | other | unknown
#[derive(Debug, Clone)]
pub struct RowParser {
    key: Regex,
    field_key: Regex,
    type_token: Regex,
    ordinality: Regex,
    options: Regex,
    parent: Regex,
    parent_fields: Regex,
}

impl RowParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            // Greedy: the key runs up to the last dot before the field segment.
            key: Regex::new(r"fhir:([A-Z][A-Za-z.]+)\.")?,
            field_key: Regex::new(r"\.([a-z][a-zA-Z0-9]+)(?:\[x\])?\s")?,
            type_token: Regex::new(r"\[\s(.+?)\s\]")?,
            ordinality: Regex::new(r"#\s([0-9]\.\.[0-9*])")?,
            options: Regex::new(r"((?:\s\S+\s\|)+\s\S+)")?,
            parent: Regex::new(r"#\sfrom\s([A-Z][a-zA-Z0-9]+):")?,
            parent_fields: Regex::new(r"\.([a-zA-Z0-9]+)(?:,\s(?:and\s)?)*")?,
        })
    }

    pub fn parse(&self, line: &str) -> Row {
        let key = capture(&self.key, line);

        let field_key = capture(&self.field_key, line).map(|field_key| {
            // The turtle text and the element definitions disagree on these names.
            if key.as_deref() == Some("Dosage.doseAndRate") && field_key.contains("Simple") {
                field_key.replace("Simple", "")
            } else {
                field_key
            }
        });

        let type_token = capture(&self.type_token, line).map(|token| {
            TYPE_OVERRIDES
                .iter()
                .find(|(synonym, _)| *synonym == token)
                .map(|(_, canonical)| canonical.to_string())
                .unwrap_or(token)
        });

        let ordinality = capture(&self.ordinality, line)
            .and_then(|text| Ordinality::parse(&text))
            .unwrap_or_default();

        let options: BTreeSet<String> = capture(&self.options, line)
            .map(|text| text.trim().split(" | ").map(str::to_string).collect())
            .unwrap_or_default();

        let parent = capture(&self.parent, line).map(|parent| ParentAnnotation {
            parent,
            fields: self
                .parent_fields
                .captures_iter(line)
                .filter_map(|caps| caps.get(1))
                .map(|m| m.as_str())
                .filter(|name| !NEVER_INHERITED.contains(name))
                .map(str::to_string)
                .collect(),
        });

        let row = Row {
            line: line.to_string(),
            key,
            field_key,
            type_token,
            ordinality,
            options,
            parent,
            opens_subnode: opens_subnode(line),
            closes_subnode: line.trim().starts_with(']'),
        };
        tracing::trace!(?row, "parsed row");
        row
    }
}

fn capture(re: &Regex, line: &str) -> Option<String> {
    re.captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// A line opens a subnode when it has more `[` than `]`.
fn opens_subnode(line: &str) -> bool {
    let opening = line.matches('[').count();
    let closing = line.matches(']').count();
    opening > 0 && opening > closing
}

/// `Reference(Patient|Group)` => `["Patient", "Group"]`.
pub(crate) fn reference_targets(token: &str) -> Option<Vec<String>> {
    let start = token.find("Reference(")? + "Reference(".len();
    let len = token[start..].find(')')?;
    let inner = &token[start..start + len];
    if inner.is_empty() || !inner.chars().all(|c| c.is_ascii_alphabetic() || c == '|') {
        return None;
    }
    Some(inner.split('|').map(str::to_string).collect())
}
