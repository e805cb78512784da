//! Identifier helpers: snake-casing, storage-engine length limits, plurals.
//!
//! PostgreSQL silently cuts identifiers at 63 bytes, which turns distinct
//! long names into collisions. We abbreviate instead, deterministically.

/// Maximum identifier length accepted by the storage engine, in bytes.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// `CarePlan.basedOn` => `care_plan_based_on`.
///
/// An underscore goes before every upper-case letter except a leading one,
/// then the result is lower-cased and path separators become underscores.
pub fn to_snake_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for (i, ch) in text.chars().enumerate() {
        if i > 0 && ch.is_ascii_uppercase() {
            out.push('_');
        }
        out.push(ch.to_ascii_lowercase());
    }
    out.replace('.', "_")
}

pub fn capitalize_first_letter(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Shorten a snake-case identifier until it fits [`MAX_IDENTIFIER_LEN`].
///
/// Segments are collapsed to their first character starting with the
/// fourth-to-last one and moving towards the front, so the last three
/// segments always survive; after each step the
/// segments are re-joined and re-cased. If every candidate segment is spent
/// and the name is still too long, it is cut at the limit.
pub fn truncate_identifier(full_name: &str) -> String {
    let mut name = full_name.to_string();
    let mut parts: Vec<String> = full_name.split('_').map(str::to_string).collect();

    let mut offset_from_end = 4;
    while name.len() > MAX_IDENTIFIER_LEN {
        if offset_from_end > parts.len() {
            cut_at_limit(&mut name);
            break;
        }

        let idx = parts.len() - offset_from_end;
        if let Some(first) = parts[idx].chars().next() {
            parts[idx] = first.to_string();
        }
        offset_from_end += 1;

        let camel: String = parts.iter().map(|p| capitalize_first_letter(p)).collect();
        name = to_snake_case(&camel);
        tracing::debug!(from = full_name, to = %name, "abbreviated identifier");
    }
    name
}

fn cut_at_limit(name: &mut String) {
    let mut end = MAX_IDENTIFIER_LEN.min(name.len());
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name.truncate(end);
}

/// Entity or field key to a storage-safe identifier.
pub fn key_to_database_name(key: &str) -> String {
    truncate_identifier(&to_snake_case(key))
}

const IRREGULAR_PLURALS: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("criterion", "criteria"),
];

/// English plural of the trailing word of `word`, preserving the prefix.
///
/// Covers the regular suffix rules plus a handful of irregular nouns that
/// show up as entity names.
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }

    let lower = word.to_ascii_lowercase();
    for (singular, plural) in IRREGULAR_PLURALS {
        if lower.ends_with(singular) {
            let stem_len = word.len() - singular.len();
            let original = &word[stem_len..];
            let replaced = if original.starts_with(|c: char| c.is_ascii_uppercase()) {
                capitalize_first_letter(plural)
            } else {
                plural.to_string()
            };
            return format!("{}{}", &word[..stem_len], replaced);
        }
    }

    if lower.ends_with("sis") {
        return format!("{}es", &word[..word.len() - 2]);
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|s| lower.ends_with(s)) {
        return format!("{word}es");
    }
    if let Some(stem) = lower.strip_suffix('y') {
        let before = stem.chars().last();
        if before.is_some_and(|c| !"aeiou".contains(c)) {
            return format!("{}ies", &word[..word.len() - 1]);
        }
    }
    format!("{word}s")
}
