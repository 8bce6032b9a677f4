//! Display-only value normalization.
//!
//! These never touch stored records; they shape what the table renders,
//! including the original-vs-transformed comparison for fields a transform
//! step altered.

use rowmend_protocol::{scalar_to_string, Record};

use crate::validate::capitalize_words;

/// Fields whose pre-normalization shadow value is worth showing next to the
/// transformed one.
const SHOW_ORIGINAL: [&str; 8] = [
    "full_name",
    "fullName",
    "status",
    "email",
    "phone",
    "title",
    "customer_name",
    "customer_email",
];

/// Known name abbreviations the upstream data carries, expanded on display.
const NAME_ABBREVS: [(&str, &str, &str); 2] =
    [("ng", "t", "Nguyễn Thị"), ("le", "m", "Lê Minh")];

/// What one table cell shows: the normalized current value, plus the shadow
/// value when it still differs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayCell {
    pub value: String,
    pub original: Option<String>,
}

/// Render one field of a record.
pub fn display_cell(record: &Record, field: &str) -> DisplayCell {
    let raw = record.field_str(field).unwrap_or_default();
    let value = match field {
        "full_name" | "fullName" | "title" | "customer_name" => normalize_name(&raw),
        "status" => normalize_status(&raw),
        "email" | "customer_email" => raw.to_lowercase(),
        _ => raw,
    };

    let original = if SHOW_ORIGINAL.contains(&field) {
        record
            .original(field)
            .filter(|shadow| Some(*shadow) != record.field(field))
            .map(scalar_to_string)
    } else {
        None
    };

    DisplayCell { value, original }
}

/// Expand known abbreviations, then capitalize each token.
pub fn normalize_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    let mut out: Vec<String> = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let mut expanded = None;
        if i + 1 < tokens.len() {
            let first = tokens[i].to_lowercase();
            let second = tokens[i + 1].trim_end_matches('.').to_lowercase();
            expanded = NAME_ABBREVS
                .iter()
                .find(|(a, b, _)| *a == first && *b == second)
                .map(|(_, _, full)| full.to_string());
        }
        match expanded {
            Some(full) => {
                out.push(full);
                i += 2;
            }
            None => {
                out.push(tokens[i].to_string());
                i += 1;
            }
        }
    }
    capitalize_words(&out.join(" "))
}

/// Underscores to spaces, each token capitalized.
pub fn normalize_status(status: &str) -> String {
    capitalize_words(&status.trim().replace('_', " "))
}
