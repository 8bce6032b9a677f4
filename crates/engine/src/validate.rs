//! Client-side validation gate.
//!
//! Mirrors a small subset of the backend's rule set so an obviously bad
//! correction never costs a network round-trip. Runs once per save attempt,
//! over the fields the backend previously flagged — only those are required
//! to change — and short-circuits on the first failure.

use std::collections::BTreeMap;

use rowmend_protocol::ErrorEntry;

/// A gate failure. Always recoverable locally; the session stays open and no
/// request is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateError {
    pub field: String,
    pub rule: String,
    pub message: String,
}

/// Check the merged field values against the flagged fields. `authors` is
/// normalized in place (never fails); everything else either passes or
/// aborts the save.
pub fn run_gate(
    active_errors: &[ErrorEntry],
    merged: &mut BTreeMap<String, String>,
) -> Result<(), GateError> {
    for entry in active_errors {
        let field = entry.field.as_str();
        let value = merged.get(field).cloned().unwrap_or_default();

        match field {
            "full_name" | "fullName" => {
                if value.trim().is_empty() {
                    return Err(GateError {
                        field: field.into(),
                        rule: "NOT_BLANK".into(),
                        message: format!("field '{field}' must not be blank"),
                    });
                }
            }
            "email" => {
                if !is_valid_email(&value) {
                    return Err(GateError {
                        field: field.into(),
                        rule: "EMAIL_FORMAT".into(),
                        message: format!(
                            "email '{value}' is not valid, expected user@example.com"
                        ),
                    });
                }
            }
            "price" => {
                if !is_valid_price(&value) {
                    return Err(GateError {
                        field: field.into(),
                        rule: "PRICE_FORMAT".into(),
                        message: format!("price '{value}' is not valid, expected 45000 or 45000.50"),
                    });
                }
            }
            "title" | "description" => {
                if value.chars().count() > 300 {
                    return Err(GateError {
                        field: field.into(),
                        rule: "MAX_LENGTH".into(),
                        message: format!("field '{field}' exceeds 300 characters"),
                    });
                }
            }
            "authors" => {
                merged.insert(field.into(), capitalize_words(&value));
            }
            _ => {}
        }
    }
    Ok(())
}

/// `local@domain.tld`: local part from letters/digits/`._%+-`, domain from
/// letters/digits/`.-`, TLD at least two letters.
pub fn is_valid_email(value: &str) -> bool {
    if value.trim().is_empty() {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if domain.contains('@') || local.is_empty() {
        return false;
    }
    if !local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c))
    {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    if host.is_empty() || !host.chars().all(|c| c.is_ascii_alphanumeric() || ".-".contains(c)) {
        return false;
    }
    tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
}

/// Digits, optionally a decimal point and one or two digits. Empty passes
/// through — the backend decides whether a blank price is acceptable.
pub fn is_valid_price(value: &str) -> bool {
    if value.trim().is_empty() {
        return true;
    }
    let (int_part, frac_part) = match value.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (value, None),
    };
    if int_part.is_empty() || !int_part.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    match frac_part {
        None => true,
        Some(f) => (1..=2).contains(&f.len()) && f.chars().all(|c| c.is_ascii_digit()),
    }
}

/// Uppercase the first letter of each whitespace-delimited token.
pub fn capitalize_words(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut at_word_start = true;
    for c in value.chars() {
        if c.is_whitespace() {
            at_word_start = true;
            out.push(c);
        } else if at_word_start {
            out.extend(c.to_uppercase());
            at_word_start = false;
        } else {
            out.push(c);
        }
    }
    out
}
