use std::collections::BTreeMap;

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

/// Reserved key carrying the validation verdict for a record.
pub const ERRORS_KEY: &str = "_errors";

/// Reserved prefix for pre-normalization shadow values (`_original_<field>`).
pub const ORIGINAL_PREFIX: &str = "_original_";

// ---------------------------------------------------------------------------
// ErrorEntry
// ---------------------------------------------------------------------------

/// One validation failure reported by the backend for one field.
///
/// Ordering within a record is significant for display only; the same field
/// may appear more than once.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ErrorEntry {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub rule: String,
    #[serde(default)]
    pub message: String,
}

impl ErrorEntry {
    pub fn new(field: &str, rule: &str, message: &str) -> Self {
        ErrorEntry {
            field: field.into(),
            rule: rule.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// A single business record: an ordered field map plus the reserved state
/// the backend attaches to it.
///
/// Reserved keys never appear in the visible field set. `originals` holds the
/// pre-normalization shadow value per field that a transform step altered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, Value>,
    originals: BTreeMap<String, Value>,
    errors: Vec<ErrorEntry>,
}

impl Record {
    pub fn new() -> Self {
        Record::default()
    }

    /// Build a record from plain (field, value) pairs. Reserved keys are
    /// routed to their typed slots, same as wire deserialization.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut map = serde_json::Map::new();
        for (k, v) in pairs {
            map.insert(k.into(), v);
        }
        Record::from_wire(map)
    }

    /// Split a flat wire object into fields / shadows / errors.
    pub fn from_wire(map: serde_json::Map<String, Value>) -> Self {
        let mut record = Record::new();
        for (key, value) in map {
            if key == ERRORS_KEY {
                record.errors = parse_errors(value);
            } else if let Some(field) = key.strip_prefix(ORIGINAL_PREFIX) {
                record.originals.insert(field.to_string(), value);
            } else {
                record.fields.insert(key, value);
            }
        }
        record
    }

    /// Merge back into the flat wire object.
    pub fn to_wire(&self) -> serde_json::Map<String, Value> {
        let mut map = serde_json::Map::new();
        for (k, v) in &self.fields {
            map.insert(k.clone(), v.clone());
        }
        for (k, v) in &self.originals {
            map.insert(format!("{ORIGINAL_PREFIX}{k}"), v.clone());
        }
        if !self.errors.is_empty() {
            map.insert(
                ERRORS_KEY.to_string(),
                serde_json::to_value(&self.errors).unwrap_or(Value::Null),
            );
        }
        map
    }

    // ── Fields ──────────────────────────────────────────────────────

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Stringified field value; `None` only when the field is absent.
    pub fn field_str(&self, name: &str) -> Option<String> {
        self.fields.get(name).map(scalar_to_string)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// All visible fields stringified (null becomes empty), the shape an
    /// edit snapshot wants.
    pub fn string_fields(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .map(|(k, v)| (k.clone(), scalar_to_string(v)))
            .collect()
    }

    /// Set a visible field. Shadow values of *other* fields are untouched;
    /// this field's shadow is dropped once the two values agree again, so
    /// the comparison display collapses back to a single value.
    pub fn set_field(&mut self, name: &str, value: Value) {
        if self.originals.get(name) == Some(&value) {
            self.originals.remove(name);
        }
        self.fields.insert(name.to_string(), value);
    }

    // ── Shadows ─────────────────────────────────────────────────────

    pub fn original(&self, name: &str) -> Option<&Value> {
        self.originals.get(name)
    }

    pub fn originals(&self) -> &BTreeMap<String, Value> {
        &self.originals
    }

    pub fn set_original(&mut self, name: &str, value: Value) {
        self.originals.insert(name.to_string(), value);
    }

    // ── Errors ──────────────────────────────────────────────────────

    pub fn errors(&self) -> &[ErrorEntry] {
        &self.errors
    }

    pub fn set_errors(&mut self, errors: Vec<ErrorEntry>) {
        self.errors = errors;
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let map = self.to_wire();
        let mut ser = serializer.serialize_map(Some(map.len()))?;
        for (k, v) in &map {
            ser.serialize_entry(k, v)?;
        }
        ser.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = serde_json::Map::deserialize(deserializer)?;
        Ok(Record::from_wire(map))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Stringify a scalar the way the table renders it: null is empty, strings
/// are unquoted, everything else via its JSON form.
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The backend sometimes sends `_errors` as a JSON-encoded string, or as a
/// bare object instead of an array. Normalize all three shapes.
fn parse_errors(value: Value) -> Vec<ErrorEntry> {
    let value = match value {
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(parsed) => parsed,
            Err(_) => {
                return vec![ErrorEntry {
                    field: String::new(),
                    rule: String::new(),
                    message: s,
                }]
            }
        },
        other => other,
    };

    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        Value::Object(_) => serde_json::from_value::<ErrorEntry>(value)
            .map(|e| vec![e])
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
