use std::fmt;

use rowmend_protocol::{scalar_to_string, Record};

use crate::store::EntityType;

/// Candidate key fields, highest priority first.
const KEY_FIELDS: [&str; 4] = ["id", "book_id", "customer_id", "customerId"];

/// Stable identifier for a record within its bucket.
///
/// `Index` is the compatibility fallback for rows that carry none of the key
/// fields. It is only stable as long as the bucket is neither reordered nor
/// filtered; the store exposes no such operation while a session referencing
/// an `Index` id is open.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RowId {
    Key(String),
    Index(usize),
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(k) => write!(f, "{k}"),
            Self::Index(i) => write!(f, "#{i}"),
        }
    }
}

/// Resolve a record's identity, falling back to its current positional index.
pub fn resolve(record: &Record, index: usize) -> RowId {
    match key_of(record) {
        Some(key) => RowId::Key(key),
        None => RowId::Index(index),
    }
}

/// Key-field identity only; `None` when the record would need the positional
/// fallback.
pub fn key_of(record: &Record) -> Option<String> {
    KEY_FIELDS
        .iter()
        .filter_map(|name| record.field(name))
        .find(|v| !v.is_null())
        .map(scalar_to_string)
}

/// Sniff the entity type from the key fields a record carries. The upstream
/// feeds mix entities into one list; this mirrors the backend's own key
/// naming (including the legacy Vietnamese aliases).
pub fn detect_entity(record: &Record) -> Option<EntityType> {
    let has = |name: &str| record.field(name).is_some();

    if has("book_key") || has("ma_sach") {
        Some(EntityType::Books)
    } else if has("customer_key") || has("ma_nguoi_dung") {
        Some(EntityType::Customers)
    } else if has("order_key") || has("ma_don_hang") {
        Some(EntityType::Orders)
    } else if has("cart_key") || has("ma_gio_hang") {
        Some(EntityType::Carts)
    } else if has("invoice_key") || has("ma_hoa_don") {
        Some(EntityType::Invoices)
    } else if let Some(explicit) = record.field_str("entity_type") {
        EntityType::parse(&explicit)
    } else {
        None
    }
}
