use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use rowmend_protocol::Record;

use crate::identity::{self, RowId};

// ---------------------------------------------------------------------------
// Entity types
// ---------------------------------------------------------------------------

/// Business record category. Partitions the result store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Books,
    Customers,
    Orders,
    Carts,
    Invoices,
}

impl EntityType {
    pub const ALL: [EntityType; 5] = [
        EntityType::Books,
        EntityType::Customers,
        EntityType::Orders,
        EntityType::Carts,
        EntityType::Invoices,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Books => "books",
            Self::Customers => "customers",
            Self::Orders => "orders",
            Self::Carts => "carts",
            Self::Invoices => "invoices",
        }
    }

    /// Accepts both the lowercase plural form and the backend's uppercase
    /// singular tags (`BOOK`, `CUSTOMER`, ...).
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "books" | "book" => Some(Self::Books),
            "customers" | "customer" => Some(Self::Customers),
            "orders" | "order" => Some(Self::Orders),
            "carts" | "cart" => Some(Self::Carts),
            "invoices" | "invoice" => Some(Self::Invoices),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Buckets
// ---------------------------------------------------------------------------

/// The two disjoint ordered sequences holding one entity's records. A record
/// lives in exactly one of them at any instant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityBuckets {
    #[serde(default)]
    pub transformed: Vec<Record>,
    #[serde(default)]
    pub errors: Vec<Record>,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Per-entity buckets of transformed and erroring records.
///
/// Mutated only by the reconciler (single-row moves, `pub(crate)`) and by the
/// full-reload operations here — the two paths cannot interleave in the
/// single-threaded model. Buckets are never reordered or filtered in place,
/// which keeps positional `RowId::Index` identities valid while a session is
/// open.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    buckets: BTreeMap<EntityType, EntityBuckets>,
    fixed: usize,
}

impl ResultStore {
    pub fn new() -> Self {
        ResultStore::default()
    }

    // ── Loading (full replacement only) ─────────────────────────────

    /// Replace the whole store from a pre-partitioned payload. Resets the
    /// `fixed` counter: this is a fresh dataset, not an edit.
    pub fn replace_all(&mut self, data: BTreeMap<EntityType, EntityBuckets>) {
        self.buckets = data;
        self.fixed = 0;
    }

    /// Replace the whole store from unpartitioned transformed/errors lists,
    /// sniffing each record's entity from its key fields. Records that carry
    /// no recognizable key land in `fallback`.
    pub fn load_flat(
        &mut self,
        transformed: Vec<Record>,
        errors: Vec<Record>,
        fallback: EntityType,
    ) {
        let mut buckets: BTreeMap<EntityType, EntityBuckets> = BTreeMap::new();
        for record in transformed {
            let entity = identity::detect_entity(&record).unwrap_or(fallback);
            buckets.entry(entity).or_default().transformed.push(record);
        }
        for record in errors {
            let entity = identity::detect_entity(&record).unwrap_or(fallback);
            buckets.entry(entity).or_default().errors.push(record);
        }
        self.replace_all(buckets);
    }

    // ── Read access ─────────────────────────────────────────────────

    pub fn transformed(&self, entity: EntityType) -> &[Record] {
        self.buckets.get(&entity).map(|b| b.transformed.as_slice()).unwrap_or(&[])
    }

    pub fn errors(&self, entity: EntityType) -> &[Record] {
        self.buckets.get(&entity).map(|b| b.errors.as_slice()).unwrap_or(&[])
    }

    pub fn entities(&self) -> impl Iterator<Item = EntityType> + '_ {
        self.buckets.keys().copied()
    }

    /// Index of the error row with this identity, if still present.
    pub fn find_error(&self, entity: EntityType, row: &RowId) -> Option<usize> {
        self.errors(entity)
            .iter()
            .enumerate()
            .find(|(i, record)| identity::resolve(record, *i) == *row)
            .map(|(i, _)| i)
    }

    pub fn total_errors(&self) -> usize {
        self.buckets.values().map(|b| b.errors.len()).sum()
    }

    /// Every record in store order: transformed then errors, per entity.
    /// The export payload shape.
    pub fn all_rows(&self) -> Vec<Record> {
        let mut rows = Vec::new();
        for bucket in self.buckets.values() {
            rows.extend(bucket.transformed.iter().cloned());
        }
        for bucket in self.buckets.values() {
            rows.extend(bucket.errors.iter().cloned());
        }
        rows
    }

    // ── Mutation (reconciler only) ──────────────────────────────────

    /// Move the error row at `idx` into the transformed bucket, replacing it
    /// with the backend's fixed version. One call, so a renderer can never
    /// observe the row missing from both buckets.
    pub(crate) fn promote(&mut self, entity: EntityType, idx: usize, fixed_row: Record) -> Record {
        let bucket = self.buckets.entry(entity).or_default();
        let removed = bucket.errors.remove(idx);
        bucket.transformed.push(fixed_row);
        self.fixed += 1;
        removed
    }

    /// Replace the error row at `idx` in place with the backend's fresh
    /// version (still invalid, updated error list).
    pub(crate) fn replace_error(&mut self, entity: EntityType, idx: usize, row: Record) {
        let bucket = self.buckets.entry(entity).or_default();
        bucket.errors[idx] = row;
    }

    // ── Summary ─────────────────────────────────────────────────────

    /// Derived counts, recomputed from bucket sizes on every call. Never
    /// cached: a cache can drift from bucket contents.
    pub fn summary(&self) -> Summary {
        let passed = self.buckets.values().map(|b| b.transformed.len()).sum();
        let failed = self.total_errors();
        let fixable = self
            .buckets
            .values()
            .flat_map(|b| b.errors.iter())
            .filter(|r| r.errors().iter().any(|e| e.rule == "NOT_BLANK"))
            .count();
        Summary {
            passed,
            failed,
            fixed: self.fixed,
            fixable,
            total: passed + failed,
        }
    }

    /// Corrections that landed in the transformed bucket since the last full
    /// reload.
    pub fn fixed(&self) -> usize {
        self.fixed
    }
}

/// Pass/fail/fixed classification over the current store contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub fixed: usize,
    pub fixable: usize,
    pub total: usize,
}
