//! RowMend ETL Backend Protocol — v1 Frozen Record Format
//!
//! Wire types shared between the reconciliation engine and the HTTP client.
//! A record travels as one flat JSON object: visible fields plus two kinds of
//! reserved keys (`_errors`, `_original_<field>`). This crate owns the
//! split/merge between that duck-typed wire shape and the tagged in-memory
//! shape ([`Record`]).
//!
//! The wire format is frozen — the backend is an external collaborator and
//! changes here require coordination with it.

pub mod record;
pub mod verdict;

pub use record::{scalar_to_string, ErrorEntry, Record, ERRORS_KEY, ORIGINAL_PREFIX};
pub use verdict::{LoadReport, LoadResponse, ReprocessResponse, SaveRequest, Verdict};
