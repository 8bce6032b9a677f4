//! `rowmend-client` — ETL backend HTTP client.
//!
//! Blocking reqwest client (no Tokio runtime required). Covers the three
//! backend calls the correction workflow needs: revalidate one row, load the
//! cleaned set into the source database, export as CSV.

pub mod client;

pub use client::{ApiError, EtlClient};
