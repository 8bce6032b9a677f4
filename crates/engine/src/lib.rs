//! `rowmend-engine` — Incremental record reconciliation engine.
//!
//! Pure engine crate: owns the result store, the single edit session, the
//! client-side validation gate, and the merge of revalidation verdicts back
//! into the correct bucket. No IO dependencies; the network seam is the
//! [`Revalidator`] trait.

pub mod display;
pub mod error;
pub mod identity;
pub mod reconcile;
pub mod session;
pub mod store;
pub mod validate;

pub use error::EngineError;
pub use identity::RowId;
pub use reconcile::{apply_verdict, save_row, Revalidator, SaveOutcome};
pub use session::{SessionController, SessionState};
pub use store::{EntityType, ResultStore, Summary};
