use std::fmt;

use crate::identity::RowId;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Local pre-check failed; the save never reached the network.
    Validation {
        field: String,
        rule: String,
        message: String,
    },
    /// Transport or timeout failure talking to the backend. Recovery is a
    /// user-initiated retry of the same request, never automatic.
    Network(String),
    /// Verdict contained neither a transformed nor an error record for the
    /// submitted row. No safe bucket placement can be inferred, so the
    /// session is abandoned without mutating any bucket.
    Anomaly { row: RowId },
    /// The submitted row is no longer present in its errors bucket.
    RowNotFound { row: RowId },
    /// A save is in flight; a second session cannot be opened.
    SaveInFlight { row: RowId },
    /// The operation needs an open session and there is none.
    NoSession,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation { field, rule, message } => {
                write!(f, "field '{field}' failed {rule}: {message}")
            }
            Self::Network(msg) => write!(f, "network error: {msg}"),
            Self::Anomaly { row } => {
                write!(f, "verdict for row {row} had no outcome (reconciliation anomaly)")
            }
            Self::RowNotFound { row } => write!(f, "row {row} not found in errors bucket"),
            Self::SaveInFlight { row } => {
                write!(f, "a correction for row {row} is still in flight")
            }
            Self::NoSession => write!(f, "no edit session is open"),
        }
    }
}

impl std::error::Error for EngineError {}
