//! The single in-place-edit state machine.
//!
//! At most one edit session exists process-wide. All transitions run through
//! the controller; nothing else holds edit state.

use std::collections::BTreeMap;

use rowmend_protocol::{ErrorEntry, Record};

use crate::error::EngineError;
use crate::identity::{self, RowId};
use crate::store::EntityType;
use crate::validate;

/// One row currently open for correction.
#[derive(Debug, Clone)]
pub struct EditSession {
    pub entity: EntityType,
    pub row_id: RowId,
    /// Snapshot of the row's visible fields, stringified, taken when the
    /// session opened.
    pub original_fields: BTreeMap<String, String>,
    /// Field edits made during the session. A field absent here retains its
    /// original value on submit.
    pub pending_fields: BTreeMap<String, String>,
    /// The backend's error entries for the row, reseeded after each failed
    /// correction round.
    pub active_errors: Vec<ErrorEntry>,
    /// Results-table scroll offset captured on open, restored by the caller
    /// after the next re-render so corrections don't make the viewport jump.
    pub scroll_anchor: f64,
}

/// Observable controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Editing,
    Saving,
}

/// The merged record handed to the revalidation endpoint, tagged with the
/// session identity the verdict must be matched against.
#[derive(Debug, Clone)]
pub struct SubmitPayload {
    pub entity: EntityType,
    pub row_id: RowId,
    pub fields: BTreeMap<String, String>,
}

enum Inner {
    Idle,
    Editing(EditSession),
    Saving(EditSession),
}

/// Owns the single active edit session.
pub struct SessionController {
    inner: Inner,
}

impl Default for SessionController {
    fn default() -> Self {
        SessionController { inner: Inner::Idle }
    }
}

impl SessionController {
    pub fn new() -> Self {
        SessionController::default()
    }

    pub fn state(&self) -> SessionState {
        match self.inner {
            Inner::Idle => SessionState::Idle,
            Inner::Editing(_) => SessionState::Editing,
            Inner::Saving(_) => SessionState::Saving,
        }
    }

    pub fn session(&self) -> Option<&EditSession> {
        match &self.inner {
            Inner::Idle => None,
            Inner::Editing(s) | Inner::Saving(s) => Some(s),
        }
    }

    // ── Idle → Editing ──────────────────────────────────────────────

    /// Open a session on an erroring row. An already-open `Editing` session
    /// is closed first; a session with a save in flight blocks the open.
    pub fn begin_edit(
        &mut self,
        entity: EntityType,
        row: &Record,
        index: usize,
        scroll_anchor: f64,
    ) -> Result<&EditSession, EngineError> {
        if let Inner::Saving(s) = &self.inner {
            return Err(EngineError::SaveInFlight { row: s.row_id.clone() });
        }
        let session = EditSession {
            entity,
            row_id: identity::resolve(row, index),
            original_fields: row.string_fields(),
            pending_fields: BTreeMap::new(),
            active_errors: row.errors().to_vec(),
            scroll_anchor,
        };
        self.inner = Inner::Editing(session);
        match &self.inner {
            Inner::Editing(s) => Ok(s),
            _ => unreachable!(),
        }
    }

    // ── Editing → Editing ───────────────────────────────────────────

    /// Record a field edit. No network activity.
    pub fn edit_field(&mut self, field: &str, value: &str) -> Result<(), EngineError> {
        match &mut self.inner {
            Inner::Editing(s) => {
                s.pending_fields.insert(field.to_string(), value.to_string());
                Ok(())
            }
            Inner::Saving(s) => Err(EngineError::SaveInFlight { row: s.row_id.clone() }),
            Inner::Idle => Err(EngineError::NoSession),
        }
    }

    // ── Editing → Saving ────────────────────────────────────────────

    /// Run the validation gate and, if it passes, transition to `Saving`,
    /// returning the merged payload. On gate failure the session stays in
    /// `Editing` and no payload exists to send.
    pub fn begin_save(&mut self) -> Result<SubmitPayload, EngineError> {
        let session = match &mut self.inner {
            Inner::Editing(s) => s,
            Inner::Saving(s) => return Err(EngineError::SaveInFlight { row: s.row_id.clone() }),
            Inner::Idle => return Err(EngineError::NoSession),
        };

        // Pending values override the snapshot; untouched fields ride along.
        let mut merged = session.original_fields.clone();
        for (k, v) in &session.pending_fields {
            merged.insert(k.clone(), v.clone());
        }

        validate::run_gate(&session.active_errors, &mut merged).map_err(|e| {
            EngineError::Validation {
                field: e.field,
                rule: e.rule,
                message: e.message,
            }
        })?;

        sync_email_alias(&mut merged);

        let payload = SubmitPayload {
            entity: session.entity,
            row_id: session.row_id.clone(),
            fields: merged,
        };
        let session = match std::mem::replace(&mut self.inner, Inner::Idle) {
            Inner::Editing(s) => s,
            _ => unreachable!(),
        };
        self.inner = Inner::Saving(session);
        Ok(payload)
    }

    // ── → Idle ──────────────────────────────────────────────────────

    /// Explicit cancel. Discards pending edits; a response to an earlier
    /// save that arrives later is matched against the (now absent) current
    /// session and dropped. Idempotent.
    pub fn cancel(&mut self) {
        self.inner = Inner::Idle;
    }

    // ── Verdict-side transitions (reconciler only) ──────────────────

    /// True when a save for exactly this row is in flight. Verdicts that
    /// fail this check are stale and must be dropped.
    pub(crate) fn awaiting(&self, row: &RowId) -> bool {
        matches!(&self.inner, Inner::Saving(s) if s.row_id == *row)
    }

    /// Saving → Idle: the correction landed.
    pub(crate) fn complete_fixed(&mut self) {
        self.inner = Inner::Idle;
    }

    /// Saving → Editing: still invalid, reseed the error list and keep the
    /// operator's pending values for another round.
    pub(crate) fn complete_still_invalid(&mut self, errors: Vec<ErrorEntry>) {
        if let Inner::Saving(s) = std::mem::replace(&mut self.inner, Inner::Idle) {
            let mut session = s;
            session.active_errors = errors;
            self.inner = Inner::Editing(session);
        }
    }

    /// Saving → Editing: transport failure, nothing changed server-side as
    /// far as we know. Keep everything for a manual retry.
    pub(crate) fn fail_save(&mut self) {
        if let Inner::Saving(s) = std::mem::replace(&mut self.inner, Inner::Idle) {
            self.inner = Inner::Editing(s);
        }
    }

    /// Saving → Idle without touching buckets (reconciliation anomaly).
    pub(crate) fn abort(&mut self) {
        self.inner = Inner::Idle;
    }
}

/// The backend looks the email field up under either its canonical or its
/// legacy key; keep both populated so either lookup succeeds.
fn sync_email_alias(fields: &mut BTreeMap<String, String>) {
    let customer_email = fields.get("customer_email").filter(|v| !v.is_empty()).cloned();
    let email = fields.get("email").filter(|v| !v.is_empty()).cloned();
    if let Some(v) = customer_email {
        fields.insert("email".into(), v);
    } else if let Some(v) = email {
        fields.insert("customer_email".into(), v);
    }
}
