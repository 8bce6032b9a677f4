//! Verdict submission and merge — the single writer of bucket membership.
//!
//! A correction is submitted as one merged record; the backend's verdict
//! decides whether the row moves to `transformed`, stays in `errors` with a
//! fresh error list, or (contract violation) has no outcome at all.

use std::collections::BTreeMap;

use rowmend_protocol::{ReprocessResponse, Verdict};

use crate::error::EngineError;
use crate::identity::RowId;
use crate::session::SessionController;
use crate::store::{EntityType, ResultStore};

/// The revalidation endpoint seam. The HTTP client implements this; tests
/// use scripted stubs.
pub trait Revalidator {
    fn reprocess(
        &self,
        fields: &BTreeMap<String, String>,
    ) -> Result<ReprocessResponse, EngineError>;
}

/// What a verdict did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Row moved to the transformed bucket; session closed.
    Fixed,
    /// Row replaced in place in the errors bucket; session stays open with
    /// the fresh error list.
    StillInvalid { remaining: usize },
    /// The verdict did not match the current session (cancelled or replaced
    /// while the request was in flight). Nothing was mutated.
    Stale,
}

/// Full save path: gate, submit, merge. Local gate failures and transport
/// failures leave the session in `Editing` with pending edits intact.
pub fn save_row(
    store: &mut ResultStore,
    controller: &mut SessionController,
    revalidator: &dyn Revalidator,
) -> Result<SaveOutcome, EngineError> {
    let payload = controller.begin_save()?;

    let response = match revalidator.reprocess(&payload.fields) {
        Ok(resp) => resp,
        Err(e) => {
            controller.fail_save();
            return Err(e);
        }
    };

    apply_verdict(
        store,
        controller,
        payload.entity,
        &payload.row_id,
        response.results,
    )
}

/// Merge a verdict for `row` into the store. Separated from [`save_row`] so
/// a response that arrives after its session was abandoned goes through the
/// same matching logic: it is compared against the *current* session and
/// dropped when it no longer matches.
pub fn apply_verdict(
    store: &mut ResultStore,
    controller: &mut SessionController,
    entity: EntityType,
    row: &RowId,
    verdict: Verdict,
) -> Result<SaveOutcome, EngineError> {
    if !controller.awaiting(row) {
        return Ok(SaveOutcome::Stale);
    }

    // Contracted: at most one outcome per single-row submission.
    if verdict.transformed.len() + verdict.errors.len() > 1 {
        log::warn!(
            "verdict for row {row} carries {} transformed / {} error entries, using first",
            verdict.transformed.len(),
            verdict.errors.len()
        );
    }

    if let Some(fixed_row) = verdict.transformed.first() {
        let Some(idx) = store.find_error(entity, row) else {
            controller.abort();
            return Err(EngineError::RowNotFound { row: row.clone() });
        };
        store.promote(entity, idx, fixed_row.clone());
        controller.complete_fixed();
        Ok(SaveOutcome::Fixed)
    } else if let Some(fresh_row) = verdict.errors.first() {
        let Some(idx) = store.find_error(entity, row) else {
            controller.abort();
            return Err(EngineError::RowNotFound { row: row.clone() });
        };
        let remaining = fresh_row.errors().len();
        controller.complete_still_invalid(fresh_row.errors().to_vec());
        store.replace_error(entity, idx, fresh_row.clone());
        Ok(SaveOutcome::StillInvalid { remaining })
    } else {
        // Neither bucket claims the row: no safe placement can be inferred.
        controller.abort();
        log::error!("reconciliation anomaly: empty verdict for row {row}");
        Err(EngineError::Anomaly { row: row.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionController;
    use crate::store::EntityBuckets;
    use rowmend_protocol::{ErrorEntry, Record};
    use serde_json::json;
    use std::cell::Cell;

    // Scripted endpoint: returns a fixed response, counts calls.
    struct Script {
        response: Verdict,
        calls: Cell<usize>,
        fail: bool,
    }

    impl Script {
        fn returning(response: Verdict) -> Self {
            Script { response, calls: Cell::new(0), fail: false }
        }

        fn failing() -> Self {
            Script { response: Verdict::default(), calls: Cell::new(0), fail: true }
        }
    }

    impl Revalidator for Script {
        fn reprocess(
            &self,
            _fields: &BTreeMap<String, String>,
        ) -> Result<ReprocessResponse, EngineError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(EngineError::Network("connection refused".into()));
            }
            Ok(ReprocessResponse {
                results: self.response.clone(),
                tracing_id: Some("t-1".into()),
            })
        }
    }

    fn bad_row(id: i64) -> Record {
        let mut r = Record::from_pairs([("id", json!(id)), ("email", json!("BAD"))]);
        r.set_errors(vec![ErrorEntry::new("email", "EMAIL_FORMAT", "invalid")]);
        r
    }

    fn store_with_errors(rows: Vec<Record>) -> ResultStore {
        let mut store = ResultStore::new();
        let mut buckets = std::collections::BTreeMap::new();
        buckets.insert(
            EntityType::Books,
            EntityBuckets { transformed: vec![], errors: rows },
        );
        store.replace_all(buckets);
        store
    }

    fn open_session(store: &ResultStore, ctl: &mut SessionController, idx: usize) {
        let row = store.errors(EntityType::Books)[idx].clone();
        ctl.begin_edit(EntityType::Books, &row, idx, 0.0).unwrap();
    }

    #[test]
    fn full_correction_moves_row() {
        let mut store = store_with_errors(vec![bad_row(7)]);
        let mut ctl = SessionController::new();
        open_session(&store, &mut ctl, 0);
        ctl.edit_field("email", "a@b.com").unwrap();

        let script = Script::returning(Verdict {
            transformed: vec![Record::from_pairs([("id", json!(7)), ("email", json!("a@b.com"))])],
            errors: vec![],
        });

        let outcome = save_row(&mut store, &mut ctl, &script).unwrap();
        assert_eq!(outcome, SaveOutcome::Fixed);
        assert!(store.errors(EntityType::Books).is_empty());
        assert_eq!(store.transformed(EntityType::Books).len(), 1);
        assert_eq!(
            store.transformed(EntityType::Books)[0].field_str("id").as_deref(),
            Some("7")
        );
        assert_eq!(ctl.state(), crate::SessionState::Idle);
        assert_eq!(store.fixed(), 1);
    }

    #[test]
    fn still_invalid_replaces_in_place() {
        let mut store = store_with_errors(vec![bad_row(7), bad_row(8)]);
        let mut ctl = SessionController::new();
        open_session(&store, &mut ctl, 0);
        ctl.edit_field("email", "a@b.co").unwrap();

        let mut fresh = Record::from_pairs([("id", json!(7)), ("email", json!("a@b.co"))]);
        fresh.set_errors(vec![ErrorEntry::new("email", "EMAIL_DOMAIN", "unknown domain")]);
        let script = Script::returning(Verdict { transformed: vec![], errors: vec![fresh] });

        let outcome = save_row(&mut store, &mut ctl, &script).unwrap();
        assert_eq!(outcome, SaveOutcome::StillInvalid { remaining: 1 });

        // Replaced at its original index, bucket order untouched.
        let errors = store.errors(EntityType::Books);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].errors()[0].rule, "EMAIL_DOMAIN");
        assert_eq!(errors[1].field_str("id").as_deref(), Some("8"));

        // Session stays open with the fresh list.
        assert_eq!(ctl.state(), crate::SessionState::Editing);
        assert_eq!(ctl.session().unwrap().active_errors[0].rule, "EMAIL_DOMAIN");
    }

    #[test]
    fn gate_failure_never_reaches_network() {
        let mut store = store_with_errors(vec![bad_row(7)]);
        let mut ctl = SessionController::new();
        open_session(&store, &mut ctl, 0);
        ctl.edit_field("email", "not-an-email").unwrap();

        let script = Script::returning(Verdict::default());
        let err = save_row(&mut store, &mut ctl, &script).unwrap_err();

        assert!(matches!(err, EngineError::Validation { .. }));
        assert_eq!(script.calls.get(), 0);
        assert_eq!(ctl.state(), crate::SessionState::Editing);
        assert_eq!(store.errors(EntityType::Books).len(), 1);
    }

    #[test]
    fn network_failure_keeps_session_for_retry() {
        let mut store = store_with_errors(vec![bad_row(7)]);
        let mut ctl = SessionController::new();
        open_session(&store, &mut ctl, 0);
        ctl.edit_field("email", "a@b.com").unwrap();

        let script = Script::failing();
        let err = save_row(&mut store, &mut ctl, &script).unwrap_err();
        assert!(matches!(err, EngineError::Network(_)));
        assert_eq!(ctl.state(), crate::SessionState::Editing);
        assert_eq!(ctl.session().unwrap().pending_fields["email"], "a@b.com");

        // Manual retry goes through unchanged.
        let script = Script::returning(Verdict {
            transformed: vec![Record::from_pairs([("id", json!(7)), ("email", json!("a@b.com"))])],
            errors: vec![],
        });
        assert_eq!(save_row(&mut store, &mut ctl, &script).unwrap(), SaveOutcome::Fixed);
    }

    #[test]
    fn stale_verdict_is_dropped() {
        let mut store = store_with_errors(vec![bad_row(7)]);
        let mut ctl = SessionController::new();
        open_session(&store, &mut ctl, 0);
        ctl.edit_field("email", "a@b.com").unwrap();
        ctl.begin_save().unwrap();

        // Operator cancels while the request is in flight.
        ctl.cancel();

        let verdict = Verdict {
            transformed: vec![Record::from_pairs([("id", json!(7)), ("email", json!("a@b.com"))])],
            errors: vec![],
        };
        let outcome = apply_verdict(
            &mut store,
            &mut ctl,
            EntityType::Books,
            &RowId::Key("7".into()),
            verdict,
        )
        .unwrap();

        assert_eq!(outcome, SaveOutcome::Stale);
        assert_eq!(store.errors(EntityType::Books).len(), 1);
        assert!(store.transformed(EntityType::Books).is_empty());
    }

    #[test]
    fn verdict_for_different_row_is_stale() {
        let mut store = store_with_errors(vec![bad_row(7), bad_row(8)]);
        let mut ctl = SessionController::new();
        open_session(&store, &mut ctl, 1); // editing row 8
        ctl.edit_field("email", "a@b.com").unwrap();
        ctl.begin_save().unwrap();

        let verdict = Verdict {
            transformed: vec![Record::from_pairs([("id", json!(7))])],
            errors: vec![],
        };
        let outcome = apply_verdict(
            &mut store,
            &mut ctl,
            EntityType::Books,
            &RowId::Key("7".into()),
            verdict,
        )
        .unwrap();
        assert_eq!(outcome, SaveOutcome::Stale);
        assert_eq!(store.errors(EntityType::Books).len(), 2);
    }

    #[test]
    fn empty_verdict_aborts_without_mutation() {
        let mut store = store_with_errors(vec![bad_row(7)]);
        let mut ctl = SessionController::new();
        open_session(&store, &mut ctl, 0);
        ctl.edit_field("email", "a@b.com").unwrap();

        let script = Script::returning(Verdict::default());
        let err = save_row(&mut store, &mut ctl, &script).unwrap_err();

        assert!(matches!(err, EngineError::Anomaly { .. }));
        assert_eq!(ctl.state(), crate::SessionState::Idle);
        assert_eq!(store.errors(EntityType::Books).len(), 1);
        assert!(store.transformed(EntityType::Books).is_empty());
        assert_eq!(store.fixed(), 0);
    }

    #[test]
    fn surplus_entries_use_first() {
        let mut store = store_with_errors(vec![bad_row(7)]);
        let mut ctl = SessionController::new();
        open_session(&store, &mut ctl, 0);
        ctl.edit_field("email", "a@b.com").unwrap();

        let script = Script::returning(Verdict {
            transformed: vec![
                Record::from_pairs([("id", json!(7)), ("email", json!("a@b.com"))]),
                Record::from_pairs([("id", json!(99))]),
            ],
            errors: vec![],
        });

        assert_eq!(save_row(&mut store, &mut ctl, &script).unwrap(), SaveOutcome::Fixed);
        // Only the first entry landed.
        assert_eq!(store.transformed(EntityType::Books).len(), 1);
        assert_eq!(
            store.transformed(EntityType::Books)[0].field_str("id").as_deref(),
            Some("7")
        );
    }

    #[test]
    fn positional_identity_round_trip() {
        // Row without key fields: the session pins its index, and the bucket
        // is not reordered underneath it.
        let mut unkeyed = Record::from_pairs([("title", json!("untitled"))]);
        unkeyed.set_errors(vec![ErrorEntry::new("title", "NOT_BLANK", "blank")]);
        let mut store = store_with_errors(vec![bad_row(7), unkeyed]);
        let mut ctl = SessionController::new();
        open_session(&store, &mut ctl, 1);
        assert_eq!(ctl.session().unwrap().row_id, RowId::Index(1));
        ctl.edit_field("title", "Dune").unwrap();

        let script = Script::returning(Verdict {
            transformed: vec![Record::from_pairs([("title", json!("Dune"))])],
            errors: vec![],
        });
        assert_eq!(save_row(&mut store, &mut ctl, &script).unwrap(), SaveOutcome::Fixed);
        assert_eq!(store.errors(EntityType::Books).len(), 1);
        assert_eq!(store.transformed(EntityType::Books).len(), 1);
    }
}
