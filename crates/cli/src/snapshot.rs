//! Results snapshot file — the backend's upload/reprocess response shape
//! (`{"results": {"transformed": [...], "errors": [...]}}`) persisted to
//! disk so corrections can run headless against it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use rowmend_engine::{EntityType, ResultStore};
use rowmend_protocol::{Record, Verdict};

use crate::exit_codes;
use crate::CliError;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    results: Verdict,
    #[serde(default, rename = "tracingId", skip_serializing_if = "Option::is_none")]
    tracing_id: Option<String>,
}

/// Read a snapshot into a freshly-loaded store. Records are partitioned by
/// their key fields; rows without a recognizable key land in `fallback`.
pub fn load_store(path: &Path, fallback: EntityType) -> Result<ResultStore, CliError> {
    let content = std::fs::read_to_string(path).map_err(|e| CliError {
        code: exit_codes::EXIT_IO,
        message: format!("cannot read snapshot {}: {}", path.display(), e),
        hint: None,
    })?;
    let file: SnapshotFile = serde_json::from_str(&content).map_err(|e| CliError {
        code: exit_codes::EXIT_PARSE,
        message: format!("invalid snapshot JSON in {}: {}", path.display(), e),
        hint: Some("expected {\"results\": {\"transformed\": [...], \"errors\": [...]}}".into()),
    })?;

    let mut store = ResultStore::new();
    store.load_flat(file.results.transformed, file.results.errors, fallback);
    Ok(store)
}

/// Write the store back in the same flat shape it was loaded from.
pub fn write_store(path: &Path, store: &ResultStore) -> Result<(), CliError> {
    let mut transformed: Vec<Record> = Vec::new();
    let mut errors: Vec<Record> = Vec::new();
    for entity in EntityType::ALL {
        transformed.extend(store.transformed(entity).iter().cloned());
        errors.extend(store.errors(entity).iter().cloned());
    }

    let file = SnapshotFile {
        results: Verdict { transformed, errors },
        tracing_id: None,
    };
    let json = serde_json::to_string_pretty(&file).map_err(|e| CliError {
        code: exit_codes::EXIT_ERROR,
        message: format!("failed to serialize snapshot: {}", e),
        hint: None,
    })?;
    std::fs::write(path, json).map_err(|e| CliError {
        code: exit_codes::EXIT_IO,
        message: format!("cannot write snapshot {}: {}", path.display(), e),
        hint: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn load_and_write_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(
            &path,
            json!({
                "results": {
                    "transformed": [{"book_key": "BK1", "title": "Dune"}],
                    "errors": [{
                        "book_key": "BK7", "email": "BAD",
                        "_errors": [{"field": "email", "rule": "EMAIL_FORMAT", "message": "invalid"}]
                    }]
                },
                "tracingId": "t-1"
            })
            .to_string(),
        )
        .unwrap();

        let store = load_store(&path, EntityType::Books).unwrap();
        assert_eq!(store.transformed(EntityType::Books).len(), 1);
        assert_eq!(store.errors(EntityType::Books).len(), 1);

        let out = dir.path().join("out.json");
        write_store(&out, &store).unwrap();
        let reread = load_store(&out, EntityType::Books).unwrap();
        assert_eq!(reread.summary(), store.summary());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_store(Path::new("/nonexistent/results.json"), EntityType::Books)
            .unwrap_err();
        assert_eq!(err.code, exit_codes::EXIT_IO);
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();
        let err = load_store(&path, EntityType::Books).unwrap_err();
        assert_eq!(err.code, exit_codes::EXIT_PARSE);
        assert!(err.hint.is_some());
    }
}
