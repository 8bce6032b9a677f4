use serde::{Deserialize, Serialize};

use crate::record::Record;

/// Revalidation outcome for a submission: the backend re-runs its rule set
/// and partitions the rows it was given.
///
/// For a single-row `/reprocess` call the contract is at most one entry in
/// one of the two sequences; surplus entries are a protocol violation the
/// engine logs rather than silently drops.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Verdict {
    #[serde(default)]
    pub transformed: Vec<Record>,
    #[serde(default)]
    pub errors: Vec<Record>,
}

impl Verdict {
    pub fn is_empty(&self) -> bool {
        self.transformed.is_empty() && self.errors.is_empty()
    }
}

/// Response body of `POST /reprocess`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReprocessResponse {
    pub results: Verdict,
    #[serde(default, rename = "tracingId", skip_serializing_if = "Option::is_none")]
    pub tracing_id: Option<String>,
}

/// Per-entity row counts returned by `POST /load-to-source`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LoadReport {
    pub customers: i64,
    pub books: i64,
    pub orders: i64,
    pub total: i64,
}

/// Response body of `POST /load-to-source`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadResponse {
    pub loaded: LoadReport,
}

/// Request body of `POST /save` (CSV export).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveRequest {
    pub rows: Vec<Record>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reprocess_response_parse() {
        let resp: ReprocessResponse = serde_json::from_value(json!({
            "results": {
                "transformed": [{"id": 7, "email": "a@b.com"}],
                "errors": []
            },
            "tracingId": "trace-42"
        }))
        .unwrap();

        assert_eq!(resp.results.transformed.len(), 1);
        assert!(resp.results.errors.is_empty());
        assert_eq!(resp.tracing_id.as_deref(), Some("trace-42"));
    }

    #[test]
    fn verdict_missing_sequences_default_empty() {
        let verdict: Verdict = serde_json::from_value(json!({})).unwrap();
        assert!(verdict.is_empty());
    }

    #[test]
    fn load_response_parse() {
        let resp: LoadResponse = serde_json::from_value(json!({
            "loaded": {"customers": 3, "books": 12, "orders": 5, "total": 20}
        }))
        .unwrap();
        assert_eq!(resp.loaded.total, 20);
        assert_eq!(resp.loaded.books, 12);
    }
}
