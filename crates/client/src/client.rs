use std::collections::BTreeMap;
use std::time::Duration;

use rowmend_protocol::{LoadReport, LoadResponse, Record, ReprocessResponse, SaveRequest};

/// How long a normal call may take. Revalidation is interactive.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// The bulk load runs the whole pipeline; it is allowed to take minutes.
const LOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// ETL backend API client (blocking).
#[derive(Clone)]
pub struct EtlClient {
    http: reqwest::blocking::Client,
    api_base: String,
}

/// Error type for backend calls.
#[derive(Debug)]
pub enum ApiError {
    /// Transport failure
    Network(String),
    /// HTTP error with status code
    Http(u16, String),
    /// JSON parsing error
    Parse(String),
    /// Server rejected the request (4xx with message)
    Validation(String),
    /// The call outlived its timeout
    Timeout(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Network(msg) => write!(f, "Network error: {}", msg),
            ApiError::Http(code, msg) => write!(f, "HTTP {}: {}", code, msg),
            ApiError::Parse(msg) => write!(f, "Parse error: {}", msg),
            ApiError::Validation(msg) => write!(f, "{}", msg),
            ApiError::Timeout(msg) => write!(f, "Timeout: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl EtlClient {
    /// Create a new client against a backend base URL (including any path
    /// prefix, e.g. `http://localhost:8080/api/etl`).
    pub fn new(api_base: impl Into<String>) -> Self {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("rowmend/{}", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Revalidate one corrected row. Body is the flat merged field map; the
    /// verdict partitions the row into transformed or errors.
    pub fn reprocess(
        &self,
        fields: &BTreeMap<String, String>,
    ) -> Result<ReprocessResponse, ApiError> {
        let url = format!("{}/reprocess", self.api_base);
        let resp = self.post_json(&url, &serde_json::to_value(fields).unwrap_or_default())?;
        resp.json::<ReprocessResponse>()
            .map_err(|e| ApiError::Parse(e.to_string()))
    }

    /// Load the cleaned result set into the source database. Runs the whole
    /// load stage server-side, so the timeout is long; when it still trips,
    /// the caller gets a "still running" message rather than a silent drop.
    pub fn load_to_source(&self) -> Result<LoadReport, ApiError> {
        let url = format!("{}/load-to-source", self.api_base);
        let response = self
            .http
            .post(&url)
            .timeout(LOAD_TIMEOUT)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    ApiError::Timeout(
                        "load did not finish within 120s; the pipeline may still be running, \
                         check again before retrying"
                            .into(),
                    )
                } else {
                    ApiError::Network(e.to_string())
                }
            })?;
        let response = check_status(response)?;
        let body: LoadResponse = response
            .json()
            .map_err(|e| ApiError::Parse(e.to_string()))?;
        Ok(body.loaded)
    }

    /// Export rows as CSV. Returns the raw bytes the backend produced.
    pub fn save_csv(&self, rows: &[Record]) -> Result<Vec<u8>, ApiError> {
        let url = format!("{}/save", self.api_base);
        let request = SaveRequest { rows: rows.to_vec() };
        let resp = self.post_json(&url, &serde_json::to_value(&request).unwrap_or_default())?;
        let bytes = resp.bytes().map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::blocking::Response, ApiError> {
        let response = self.http.post(url).json(body).send().map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout(e.to_string())
            } else {
                ApiError::Network(e.to_string())
            }
        })?;
        check_status(response)
    }
}

fn check_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, ApiError> {
    let status = response.status().as_u16();
    if !response.status().is_success() {
        let body = response.text().unwrap_or_default();
        if status == 422 || status == 400 {
            return Err(ApiError::Validation(extract_message(&body)));
        }
        return Err(ApiError::Http(status, body));
    }
    Ok(response)
}

/// Pull the backend's `message` field out of an error body when there is
/// one; otherwise pass the body through.
fn extract_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.to_string())
}

/// The engine submits corrections through this seam.
impl rowmend_engine::Revalidator for EtlClient {
    fn reprocess(
        &self,
        fields: &BTreeMap<String, String>,
    ) -> Result<ReprocessResponse, rowmend_engine::EngineError> {
        EtlClient::reprocess(self, fields)
            .map_err(|e| rowmend_engine::EngineError::Network(e.to_string()))
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_reprocess_fixed_verdict() {
        let server = MockServer::start();

        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/reprocess")
                .json_body(json!({"id": "7", "email": "a@b.com"}));
            then.status(200).json_body(json!({
                "results": {
                    "transformed": [{"id": 7, "email": "a@b.com"}],
                    "errors": []
                },
                "tracingId": "t-99"
            }));
        });

        let client = EtlClient::new(server.base_url());
        let resp = client
            .reprocess(&fields(&[("id", "7"), ("email", "a@b.com")]))
            .unwrap();

        mock.assert();
        assert_eq!(resp.results.transformed.len(), 1);
        assert!(resp.results.errors.is_empty());
        assert_eq!(resp.tracing_id.as_deref(), Some("t-99"));
    }

    #[test]
    fn test_reprocess_error_verdict_with_reserved_keys() {
        let server = MockServer::start();

        server.mock(|when, then| {
            when.method(POST).path("/reprocess");
            then.status(200).json_body(json!({
                "results": {
                    "transformed": [],
                    "errors": [{
                        "id": 7,
                        "email": "a@b",
                        "_original_email": "A@B",
                        "_errors": [{"field": "email", "rule": "EMAIL_FORMAT", "message": "invalid"}]
                    }]
                }
            }));
        });

        let client = EtlClient::new(server.base_url());
        let resp = client.reprocess(&fields(&[("email", "a@b")])).unwrap();

        let row = &resp.results.errors[0];
        assert_eq!(row.errors()[0].rule, "EMAIL_FORMAT");
        assert_eq!(row.original("email"), Some(&json!("A@B")));
        // Reserved keys stay out of the visible field set.
        assert!(row.field("_errors").is_none());
        assert!(row.field("_original_email").is_none());
    }

    #[test]
    fn test_reprocess_validation_error() {
        let server = MockServer::start();

        server.mock(|when, then| {
            when.method(POST).path("/reprocess");
            then.status(422)
                .json_body(json!({"message": "unknown entity for record"}));
        });

        let client = EtlClient::new(server.base_url());
        let err = client.reprocess(&fields(&[("x", "y")])).unwrap_err();
        match err {
            ApiError::Validation(msg) => assert_eq!(msg, "unknown entity for record"),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_reprocess_server_error() {
        let server = MockServer::start();

        server.mock(|when, then| {
            when.method(POST).path("/reprocess");
            then.status(500).body("boom");
        });

        let client = EtlClient::new(server.base_url());
        let err = client.reprocess(&fields(&[])).unwrap_err();
        assert!(matches!(err, ApiError::Http(500, _)));
    }

    #[test]
    fn test_load_to_source() {
        let server = MockServer::start();

        server.mock(|when, then| {
            when.method(POST).path("/load-to-source");
            then.status(200).json_body(json!({
                "loaded": {"customers": 3, "books": 10, "orders": 4, "total": 17}
            }));
        });

        let client = EtlClient::new(server.base_url());
        let loaded = client.load_to_source().unwrap();
        assert_eq!(loaded.total, 17);
        assert_eq!(loaded.books, 10);
    }

    #[test]
    fn test_save_csv_bytes_passthrough() {
        let server = MockServer::start();

        let csv = "id,email\n7,a@b.com\n";
        server.mock(|when, then| {
            when.method(POST).path("/save");
            then.status(200)
                .header("Content-Type", "text/csv")
                .body(csv);
        });

        let client = EtlClient::new(server.base_url());
        let rows = vec![Record::from_pairs([
            ("id", json!(7)),
            ("email", json!("a@b.com")),
        ])];
        let bytes = client.save_csv(&rows).unwrap();
        assert_eq!(bytes, csv.as_bytes());
    }

    #[test]
    fn test_trailing_slash_base() {
        let server = MockServer::start();

        server.mock(|when, then| {
            when.method(POST).path("/load-to-source");
            then.status(200).json_body(json!({
                "loaded": {"customers": 0, "books": 0, "orders": 0, "total": 0}
            }));
        });

        let client = EtlClient::new(format!("{}/", server.base_url()));
        assert_eq!(client.load_to_source().unwrap().total, 0);
    }

    #[test]
    fn test_revalidator_seam_maps_errors() {
        use rowmend_engine::Revalidator;

        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/reprocess");
            then.status(500).body("boom");
        });

        let client = EtlClient::new(server.base_url());
        let err = Revalidator::reprocess(&client, &fields(&[])).unwrap_err();
        assert!(matches!(err, rowmend_engine::EngineError::Network(_)));
    }
}
