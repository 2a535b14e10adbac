//! Response envelope unwrapping
//!
//! Every PTV response is a JSON object with a `status` field next to one or
//! more payload fields. The status is split off first; the caller-visible
//! result is then picked from what remains.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::PtvError;
use crate::transport::RawResponse;

/// Name of the envelope status field
pub const STATUS_FIELD: &str = "status";

/// Status reported by the server alongside the payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EnvelopeStatus {
    /// The envelope carried a `status` field
    Reported(Value),
    /// The envelope had no `status` field
    Missing,
}

impl EnvelopeStatus {
    /// Whether the server omitted the status
    #[must_use]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// The raw status value, if reported
    #[must_use]
    pub const fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Reported(value) => Some(value),
            Self::Missing => None,
        }
    }

    /// API version reported in the status (`status.version`)
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.as_value()?.get("version")?.as_str()
    }

    /// Health flag reported in the status (`status.health`, 1 = healthy)
    #[must_use]
    pub fn health(&self) -> Option<i64> {
        self.as_value()?.get("health")?.as_i64()
    }
}

/// How the caller-visible result is picked from the payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ResultSelector {
    /// A single payload field is unwrapped; several fields are ambiguous
    #[default]
    Auto,
    /// A single payload field is unwrapped; with several, this one is returned
    Key(String),
    /// The whole payload (minus status) is returned as-is
    Payload,
}

impl ResultSelector {
    /// Select a named payload field
    pub fn key(name: impl Into<String>) -> Self {
        Self::Key(name.into())
    }
}

/// Result of a call together with its status and the raw response
#[derive(Debug, Clone, Serialize)]
pub struct FullOutput {
    /// The unwrapped, caller-visible result
    pub result: Value,
    /// Envelope status
    pub status: EnvelopeStatus,
    /// The response as received
    pub raw: RawResponse,
}

/// Split the status off a decoded body and pick the caller-visible result
///
/// Bodies that are not JSON objects (some v2 endpoints answer with a bare
/// array) have no envelope; they are returned unchanged with a missing
/// status.
///
/// # Errors
///
/// - `PtvError::MissingStatus` if `strict_status` is set and the body has no
///   `status` field
/// - `PtvError::AmbiguousResult` if several fields remain and the selector
///   does not pick one of them
pub fn unwrap_envelope(
    body: Value,
    selector: &ResultSelector,
    strict_status: bool,
) -> Result<(Value, EnvelopeStatus), PtvError> {
    let mut payload = match body {
        Value::Object(payload) => payload,
        other if strict_status => {
            debug!(kind = kind_of(&other), "Response body has no envelope");
            return Err(PtvError::MissingStatus);
        },
        other => {
            warn!(kind = kind_of(&other), "Response body has no envelope");
            return Ok((other, EnvelopeStatus::Missing));
        },
    };

    let status = match payload.remove(STATUS_FIELD) {
        Some(status) => EnvelopeStatus::Reported(status),
        None if strict_status => return Err(PtvError::MissingStatus),
        None => {
            warn!("Response envelope has no status field");
            EnvelopeStatus::Missing
        },
    };

    let result = select_result(payload, selector)?;
    Ok((result, status))
}

fn select_result(
    mut payload: Map<String, Value>,
    selector: &ResultSelector,
) -> Result<Value, PtvError> {
    if *selector == ResultSelector::Payload || payload.is_empty() {
        return Ok(Value::Object(payload));
    }

    if payload.len() == 1 {
        if let Some((_, value)) = payload.into_iter().next() {
            return Ok(value);
        }
        return Ok(Value::Object(Map::new()));
    }

    if let ResultSelector::Key(key) = selector {
        if let Some(value) = payload.remove(key) {
            return Ok(value);
        }
    }

    Err(PtvError::AmbiguousResult {
        available: payload.keys().cloned().collect(),
    })
}

const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Unwrap a raw response into a [`FullOutput`]
///
/// # Errors
///
/// See [`unwrap_envelope`].
pub fn unwrap_full(
    raw: RawResponse,
    selector: &ResultSelector,
    strict_status: bool,
) -> Result<FullOutput, PtvError> {
    let (result, status) = unwrap_envelope(raw.body.clone(), selector, strict_status)?;
    Ok(FullOutput {
        result,
        status,
        raw,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_single_key_payload_is_unwrapped() {
        let body = json!({
            "routes": [{ "route_id": 1, "route_name": "Alamein" }],
            "status": { "version": "3.0", "health": 1 }
        });

        let (result, status) = unwrap_envelope(body, &ResultSelector::Auto, false).unwrap();
        assert_eq!(result, json!([{ "route_id": 1, "route_name": "Alamein" }]));
        assert_eq!(status.version(), Some("3.0"));
        assert_eq!(status.health(), Some(1));
    }

    #[test]
    fn test_single_key_ignores_result_key() {
        let body = json!({ "route": { "route_id": 1 }, "status": "OK" });
        let (result, _) = unwrap_envelope(body, &ResultSelector::key("routes"), false).unwrap();
        assert_eq!(result, json!({ "route_id": 1 }));
    }

    #[test]
    fn test_multi_key_payload_uses_result_key() {
        let body = json!({
            "routes": [{ "route_id": 1 }],
            "extra": [1, 2],
            "status": "OK"
        });

        let (result, status) = unwrap_envelope(body, &ResultSelector::key("routes"), false).unwrap();
        assert_eq!(result, json!([{ "route_id": 1 }]));
        assert_eq!(status, EnvelopeStatus::Reported(json!("OK")));
    }

    #[test]
    fn test_multi_key_without_result_key_is_ambiguous() {
        let body = json!({ "departures": [], "stops": {}, "status": "OK" });

        let err = unwrap_envelope(body, &ResultSelector::Auto, false).unwrap_err();
        match err {
            PtvError::AmbiguousResult { available } => {
                assert_eq!(available, vec!["departures".to_string(), "stops".to_string()]);
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_multi_key_with_unknown_result_key_is_ambiguous() {
        let body = json!({ "departures": [], "stops": {}, "status": "OK" });
        let result = unwrap_envelope(body, &ResultSelector::key("runs"), false);
        assert!(matches!(result, Err(PtvError::AmbiguousResult { .. })));
    }

    #[test]
    fn test_missing_status_is_lenient_by_default() {
        let body = json!({ "routes": [] });
        let (result, status) = unwrap_envelope(body, &ResultSelector::Auto, false).unwrap();
        assert_eq!(result, json!([]));
        assert!(status.is_missing());
        assert_eq!(status.health(), None);
    }

    #[test]
    fn test_missing_status_strict() {
        let body = json!({ "routes": [] });
        let result = unwrap_envelope(body, &ResultSelector::Auto, true);
        assert!(matches!(result, Err(PtvError::MissingStatus)));
    }

    #[test]
    fn test_status_only_yields_empty_object() {
        let body = json!({ "status": { "health": 1 } });
        let (result, _) = unwrap_envelope(body, &ResultSelector::Auto, false).unwrap();
        assert_eq!(result, json!({}));
    }

    #[test]
    fn test_payload_selector_returns_whole_payload() {
        let body = json!({
            "securityTokenOK": true,
            "databaseOK": true,
            "status": "OK"
        });
        let (result, _) = unwrap_envelope(body, &ResultSelector::Payload, false).unwrap();
        assert_eq!(result, json!({ "securityTokenOK": true, "databaseOK": true }));

        let body = json!({ "route": { "route_id": 1 }, "status": "OK" });
        let (result, _) = unwrap_envelope(body, &ResultSelector::Payload, false).unwrap();
        assert_eq!(result, json!({ "route": { "route_id": 1 } }));
    }

    #[test]
    fn test_bare_array_body_passes_through() {
        let body = json!([{ "line_id": 1 }, { "line_id": 2 }]);
        let (result, status) = unwrap_envelope(body, &ResultSelector::Payload, false).unwrap();
        assert_eq!(result, json!([{ "line_id": 1 }, { "line_id": 2 }]));
        assert!(status.is_missing());
    }

    #[test]
    fn test_bare_array_body_strict() {
        let result = unwrap_envelope(json!([1, 2, 3]), &ResultSelector::Auto, true);
        assert!(matches!(result, Err(PtvError::MissingStatus)));
    }

    #[test]
    fn test_unwrap_full_keeps_raw_body() {
        let raw = RawResponse {
            url: "https://timetableapi.ptv.vic.gov.au/v3/route_types".to_string(),
            status_code: 200,
            body: json!({ "route_types": [], "status": { "health": 1 } }),
        };

        let full = unwrap_full(raw, &ResultSelector::Auto, false).unwrap();
        assert_eq!(full.result, json!([]));
        assert_eq!(full.status.health(), Some(1));
        assert_eq!(full.raw.status_code, 200);
        assert!(full.raw.body.get("status").is_some());
    }
}
