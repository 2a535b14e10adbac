//! Authenticated request pipeline
//!
//! Every call runs `BUILD -> SIGN -> DISPATCH -> UNWRAP` once. Nothing is
//! retried, cached or carried over between calls; the only shared state is
//! the immutable credentials.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::PtvConfig;
use crate::credentials::Credentials;
use crate::endpoint::ApiVersion;
use crate::envelope::{FullOutput, ResultSelector, unwrap_envelope, unwrap_full};
use crate::error::PtvError;
use crate::params::{ParameterSet, canonicalize};
use crate::signer::sign;
use crate::transport::{ReqwestTransport, SignedRequest, SignedTransport};

/// Query parameter carrying the developer id
pub const DEVID_PARAM: &str = "devid";

/// Query parameter carrying the request signature
pub const SIGNATURE_PARAM: &str = "signature";

/// One logical API call: where it goes, what it sends, which field it returns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    /// API version
    pub version: ApiVersion,
    /// Bare resource path, e.g. `routes/1`
    pub resource: String,
    /// Caller parameters (without `devid` / `signature`)
    pub params: ParameterSet,
    /// How the result is picked from the response payload
    pub selector: ResultSelector,
}

impl ApiRequest {
    /// Create a request for a resource path
    pub fn new(version: ApiVersion, resource: impl Into<String>) -> Self {
        Self {
            version,
            resource: resource.into(),
            params: ParameterSet::new(),
            selector: ResultSelector::Auto,
        }
    }

    /// Create a v2 request
    pub fn v2(resource: impl Into<String>) -> Self {
        Self::new(ApiVersion::V2, resource)
    }

    /// Create a v3 request
    pub fn v3(resource: impl Into<String>) -> Self {
        Self::new(ApiVersion::V3, resource)
    }

    /// Set the request parameters
    #[must_use]
    pub fn with_params(mut self, params: ParameterSet) -> Self {
        self.params = params;
        self
    }

    /// Name the payload field to return when the response has several
    #[must_use]
    pub fn with_result_key(mut self, key: impl Into<String>) -> Self {
        self.selector = ResultSelector::key(key);
        self
    }

    /// Return the whole payload instead of a single field
    #[must_use]
    pub fn whole_payload(mut self) -> Self {
        self.selector = ResultSelector::Payload;
        self
    }
}

/// Shared signing and dispatch machinery used by every versioned client
#[derive(Clone)]
pub struct RequestPipeline {
    credentials: Credentials,
    base_url: Url,
    transport: Arc<dyn SignedTransport>,
    strict_status: bool,
}

impl fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("credentials", &self.credentials)
            .field("base_url", &self.base_url.as_str())
            .field("transport", &"dyn SignedTransport")
            .field("strict_status", &self.strict_status)
            .finish()
    }
}

impl RequestPipeline {
    /// Build a pipeline from configuration
    ///
    /// Credentials are resolved here, once; environment fallbacks are never
    /// consulted again on the per-call path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, credentials are
    /// missing or the HTTP client cannot be initialized.
    pub fn new(config: &PtvConfig) -> Result<Self, PtvError> {
        config.validate().map_err(PtvError::Configuration)?;

        let credentials = config.credentials()?;
        let base_url = config.parsed_base_url()?;
        let transport = Arc::new(ReqwestTransport::new(config)?);

        Ok(Self::with_transport(credentials, base_url, transport).strict_status(config.strict_status))
    }

    /// Build a pipeline around an arbitrary transport
    pub fn with_transport(
        credentials: Credentials,
        base_url: Url,
        transport: Arc<dyn SignedTransport>,
    ) -> Self {
        Self {
            credentials,
            base_url,
            transport,
            strict_status: false,
        }
    }

    /// Treat a missing envelope status as an error
    #[must_use]
    pub fn strict_status(mut self, strict: bool) -> Self {
        self.strict_status = strict;
        self
    }

    /// The developer id requests are signed for
    #[must_use]
    pub fn user_id(&self) -> &str {
        self.credentials.user_id()
    }

    /// Build and sign a request
    ///
    /// `devid` is appended after the caller parameters (or overwritten in
    /// place if the caller set it); the signature covers the versioned path
    /// and the canonical parameter string.
    ///
    /// # Errors
    ///
    /// Returns `PtvError::InvalidPath` for a malformed resource path and
    /// `PtvError::Signing` if the key cannot be used.
    pub fn prepare(
        &self,
        version: ApiVersion,
        resource: &str,
        mut params: ParameterSet,
    ) -> Result<SignedRequest, PtvError> {
        let path = version.resolve(resource)?;

        if params.remove(SIGNATURE_PARAM).is_some() {
            warn!(%path, "Dropping caller-supplied signature parameter");
        }
        params.insert(DEVID_PARAM, self.credentials.user_id());

        let canonical = canonicalize(&params);
        let signature = sign(&path, &canonical, self.credentials.expose_key().as_bytes())?;

        let mut url = self.base_url.clone();
        let prefix = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{prefix}{path}"));

        let mut request = SignedRequest {
            url,
            path,
            params,
            signature,
        };
        let query = request.query_string();
        request.url.set_query(Some(&query));

        debug!(path = %request.path, params = request.params.len(), "Prepared signed request");
        Ok(request)
    }

    /// Run a call and return the unwrapped result
    ///
    /// # Errors
    ///
    /// Returns the first failure of any stage; see [`PtvError`].
    #[instrument(skip(self, request), fields(version = %request.version, resource = %request.resource))]
    pub async fn execute(&self, request: ApiRequest) -> Result<Value, PtvError> {
        let signed = self.prepare(request.version, &request.resource, request.params)?;
        let raw = self.transport.send(&signed).await?;
        let (result, _status) =
            unwrap_envelope(raw.body, &request.selector, self.strict_status)?;
        Ok(result)
    }

    /// Run a call and return the result, the envelope status and the raw response
    ///
    /// # Errors
    ///
    /// Returns the first failure of any stage; see [`PtvError`].
    #[instrument(skip(self, request), fields(version = %request.version, resource = %request.resource))]
    pub async fn execute_full(&self, request: ApiRequest) -> Result<FullOutput, PtvError> {
        let signed = self.prepare(request.version, &request.resource, request.params)?;
        let raw = self.transport.send(&signed).await?;
        unwrap_full(raw, &request.selector, self.strict_status)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::params::ParamValue;
    use crate::transport::{MockSignedTransport, RawResponse};

    fn credentials() -> Credentials {
        Credentials::new("1234", "mysecret").unwrap()
    }

    fn base_url() -> Url {
        Url::parse("https://timetableapi.ptv.vic.gov.au").unwrap()
    }

    fn pipeline_with(mock: MockSignedTransport) -> RequestPipeline {
        RequestPipeline::with_transport(credentials(), base_url(), Arc::new(mock))
    }

    fn ok_response(body: Value) -> RawResponse {
        RawResponse {
            url: "https://timetableapi.ptv.vic.gov.au/v3/route_types".to_string(),
            status_code: 200,
            body,
        }
    }

    #[test]
    fn test_prepare_golden_vector() {
        let pipeline = pipeline_with(MockSignedTransport::new());
        let request = pipeline
            .prepare(ApiVersion::V3, "route_types", ParameterSet::new())
            .unwrap();

        assert_eq!(request.path, "/v3/route_types");
        assert_eq!(request.signature, "a14f0af26c47c5fcdcc8d0522f55a0d041b99123");
        assert_eq!(
            request.url.as_str(),
            "https://timetableapi.ptv.vic.gov.au/v3/route_types?devid=1234&signature=a14f0af26c47c5fcdcc8d0522f55a0d041b99123"
        );
    }

    #[test]
    fn test_prepare_appends_devid_after_caller_params() {
        let pipeline = pipeline_with(MockSignedTransport::new());
        let params = ParameterSet::new().with("route_types", ParamValue::multi([0, 1]));
        let request = pipeline.prepare(ApiVersion::V3, "/routes/", params).unwrap();

        assert_eq!(request.path, "/v3/routes");
        assert_eq!(request.signature, "d4a68b3b0efa5a7dd6afc9411584350f4395c517");
        assert_eq!(
            request.url.query(),
            Some("route_types=0%0A1&devid=1234&signature=d4a68b3b0efa5a7dd6afc9411584350f4395c517")
        );
    }

    #[test]
    fn test_prepare_overrides_caller_devid_and_signature() {
        let pipeline = pipeline_with(MockSignedTransport::new());
        let params = ParameterSet::new()
            .with("devid", "spoofed")
            .with("signature", "forged");
        let request = pipeline.prepare(ApiVersion::V3, "route_types", params).unwrap();

        assert_eq!(request.params.get("devid"), Some(&ParamValue::from("1234")));
        assert!(!request.params.contains_key("signature"));
        assert_eq!(request.signature, "a14f0af26c47c5fcdcc8d0522f55a0d041b99123");
    }

    #[test]
    fn test_prepare_keeps_base_path_prefix() {
        let base = Url::parse("http://127.0.0.1:8080/proxy/").unwrap();
        let pipeline =
            RequestPipeline::with_transport(credentials(), base, Arc::new(MockSignedTransport::new()));
        let request = pipeline.prepare(ApiVersion::V2, "healthcheck", ParameterSet::new()).unwrap();

        assert_eq!(request.url.path(), "/proxy/v2/healthcheck");
        assert_eq!(request.path, "/v2/healthcheck");
    }

    #[test]
    fn test_prepare_rejects_empty_resource() {
        let pipeline = pipeline_with(MockSignedTransport::new());
        let result = pipeline.prepare(ApiVersion::V3, " / ", ParameterSet::new());
        assert!(matches!(result, Err(PtvError::InvalidPath(_))));
    }

    #[tokio::test]
    async fn test_execute_unwraps_single_field() {
        let mut mock = MockSignedTransport::new();
        mock.expect_send()
            .withf(|req| {
                req.params.contains_key("devid") && !req.signature.is_empty()
            })
            .times(1)
            .returning(|_| {
                Ok(ok_response(json!({
                    "route_types": [{ "route_type": 0, "route_type_name": "Train" }],
                    "status": { "version": "3.0", "health": 1 }
                })))
            });

        let pipeline = pipeline_with(mock);
        let result = pipeline.execute(ApiRequest::v3("route_types")).await.unwrap();
        assert_eq!(result, json!([{ "route_type": 0, "route_type_name": "Train" }]));
    }

    #[tokio::test]
    async fn test_execute_full_returns_status_and_raw() {
        let mut mock = MockSignedTransport::new();
        mock.expect_send().returning(|_| {
            Ok(ok_response(json!({
                "departures": [{ "stop_id": 1071 }],
                "stops": {},
                "status": { "version": "3.0", "health": 1 }
            })))
        });

        let pipeline = pipeline_with(mock);
        let full = pipeline
            .execute_full(ApiRequest::v3("departures/route_type/0/stop/1071").with_result_key("departures"))
            .await
            .unwrap();

        assert_eq!(full.result, json!([{ "stop_id": 1071 }]));
        assert_eq!(full.status.health(), Some(1));
        assert!(full.raw.body.get("stops").is_some());
    }

    #[tokio::test]
    async fn test_execute_propagates_http_error() {
        let mut mock = MockSignedTransport::new();
        mock.expect_send().returning(|_| {
            Err(PtvError::Http {
                status: 403,
                body: "{\"message\":\"Forbidden\"}".to_string(),
            })
        });

        let pipeline = pipeline_with(mock);
        let err = pipeline.execute(ApiRequest::v3("routes")).await.unwrap_err();
        assert_eq!(err.status_code(), Some(403));
    }

    #[tokio::test]
    async fn test_execute_strict_status() {
        let mut mock = MockSignedTransport::new();
        mock.expect_send()
            .returning(|_| Ok(ok_response(json!({ "routes": [] }))));

        let pipeline = pipeline_with(mock).strict_status(true);
        let result = pipeline.execute(ApiRequest::v3("routes")).await;
        assert!(matches!(result, Err(PtvError::MissingStatus)));
    }

    #[tokio::test]
    async fn test_execute_does_not_dispatch_invalid_path() {
        let mut mock = MockSignedTransport::new();
        mock.expect_send().times(0);

        let pipeline = pipeline_with(mock);
        let result = pipeline.execute(ApiRequest::v3("")).await;
        assert!(matches!(result, Err(PtvError::InvalidPath(_))));
    }

    #[test]
    fn test_debug_hides_key() {
        let pipeline = pipeline_with(MockSignedTransport::new());
        let debug = format!("{pipeline:?}");
        assert!(debug.contains("1234"));
        assert!(!debug.contains("mysecret"));
    }
}
