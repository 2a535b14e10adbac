//! Signed request dispatch
//!
//! [`SignedTransport`] is the seam between the pipeline and the network.
//! [`ReqwestTransport`] is the production implementation.

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::config::PtvConfig;
use crate::error::PtvError;
use crate::params::ParameterSet;

/// A fully built request, ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// Absolute URL including the signed query string
    pub url: Url,
    /// Version-qualified path that was signed (e.g. `/v3/route_types`)
    pub path: String,
    /// Parameters that were signed, `devid` included
    pub params: ParameterSet,
    /// Lowercase hex HMAC-SHA1 signature
    pub signature: String,
}

impl SignedRequest {
    /// Query string as transmitted: the signed parameters followed by `signature`
    #[must_use]
    pub fn query_string(&self) -> String {
        let canonical = self.params.to_query_string();
        if canonical.is_empty() {
            format!("signature={}", self.signature)
        } else {
            format!("{canonical}&signature={}", self.signature)
        }
    }
}

/// A decoded response as received from the server
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawResponse {
    /// URL the response came from
    pub url: String,
    /// HTTP status code
    pub status_code: u16,
    /// Decoded JSON body, envelope intact
    pub body: Value,
}

/// Sends signed requests
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SignedTransport: Send + Sync {
    /// Perform a GET for the signed request and decode the JSON body
    async fn send(&self, request: &SignedRequest) -> Result<RawResponse, PtvError>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    timeout_secs: Option<u64>,
}

impl ReqwestTransport {
    /// Create a transport from the client configuration
    ///
    /// No timeout is set unless `timeout_secs` is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(config: &PtvConfig) -> Result<Self, PtvError> {
        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        let client = builder
            .build()
            .map_err(|e| PtvError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs: config.timeout_secs,
        })
    }

    fn map_send_error(&self, e: &reqwest::Error) -> PtvError {
        match self.timeout_secs {
            Some(timeout_secs) if e.is_timeout() => PtvError::Timeout { timeout_secs },
            _ => PtvError::ConnectionFailed(e.to_string()),
        }
    }
}

#[async_trait]
impl SignedTransport for ReqwestTransport {
    #[instrument(skip(self, request), fields(path = %request.path))]
    async fn send(&self, request: &SignedRequest) -> Result<RawResponse, PtvError> {
        let response = self
            .client
            .get(request.url.clone())
            .send()
            .await
            .map_err(|e| self.map_send_error(&e))?;

        let status = response.status();
        let url = response.url().to_string();
        let text = response
            .text()
            .await
            .map_err(|e| self.map_send_error(&e))?;

        if !status.is_success() {
            debug!(status = status.as_u16(), "Request rejected");
            return Err(PtvError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        let body: Value =
            serde_json::from_str(&text).map_err(|e| PtvError::MalformedResponse(e.to_string()))?;

        debug!(status = status.as_u16(), "Response received");
        Ok(RawResponse {
            url,
            status_code: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(params: ParameterSet) -> SignedRequest {
        SignedRequest {
            url: Url::parse("https://timetableapi.ptv.vic.gov.au/v3/route_types").unwrap(),
            path: "/v3/route_types".to_string(),
            params,
            signature: "abc123".to_string(),
        }
    }

    #[test]
    fn test_query_string_appends_signature_last() {
        let req = request(ParameterSet::new().with("route_name", "96").with("devid", "1234"));
        assert_eq!(req.query_string(), "route_name=96&devid=1234&signature=abc123");
    }

    #[test]
    fn test_query_string_without_params() {
        let req = request(ParameterSet::new());
        assert_eq!(req.query_string(), "signature=abc123");
    }

    #[test]
    fn test_transport_builds_without_timeout() {
        let config = PtvConfig::default();
        let transport = ReqwestTransport::new(&config).unwrap();
        assert_eq!(transport.timeout_secs, None);
    }

    #[test]
    fn test_transport_builds_with_timeout() {
        let config = PtvConfig::for_testing();
        let transport = ReqwestTransport::new(&config).unwrap();
        assert_eq!(transport.timeout_secs, Some(5));
    }
}
