//! PTV client configuration

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::credentials::Credentials;
use crate::error::PtvError;

/// Configuration for the PTV Timetable API client
#[derive(Clone, Serialize, Deserialize)]
pub struct PtvConfig {
    /// Base URL for the Timetable API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds (`None` waits on the transport indefinitely)
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Fail calls whose response envelope has no `status` field instead of
    /// reporting the status as missing
    #[serde(default)]
    pub strict_status: bool,

    /// Developer id (falls back to `PTV_USER_ID`)
    #[serde(default)]
    pub user_id: Option<String>,

    /// API key (sensitive; falls back to `PTV_API_KEY`)
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,
}

fn default_base_url() -> String {
    "https://timetableapi.ptv.vic.gov.au".to_string()
}

fn default_user_agent() -> String {
    format!("ptv-client/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for PtvConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: None,
            user_agent: default_user_agent(),
            strict_status: false,
            user_id: None,
            api_key: None,
        }
    }
}

impl fmt::Debug for PtvConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PtvConfig")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("strict_status", &self.strict_status)
            .field("user_id", &self.user_id)
            .field(
                "api_key",
                &if self.api_key.is_some() {
                    Some("[REDACTED]")
                } else {
                    None
                },
            )
            .finish()
    }
}

impl PtvConfig {
    /// Create a configuration suitable for testing
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            timeout_secs: Some(5),
            user_id: Some("1234".to_string()),
            api_key: Some(SecretString::from("mysecret")),
            ..Default::default()
        }
    }

    /// Parse the base URL
    ///
    /// # Errors
    ///
    /// Returns `PtvError::Configuration` if the URL is not an absolute
    /// http(s) URL.
    pub fn parsed_base_url(&self) -> Result<Url, PtvError> {
        let url = Url::parse(self.base_url.trim_end_matches('/'))
            .map_err(|e| PtvError::Configuration(format!("invalid base_url: {e}")))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(PtvError::Configuration(format!(
                "base_url must be http or https, got {}",
                url.scheme()
            )));
        }
        if url.query().is_some() {
            return Err(PtvError::Configuration(
                "base_url must not carry a query string".to_string(),
            ));
        }

        Ok(url)
    }

    /// Resolve credentials from this config, falling back to the environment
    ///
    /// # Errors
    ///
    /// Returns `PtvError::MissingCredentials` if either value is unavailable.
    pub fn credentials(&self) -> Result<Credentials, PtvError> {
        self.credentials_with(|name| std::env::var(name).ok())
    }

    /// Resolve credentials from this config against an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Returns `PtvError::MissingCredentials` if either value is unavailable.
    pub fn credentials_with<F>(&self, lookup: F) -> Result<Credentials, PtvError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Credentials::resolve_with(
            self.user_id.clone(),
            self.api_key
                .as_ref()
                .map(|key| key.expose_secret().to_string()),
            lookup,
        )
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.is_empty() {
            return Err("base_url must not be empty".to_string());
        }

        if let Err(e) = self.parsed_base_url() {
            return Err(e.to_string());
        }

        if self.timeout_secs == Some(0) {
            return Err("timeout_secs must be greater than 0".to_string());
        }

        if self.user_agent.trim().is_empty() {
            return Err("user_agent must not be empty".to_string());
        }

        Ok(())
    }
}
