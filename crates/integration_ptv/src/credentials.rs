//! API credentials
//!
//! The developer id is sent in the clear as `devid`; the API key only ever
//! leaves this type as HMAC key material. It is wrapped in `SecretString` so
//! it never shows up in `Debug` output or logs.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

use crate::error::PtvError;

/// Environment variable holding the developer id
pub const USER_ID_ENV: &str = "PTV_USER_ID";

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "PTV_API_KEY";

/// Developer id and API key used to sign every request
#[derive(Clone)]
pub struct Credentials {
    user_id: String,
    api_key: SecretString,
}

impl Credentials {
    /// Create credentials from explicit values
    ///
    /// # Errors
    ///
    /// Returns `PtvError::MissingCredentials` if either value is empty.
    pub fn new(user_id: impl Into<String>, api_key: impl Into<String>) -> Result<Self, PtvError> {
        let user_id = user_id.into();
        let api_key = api_key.into();

        if user_id.trim().is_empty() {
            return Err(PtvError::MissingCredentials(format!(
                "user id is empty (set {USER_ID_ENV})"
            )));
        }
        if api_key.trim().is_empty() {
            return Err(PtvError::MissingCredentials(format!(
                "API key is empty (set {API_KEY_ENV})"
            )));
        }

        Ok(Self {
            user_id,
            api_key: SecretString::from(api_key),
        })
    }

    /// Resolve credentials, falling back to `PTV_USER_ID` / `PTV_API_KEY`
    /// for any value not given explicitly
    ///
    /// This is the only place the environment is consulted.
    ///
    /// # Errors
    ///
    /// Returns `PtvError::MissingCredentials` if a value is neither given
    /// nor set in the environment.
    pub fn resolve(user_id: Option<String>, api_key: Option<String>) -> Result<Self, PtvError> {
        Self::resolve_with(user_id, api_key, |name| std::env::var(name).ok())
    }

    /// Resolve credentials against an arbitrary variable lookup
    ///
    /// Explicit values win over the lookup; empty strings count as absent.
    ///
    /// # Errors
    ///
    /// Returns `PtvError::MissingCredentials` if a value cannot be found.
    pub fn resolve_with<F>(
        user_id: Option<String>,
        api_key: Option<String>,
        lookup: F,
    ) -> Result<Self, PtvError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let user_id = non_empty(user_id)
            .or_else(|| non_empty(lookup(USER_ID_ENV)))
            .ok_or_else(|| {
                PtvError::MissingCredentials(format!(
                    "no user id given and {USER_ID_ENV} is not set"
                ))
            })?;

        let api_key = non_empty(api_key)
            .or_else(|| non_empty(lookup(API_KEY_ENV)))
            .ok_or_else(|| {
                PtvError::MissingCredentials(format!(
                    "no API key given and {API_KEY_ENV} is not set"
                ))
            })?;

        Self::new(user_id, api_key)
    }

    /// The developer id (safe to log)
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Expose the API key for signing
    ///
    /// Never log or display the return value.
    pub(crate) fn expose_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_id", &self.user_id)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
