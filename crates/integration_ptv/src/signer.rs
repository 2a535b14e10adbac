//! HMAC-SHA1 request signing
//!
//! The signature covers `"{path}?{canonical query}"` where `path` is the
//! version-qualified path (`/v3/routes`) and the query already includes
//! `devid`. The resulting hex digest is appended as `signature`.

use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::error::PtvError;

type HmacSha1 = Hmac<Sha1>;

/// Normalize a raw resource path to a single leading slash and no trailing slash
///
/// # Errors
///
/// Returns `PtvError::InvalidPath` if nothing is left after trimming, or if
/// the path contains an empty segment, a query or a fragment.
pub fn normalize_path(raw: &str) -> Result<String, PtvError> {
    let trimmed = raw.trim().trim_matches('/').trim();
    if trimmed.is_empty()
        || trimmed.split('/').any(str::is_empty)
        || trimmed.contains(['?', '#'])
        || trimmed.chars().any(char::is_whitespace)
    {
        return Err(PtvError::InvalidPath(raw.to_string()));
    }
    Ok(format!("/{trimmed}"))
}

/// The exact message that gets signed
#[must_use]
pub fn string_to_sign(path: &str, canonical_params: &str) -> String {
    format!("{path}?{canonical_params}")
}

/// Sign a path and its canonical parameters, returning the lowercase hex digest
///
/// # Errors
///
/// Returns `PtvError::Signing` if the secret is empty.
pub fn sign(path: &str, canonical_params: &str, secret: &[u8]) -> Result<String, PtvError> {
    if secret.is_empty() {
        return Err(PtvError::Signing("API key is empty".to_string()));
    }

    let mut mac =
        HmacSha1::new_from_slice(secret).map_err(|e| PtvError::Signing(e.to_string()))?;
    mac.update(string_to_sign(path, canonical_params).as_bytes());

    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_known_vector() {
        let signature = sign("/v3/route_types", "devid=1234", b"mysecret").unwrap();
        assert_eq!(signature, "a14f0af26c47c5fcdcc8d0522f55a0d041b99123");
    }

    #[test]
    fn test_sign_multi_value_vector() {
        let signature = sign("/v3/routes", "route_types=0%0A1&devid=1234", b"mysecret").unwrap();
        assert_eq!(signature, "d4a68b3b0efa5a7dd6afc9411584350f4395c517");
    }

    #[test]
    fn test_sign_is_lowercase_hex() {
        let signature = sign("/v2/healthcheck", "devid=1234", b"mysecret").unwrap();
        assert_eq!(signature.len(), 40);
        assert!(
            signature
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        );
    }

    #[test]
    fn test_sign_empty_secret() {
        let result = sign("/v3/route_types", "devid=1234", b"");
        assert!(matches!(result, Err(PtvError::Signing(_))));
    }

    #[test]
    fn test_sign_depends_on_path() {
        let a = sign("/v3/routes", "devid=1234", b"mysecret").unwrap();
        let b = sign("/v3/routes/1", "devid=1234", b"mysecret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("route_types").unwrap(), "/route_types");
        assert_eq!(normalize_path(" /v3/routes/").unwrap(), "/v3/routes");
        assert_eq!(normalize_path("//v3/routes//").unwrap(), "/v3/routes");
    }

    #[test]
    fn test_normalize_path_rejects_malformed() {
        assert!(matches!(normalize_path(""), Err(PtvError::InvalidPath(_))));
        assert!(matches!(normalize_path(" / "), Err(PtvError::InvalidPath(_))));
        assert!(normalize_path("v3//routes").is_err());
        assert!(normalize_path("v3/routes?x=1").is_err());
        assert!(normalize_path("v3/route types").is_err());
    }

    #[test]
    fn test_string_to_sign() {
        assert_eq!(
            string_to_sign("/v3/route_types", "devid=1234"),
            "/v3/route_types?devid=1234"
        );
        assert_eq!(string_to_sign("/v2/healthcheck", ""), "/v2/healthcheck?");
    }
}
