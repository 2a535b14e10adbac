//! Versioned endpoint resolution

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PtvError;
use crate::signer::normalize_path;

/// Version of the PTV Timetable API a request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    /// Legacy v2 API (lines, modes, broad/specific next departures)
    V2,
    /// Current v3 API (routes, stops, departures, runs, patterns)
    V3,
}

impl ApiVersion {
    /// Path segment under which this version's resources live
    #[must_use]
    pub const fn segment(self) -> &'static str {
        match self {
            Self::V2 => "v2",
            Self::V3 => "v3",
        }
    }

    /// Build the version-qualified path for a bare resource path
    ///
    /// `route_types` becomes `/v3/route_types`. The result has one leading
    /// slash and no trailing slash; it is the path that gets signed.
    ///
    /// # Errors
    ///
    /// Returns `PtvError::InvalidPath` if the resource path is empty or
    /// malformed.
    pub fn resolve(self, resource: &str) -> Result<String, PtvError> {
        let resource = normalize_path(resource)?;
        Ok(format!("/{}{resource}", self.segment()))
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_v3() {
        assert_eq!(
            ApiVersion::V3.resolve("route_types").unwrap(),
            "/v3/route_types"
        );
        assert_eq!(
            ApiVersion::V3.resolve("/routes/1/").unwrap(),
            "/v3/routes/1"
        );
    }

    #[test]
    fn test_resolve_v2() {
        assert_eq!(
            ApiVersion::V2.resolve("healthcheck").unwrap(),
            "/v2/healthcheck"
        );
        assert_eq!(
            ApiVersion::V2.resolve("lines/mode/1").unwrap(),
            "/v2/lines/mode/1"
        );
    }

    #[test]
    fn test_resolve_empty_resource() {
        assert!(ApiVersion::V3.resolve("  ").is_err());
        assert!(ApiVersion::V2.resolve("/").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(ApiVersion::V2.to_string(), "v2");
        assert_eq!(ApiVersion::V3.to_string(), "v3");
    }
}
