//! Public Transport Victoria Timetable API client
//!
//! Every request to the [PTV Timetable API](https://timetableapi.ptv.vic.gov.au)
//! carries the developer id (`devid`) and an HMAC-SHA1 `signature` computed
//! over the versioned path and its query string. This crate builds, signs,
//! dispatches and unwraps those requests in one place.
//!
//! # Architecture
//!
//! [`RequestPipeline`] holds the credentials and the transport. It runs each
//! call as build, sign, dispatch, unwrap. [`ClientV3`] and [`ClientV2`] are
//! thin endpoint surfaces sharing one pipeline; [`SignedTransport`] is the
//! seam to the network, implemented by [`ReqwestTransport`].
//!
//! # Example
//!
//! ```rust,ignore
//! use integration_ptv::{ClientV3, PtvConfig};
//!
//! let config = PtvConfig::default(); // credentials from PTV_USER_ID / PTV_API_KEY
//! let client = ClientV3::from_config(&config)?;
//!
//! let route_types = client.route_types().await?;
//! let routes = client.routes(Some("Upfield"), &[0]).await?;
//! ```

mod config;
mod credentials;
mod endpoint;
mod envelope;
mod error;
mod models;
mod params;
mod pipeline;
mod signer;
mod transport;
mod v2;
mod v3;

pub use config::PtvConfig;
pub use credentials::{API_KEY_ENV, Credentials, USER_ID_ENV};
pub use endpoint::ApiVersion;
pub use envelope::{EnvelopeStatus, FullOutput, ResultSelector, unwrap_envelope, unwrap_full};
pub use error::PtvError;
pub use models::{Route, RouteKind, RouteType};
pub use params::{ParamValue, ParameterSet, canonicalize};
pub use pipeline::{ApiRequest, DEVID_PARAM, RequestPipeline, SIGNATURE_PARAM};
pub use signer::{normalize_path, sign, string_to_sign};
pub use transport::{RawResponse, ReqwestTransport, SignedRequest, SignedTransport};
pub use v2::ClientV2;
pub use v3::ClientV3;
