//! v2 endpoint surface
//!
//! The legacy API organises data by mode and line rather than by route.
//! Several of its endpoints answer without a status envelope; those come
//! back as a missing status, not as an error.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use tracing::instrument;

use crate::config::PtvConfig;
use crate::envelope::FullOutput;
use crate::error::PtvError;
use crate::params::ParameterSet;
use crate::pipeline::{ApiRequest, RequestPipeline};

/// Client for the v2 Timetable API
#[derive(Debug, Clone)]
pub struct ClientV2 {
    pipeline: RequestPipeline,
}

impl ClientV2 {
    /// Create a client on top of a shared pipeline
    #[must_use]
    pub const fn new(pipeline: RequestPipeline) -> Self {
        Self { pipeline }
    }

    /// Create a client with its own pipeline
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or credentials are
    /// missing.
    pub fn from_config(config: &PtvConfig) -> Result<Self, PtvError> {
        Ok(Self::new(RequestPipeline::new(config)?))
    }

    /// Run an arbitrary v2 request, keeping status and raw response
    ///
    /// # Errors
    ///
    /// See [`RequestPipeline::execute_full`].
    pub async fn call_full(&self, request: ApiRequest) -> Result<FullOutput, PtvError> {
        self.pipeline.execute_full(request).await
    }

    /// Health of the remote API (token, clock, cache and database flags)
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    #[instrument(skip(self))]
    pub async fn healthcheck(&self, at: Option<DateTime<Utc>>) -> Result<Value, PtvError> {
        self.pipeline.execute(Self::healthcheck_request(at)).await
    }

    /// Lines of a mode, optionally filtered by (partial) line name
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    #[instrument(skip(self))]
    pub async fn lines_by_mode(
        &self,
        route_type: u32,
        name: Option<&str>,
    ) -> Result<Value, PtvError> {
        self.pipeline
            .execute(Self::lines_by_mode_request(route_type, name))
            .await
    }

    /// Stops served by a line
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    #[instrument(skip(self))]
    pub async fn stops_on_line(&self, route_type: u32, line_id: u64) -> Result<Value, PtvError> {
        self.pipeline
            .execute(Self::stops_on_line_request(route_type, line_id))
            .await
    }

    /// Next departures of one line from one stop in one direction
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    #[instrument(skip(self))]
    pub async fn specific_next_departures(
        &self,
        route_type: u32,
        line_id: u64,
        stop_id: u64,
        direction_id: u64,
        limit: u32,
        for_utc: Option<DateTime<Utc>>,
    ) -> Result<Value, PtvError> {
        self.pipeline
            .execute(Self::specific_next_departures_request(
                route_type,
                line_id,
                stop_id,
                direction_id,
                limit,
                for_utc,
            ))
            .await
    }

    /// Next departures from a stop across all lines, grouped by destination
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    #[instrument(skip(self))]
    pub async fn broad_next_departures(
        &self,
        route_type: u32,
        stop_id: u64,
        limit: u32,
    ) -> Result<Value, PtvError> {
        self.pipeline
            .execute(Self::broad_next_departures_request(route_type, stop_id, limit))
            .await
    }

    /// Request behind [`Self::healthcheck`]
    pub fn healthcheck_request(at: Option<DateTime<Utc>>) -> ApiRequest {
        ApiRequest::v2("healthcheck")
            .with_params(ParameterSet::new().with_opt("timestamp", at.map(utc_param)))
            .whole_payload()
    }

    /// Request behind [`Self::lines_by_mode`]
    pub fn lines_by_mode_request(route_type: u32, name: Option<&str>) -> ApiRequest {
        ApiRequest::v2(format!("lines/mode/{route_type}"))
            .with_params(ParameterSet::new().with_opt("name", name))
            .whole_payload()
    }

    /// Request behind [`Self::stops_on_line`]
    pub fn stops_on_line_request(route_type: u32, line_id: u64) -> ApiRequest {
        ApiRequest::v2(format!(
            "mode/{route_type}/line/{line_id}/stops-for-line"
        ))
        .whole_payload()
    }

    /// Request behind [`Self::specific_next_departures`]
    pub fn specific_next_departures_request(
        route_type: u32,
        line_id: u64,
        stop_id: u64,
        direction_id: u64,
        limit: u32,
        for_utc: Option<DateTime<Utc>>,
    ) -> ApiRequest {
        ApiRequest::v2(format!(
            "mode/{route_type}/line/{line_id}/stop/{stop_id}/directionid/{direction_id}/all/limit/{limit}"
        ))
        .with_params(ParameterSet::new().with_opt("for_utc", for_utc.map(utc_param)))
        .with_result_key("values")
    }

    /// Request behind [`Self::broad_next_departures`]
    pub fn broad_next_departures_request(route_type: u32, stop_id: u64, limit: u32) -> ApiRequest {
        ApiRequest::v2(format!(
            "mode/{route_type}/stop/{stop_id}/departures/by-destination/limit/{limit}"
        ))
        .with_result_key("values")
    }
}

fn utc_param(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
