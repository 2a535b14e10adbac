//! v3 endpoint surface
//!
//! Each method formats its path and parameters and hands off to the shared
//! [`RequestPipeline`]. Methods that return several payload fields name the
//! one they want explicitly.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, instrument};

use crate::config::PtvConfig;
use crate::envelope::FullOutput;
use crate::error::PtvError;
use crate::models::{Route, RouteType};
use crate::params::{ParamValue, ParameterSet};
use crate::pipeline::{ApiRequest, RequestPipeline};

/// Client for the v3 Timetable API
#[derive(Debug, Clone)]
pub struct ClientV3 {
    pipeline: RequestPipeline,
}

impl ClientV3 {
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

    /// The underlying pipeline
    #[must_use]
    pub const fn pipeline(&self) -> &RequestPipeline {
        &self.pipeline
    }

    /// Run an arbitrary v3 request
    ///
    /// # Errors
    ///
    /// See [`RequestPipeline::execute`].
    pub async fn call(&self, request: ApiRequest) -> Result<Value, PtvError> {
        self.pipeline.execute(request).await
    }

    /// Run an arbitrary v3 request, keeping status and raw response
    ///
    /// # Errors
    ///
    /// See [`RequestPipeline::execute_full`].
    pub async fn call_full(&self, request: ApiRequest) -> Result<FullOutput, PtvError> {
        self.pipeline.execute_full(request).await
    }

    async fn call_typed<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, PtvError> {
        let value = self.call(request).await?;
        serde_json::from_value(value).map_err(|e| PtvError::MalformedResponse(e.to_string()))
    }

    /// Route types keyed by their numeric code
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the listing cannot be decoded.
    #[instrument(skip(self))]
    pub async fn route_types(&self) -> Result<BTreeMap<u32, String>, PtvError> {
        let types: Vec<RouteType> = self.call_typed(Self::route_types_request()).await?;

        Ok(types
            .into_iter()
            .map(|t| (t.route_type, t.route_type_name))
            .collect())
    }

    /// Routes, optionally filtered by (partial) name and by route types
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    #[instrument(skip(self))]
    pub async fn routes(
        &self,
        route_name: Option<&str>,
        route_types: &[u32],
    ) -> Result<Value, PtvError> {
        self.call(Self::routes_request(route_name, route_types))
            .await
    }

    /// A single route
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the route cannot be decoded.
    #[instrument(skip(self))]
    pub async fn route(&self, route_id: u64) -> Result<Route, PtvError> {
        self.call_typed(Self::route_request(route_id)).await
    }

    /// Several routes, fetched concurrently
    ///
    /// Results come back in the order of `route_ids`. The first failure
    /// aborts the remaining lookups and is returned; no partial list is
    /// produced.
    ///
    /// # Errors
    ///
    /// Returns the first lookup error.
    #[instrument(skip(self))]
    pub async fn routes_by_id(&self, route_ids: &[u64]) -> Result<Vec<Route>, PtvError> {
        self.fan_out(route_ids, |client, route_id| async move {
            client.route(route_id).await
        })
        .await
    }

    /// Several routes with status and raw response, fetched concurrently
    ///
    /// Same ordering and failure rules as [`Self::routes_by_id`].
    ///
    /// # Errors
    ///
    /// Returns the first lookup error.
    #[instrument(skip(self))]
    pub async fn routes_by_id_full(&self, route_ids: &[u64]) -> Result<Vec<FullOutput>, PtvError> {
        self.fan_out(route_ids, |client, route_id| async move {
            client.call_full(Self::route_request(route_id)).await
        })
        .await
    }

    async fn fan_out<T, F, Fut>(&self, route_ids: &[u64], lookup: F) -> Result<Vec<T>, PtvError>
    where
        T: Send + 'static,
        F: Fn(Self, u64) -> Fut,
        Fut: Future<Output = Result<T, PtvError>> + Send + 'static,
    {
        let mut tasks = JoinSet::new();
        for (index, &route_id) in route_ids.iter().enumerate() {
            let lookup = lookup(self.clone(), route_id);
            tasks.spawn(async move { (index, lookup.await) });
        }

        let mut results: Vec<Option<T>> = route_ids.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            let (index, result) = joined.map_err(|e| PtvError::TaskFailed(e.to_string()))?;
            results[index] = Some(result?);
        }

        debug!(count = results.len(), "Fetched routes concurrently");
        Ok(results.into_iter().flatten().collect())
    }

    /// Route type of a route, looked up only when not given
    ///
    /// # Errors
    ///
    /// Returns an error if the route lookup fails.
    pub async fn resolve_route_type(
        &self,
        route_id: u64,
        route_type: Option<u32>,
    ) -> Result<u32, PtvError> {
        match route_type {
            Some(route_type) => Ok(route_type),
            None => Ok(self.route(route_id).await?.route_type),
        }
    }

    /// Stops on a route
    ///
    /// Without a route type, the route is looked up first and its own route
    /// type is used.
    ///
    /// # Errors
    ///
    /// Returns an error if either call fails.
    #[instrument(skip(self))]
    pub async fn stops_on_route(
        &self,
        route_id: u64,
        route_type: Option<u32>,
    ) -> Result<Value, PtvError> {
        let route_type = self.resolve_route_type(route_id, route_type).await?;
        self.call(Self::stops_on_route_request(route_id, route_type))
            .await
    }

    /// Departures from a stop, optionally limited to one route
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    #[instrument(skip(self))]
    pub async fn departures(
        &self,
        route_type: u32,
        stop_id: u64,
        route_id: Option<u64>,
    ) -> Result<Value, PtvError> {
        self.call(Self::departures_request(route_type, stop_id, route_id))
            .await
    }

    /// All runs (trips/services) on a route
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    #[instrument(skip(self))]
    pub async fn runs_on_route(&self, route_id: u64) -> Result<Value, PtvError> {
        self.call(Self::runs_on_route_request(route_id)).await
    }

    /// A run by id, optionally for one route type
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    #[instrument(skip(self))]
    pub async fn run(&self, run_id: u64, route_type: Option<u32>) -> Result<Value, PtvError> {
        self.call(Self::run_request(run_id, route_type)).await
    }

    /// Stopping pattern of a run
    ///
    /// The pattern payload carries departures alongside stops, routes and
    /// runs; the full output is returned so callers can reach all of them.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    #[instrument(skip(self))]
    pub async fn pattern(&self, run_id: u64, route_type: u32) -> Result<FullOutput, PtvError> {
        self.call_full(Self::pattern_request(run_id, route_type))
            .await
    }

    /// Directions of travel on a route
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    #[instrument(skip(self))]
    pub async fn directions_for_route(&self, route_id: u64) -> Result<Value, PtvError> {
        self.call(Self::directions_for_route_request(route_id))
            .await
    }

    /// Current disruptions, optionally filtered by route types
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    #[instrument(skip(self))]
    pub async fn disruptions(&self, route_types: &[u32]) -> Result<Value, PtvError> {
        self.call(Self::disruptions_request(route_types)).await
    }

    // Requests behind the endpoint methods, for callers that want the full
    // output of an endpoint via `call_full`.

    /// Request behind [`Self::route_types`]
    pub fn route_types_request() -> ApiRequest {
        ApiRequest::v3("route_types").with_result_key("route_types")
    }

    /// Request behind [`Self::routes`]
    pub fn routes_request(route_name: Option<&str>, route_types: &[u32]) -> ApiRequest {
        let params = route_types_filter(ParameterSet::new(), route_types)
            .with_opt("route_name", route_name);

        ApiRequest::v3("routes")
            .with_params(params)
            .with_result_key("routes")
    }

    /// Request behind [`Self::route`]
    pub fn route_request(route_id: u64) -> ApiRequest {
        ApiRequest::v3(format!("routes/{route_id}")).with_result_key("route")
    }

    /// Request behind [`Self::stops_on_route`] once the route type is known
    pub fn stops_on_route_request(route_id: u64, route_type: u32) -> ApiRequest {
        ApiRequest::v3(format!(
            "stops/route/{route_id}/route_type/{route_type}"
        ))
        .with_result_key("stops")
    }

    /// Request behind [`Self::departures`]
    pub fn departures_request(route_type: u32, stop_id: u64, route_id: Option<u64>) -> ApiRequest {
        let resource = match route_id {
            Some(route_id) => format!(
                "departures/route_type/{route_type}/stop/{stop_id}/route/{route_id}"
            ),
            None => format!("departures/route_type/{route_type}/stop/{stop_id}"),
        };

        ApiRequest::v3(resource).with_result_key("departures")
    }

    /// Request behind [`Self::runs_on_route`]
    pub fn runs_on_route_request(route_id: u64) -> ApiRequest {
        ApiRequest::v3(format!("runs/route/{route_id}")).with_result_key("runs")
    }

    /// Request behind [`Self::run`]
    pub fn run_request(run_id: u64, route_type: Option<u32>) -> ApiRequest {
        let resource = match route_type {
            Some(route_type) => format!("runs/{run_id}/route_type/{route_type}"),
            None => format!("runs/{run_id}"),
        };

        ApiRequest::v3(resource).with_result_key("runs")
    }

    /// Request behind [`Self::pattern`]
    pub fn pattern_request(run_id: u64, route_type: u32) -> ApiRequest {
        ApiRequest::v3(format!("pattern/run/{run_id}/route_type/{route_type}"))
            .with_result_key("departures")
    }

    /// Request behind [`Self::directions_for_route`]
    pub fn directions_for_route_request(route_id: u64) -> ApiRequest {
        ApiRequest::v3(format!("directions/route/{route_id}")).with_result_key("directions")
    }

    /// Request behind [`Self::disruptions`]
    pub fn disruptions_request(route_types: &[u32]) -> ApiRequest {
        ApiRequest::v3("disruptions")
            .with_params(route_types_filter(ParameterSet::new(), route_types))
            .with_result_key("disruptions")
    }
}

/// Add a `route_types` filter as one newline-joined parameter
fn route_types_filter(params: ParameterSet, route_types: &[u32]) -> ParameterSet {
    if route_types.is_empty() {
        params
    } else {
        params.with("route_types", ParamValue::multi(route_types))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::ResultSelector;

    #[test]
    fn test_route_types_filter_joins_values() {
        let params = route_types_filter(ParameterSet::new(), &[0, 1]);
        assert_eq!(params.to_query_string(), "route_types=0%0A1");
    }

    #[test]
    fn test_route_types_filter_single_value() {
        let params = route_types_filter(ParameterSet::new(), &[2]);
        assert_eq!(params.to_query_string(), "route_types=2");
    }

    #[test]
    fn test_endpoint_requests() {
        let request = ClientV3::departures_request(0, 1071, Some(15));
        assert_eq!(request.resource, "departures/route_type/0/stop/1071/route/15");
        assert_eq!(request.selector, ResultSelector::key("departures"));

        let request = ClientV3::run_request(955, None);
        assert_eq!(request.resource, "runs/955");

        let request = ClientV3::routes_request(Some("Upfield"), &[0, 1]);
        assert_eq!(
            request.params.to_query_string(),
            "route_types=0%0A1&route_name=Upfield"
        );
    }

    #[test]
    fn test_route_types_filter_empty() {
        let params = route_types_filter(ParameterSet::new(), &[]);
        assert!(params.is_empty());
    }
}
