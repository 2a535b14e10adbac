//! PTV CLI
//!
//! Command-line front end for the PTV Timetable API client.

#![allow(clippy::print_stdout)]

mod settings;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use integration_ptv::{ApiRequest, ApiVersion, ClientV2, ClientV3, ParameterSet, RequestPipeline};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// PTV CLI
#[derive(Parser)]
#[command(name = "ptv-cli")]
#[command(author, version, about = "Public Transport Victoria timetable CLI", long_about = None)]
struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file (without extension)
    #[arg(short, long, default_value = settings::DEFAULT_CONFIG_FILE)]
    config: String,

    /// API base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Developer id
    #[arg(long)]
    user_id: Option<String>,

    /// API key
    #[arg(long)]
    api_key: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Fail when a response has no status envelope
    #[arg(long)]
    strict: bool,

    /// Print result, status and raw response instead of the result only
    #[arg(long, global = true)]
    full: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List route types
    RouteTypes,

    /// List routes
    Routes {
        /// Filter by (partial) route name
        #[arg(short, long)]
        name: Option<String>,

        /// Filter by route type (repeatable)
        #[arg(short = 't', long = "route-type")]
        route_types: Vec<u32>,
    },

    /// Show one or more routes
    ///
    /// Several ids are fetched concurrently.
    Route {
        /// Route ids
        #[arg(required = true)]
        route_ids: Vec<u64>,
    },

    /// List stops on a route
    Stops {
        /// Route id
        route_id: u64,

        /// Route type (looked up from the route when omitted)
        #[arg(short = 't', long)]
        route_type: Option<u32>,
    },

    /// Departures from a stop
    Departures {
        /// Route type
        route_type: u32,

        /// Stop id
        stop_id: u64,

        /// Limit to one route
        #[arg(short, long)]
        route: Option<u64>,
    },

    /// Runs on a route
    Runs {
        /// Route id
        route_id: u64,
    },

    /// Show a run
    Run {
        /// Run id
        run_id: u64,

        /// Route type
        #[arg(short = 't', long)]
        route_type: Option<u32>,
    },

    /// Stopping pattern of a run
    Pattern {
        /// Run id
        run_id: u64,

        /// Route type
        route_type: u32,
    },

    /// Directions of travel on a route
    Directions {
        /// Route id
        route_id: u64,
    },

    /// Current disruptions
    Disruptions {
        /// Filter by route type (repeatable)
        #[arg(short = 't', long = "route-type")]
        route_types: Vec<u32>,
    },

    /// Check API health (v2)
    Healthcheck {
        /// Client timestamp to report (RFC 3339)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Lines of a mode (v2)
    Lines {
        /// Route type
        route_type: u32,

        /// Filter by (partial) line name
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Stops on a line (v2)
    StopsOnLine {
        /// Route type
        route_type: u32,

        /// Line id
        line_id: u64,
    },

    /// Next departures of a line from a stop in one direction (v2)
    NextDepartures {
        /// Route type
        route_type: u32,

        /// Line id
        line_id: u64,

        /// Stop id
        stop_id: u64,

        /// Direction id
        direction_id: u64,

        /// Maximum number of departures
        #[arg(short, long, default_value = "5")]
        limit: u32,

        /// Departures from this time (RFC 3339)
        #[arg(long)]
        for_utc: Option<DateTime<Utc>>,
    },

    /// Next departures from a stop across all lines (v2)
    BroadDepartures {
        /// Route type
        route_type: u32,

        /// Stop id
        stop_id: u64,

        /// Maximum number of departures per destination
        #[arg(short, long, default_value = "5")]
        limit: u32,
    },

    /// Signed call to any resource
    ///
    /// Example: ptv-cli call v3 departures/route_type/0/stop/1071 -p max_results=3 -k departures
    Call {
        /// API version (v2 or v3)
        #[arg(value_parser = parse_version)]
        version: ApiVersion,

        /// Resource path, e.g. "route_types"
        resource: String,

        /// Query parameter as key=value (repeatable, order kept)
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Payload field to return when the response has several
        #[arg(short, long)]
        key: Option<String>,

        /// Return the whole payload
        #[arg(long, conflicts_with = "key")]
        payload: bool,
    },
}

/// Determine log filter level from verbosity count
const fn log_filter_from_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn parse_version(s: &str) -> Result<ApiVersion, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "v2" | "2" => Ok(ApiVersion::V2),
        "v3" | "3" => Ok(ApiVersion::V3),
        other => Err(format!("unknown API version '{other}' (expected v2 or v3)")),
    }
}

fn parse_param(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{s}'")),
    }
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn call_request(
    version: ApiVersion,
    resource: &str,
    params: &[(String, String)],
    key: Option<&str>,
    payload: bool,
) -> ApiRequest {
    let params: ParameterSet = params.iter().cloned().collect();
    let request = ApiRequest::new(version, resource).with_params(params);
    match key {
        Some(key) => request.with_result_key(key),
        None if payload => request.whole_payload(),
        None => request,
    }
}

/// The single request behind a subcommand
///
/// `None` when a lookup has to happen first: `route` with several ids and
/// `stops` without a route type.
fn single_request(command: &Commands) -> Option<ApiRequest> {
    let request = match command {
        Commands::RouteTypes => ClientV3::route_types_request(),
        Commands::Routes { name, route_types } => {
            ClientV3::routes_request(name.as_deref(), route_types)
        },
        Commands::Route { route_ids } => match route_ids[..] {
            [route_id] => ClientV3::route_request(route_id),
            _ => return None,
        },
        Commands::Stops {
            route_id,
            route_type,
        } => ClientV3::stops_on_route_request(*route_id, (*route_type)?),
        Commands::Departures {
            route_type,
            stop_id,
            route,
        } => ClientV3::departures_request(*route_type, *stop_id, *route),
        Commands::Runs { route_id } => ClientV3::runs_on_route_request(*route_id),
        Commands::Run { run_id, route_type } => ClientV3::run_request(*run_id, *route_type),
        Commands::Pattern { run_id, route_type } => {
            ClientV3::pattern_request(*run_id, *route_type)
        },
        Commands::Directions { route_id } => ClientV3::directions_for_route_request(*route_id),
        Commands::Disruptions { route_types } => ClientV3::disruptions_request(route_types),
        Commands::Healthcheck { at } => {
            ClientV2::healthcheck_request(Some(at.unwrap_or_else(Utc::now)))
        },
        Commands::Lines { route_type, name } => {
            ClientV2::lines_by_mode_request(*route_type, name.as_deref())
        },
        Commands::StopsOnLine {
            route_type,
            line_id,
        } => ClientV2::stops_on_line_request(*route_type, *line_id),
        Commands::NextDepartures {
            route_type,
            line_id,
            stop_id,
            direction_id,
            limit,
            for_utc,
        } => ClientV2::specific_next_departures_request(
            *route_type,
            *line_id,
            *stop_id,
            *direction_id,
            *limit,
            *for_utc,
        ),
        Commands::BroadDepartures {
            route_type,
            stop_id,
            limit,
        } => ClientV2::broad_next_departures_request(*route_type, *stop_id, *limit),
        Commands::Call {
            version,
            resource,
            params,
            key,
            payload,
        } => call_request(*version, resource, params, key.as_deref(), *payload),
    };
    Some(request)
}

/// Print result, envelope status and raw response of a subcommand
async fn run_full(
    pipeline: &RequestPipeline,
    v3: &ClientV3,
    command: Commands,
) -> anyhow::Result<()> {
    if let Some(request) = single_request(&command) {
        return print_json(&pipeline.execute_full(request).await?);
    }

    match command {
        Commands::Route { route_ids } => print_json(&v3.routes_by_id_full(&route_ids).await?),
        Commands::Stops {
            route_id,
            route_type,
        } => {
            let route_type = v3.resolve_route_type(route_id, route_type).await?;
            let request = ClientV3::stops_on_route_request(route_id, route_type);
            print_json(&pipeline.execute_full(request).await?)
        },
        _ => anyhow::bail!("subcommand has no request to run"),
    }
}

/// Print the result of a subcommand
#[allow(clippy::too_many_lines)]
async fn run(v3: &ClientV3, v2: &ClientV2, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::RouteTypes => print_json(&v3.route_types().await?),

        Commands::Routes { name, route_types } => {
            print_json(&v3.routes(name.as_deref(), &route_types).await?)
        },

        Commands::Route { route_ids } => {
            if let [route_id] = route_ids[..] {
                print_json(&v3.route(route_id).await?)
            } else {
                print_json(&v3.routes_by_id(&route_ids).await?)
            }
        },

        Commands::Stops {
            route_id,
            route_type,
        } => print_json(&v3.stops_on_route(route_id, route_type).await?),

        Commands::Departures {
            route_type,
            stop_id,
            route,
        } => print_json(&v3.departures(route_type, stop_id, route).await?),

        Commands::Runs { route_id } => print_json(&v3.runs_on_route(route_id).await?),

        Commands::Run { run_id, route_type } => print_json(&v3.run(run_id, route_type).await?),

        Commands::Pattern { run_id, route_type } => {
            print_json(&v3.pattern(run_id, route_type).await?.result)
        },

        Commands::Directions { route_id } => {
            print_json(&v3.directions_for_route(route_id).await?)
        },

        Commands::Disruptions { route_types } => print_json(&v3.disruptions(&route_types).await?),

        Commands::Healthcheck { at } => {
            print_json(&v2.healthcheck(Some(at.unwrap_or_else(Utc::now))).await?)
        },

        Commands::Lines { route_type, name } => {
            print_json(&v2.lines_by_mode(route_type, name.as_deref()).await?)
        },

        Commands::StopsOnLine {
            route_type,
            line_id,
        } => print_json(&v2.stops_on_line(route_type, line_id).await?),

        Commands::NextDepartures {
            route_type,
            line_id,
            stop_id,
            direction_id,
            limit,
            for_utc,
        } => {
            let departures = v2
                .specific_next_departures(
                    route_type,
                    line_id,
                    stop_id,
                    direction_id,
                    limit,
                    for_utc,
                )
                .await?;
            print_json(&departures)
        },

        Commands::BroadDepartures {
            route_type,
            stop_id,
            limit,
        } => print_json(&v2.broad_next_departures(route_type, stop_id, limit).await?),

        Commands::Call {
            version,
            resource,
            params,
            key,
            payload,
        } => {
            let request = call_request(version, &resource, &params, key.as_deref(), payload);
            print_json(&v3.call(request).await?)
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = log_filter_from_verbosity(cli.verbose);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let overrides = settings::Overrides {
        base_url: cli.base_url,
        user_id: cli.user_id,
        api_key: cli.api_key,
        timeout_secs: cli.timeout,
        strict_status: cli.strict,
    };
    let config = settings::load(&cli.config, overrides).context("Failed to load configuration")?;

    let pipeline = RequestPipeline::new(&config).context("Failed to set up PTV client")?;
    info!(user_id = pipeline.user_id(), base_url = %config.base_url, "PTV client ready");

    let v3 = ClientV3::new(pipeline.clone());

    if cli.full {
        run_full(&pipeline, &v3, cli.command).await
    } else {
        let v2 = ClientV2::new(pipeline);
        run(&v3, &v2, cli.command).await
    }
}
