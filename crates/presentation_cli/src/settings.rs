//! Layered client configuration
//!
//! Precedence, lowest to highest: built-in defaults, the optional config
//! file, `PTV_*` environment variables, command-line flags.

use integration_ptv::PtvConfig;

/// Default config file name, looked up without extension (`ptv.toml`, ...)
pub const DEFAULT_CONFIG_FILE: &str = "ptv";

/// Values given on the command line; `None` leaves lower layers in place
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub user_id: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
    pub strict_status: bool,
}

/// Load the client configuration from the file, the process environment
/// and the command line
pub fn load(config_file: &str, overrides: Overrides) -> Result<PtvConfig, config::ConfigError> {
    load_from(config_file, overrides, None)
}

/// Load the client configuration, reading `PTV_*` variables from `env`
/// instead of the process environment when given
///
/// A missing config file is not an error. Nested keys are not used, so
/// `PTV_USER_ID` maps to `user_id` and `PTV_TIMEOUT_SECS` to `timeout_secs`.
/// Environment values stay strings; credentials such as `0012345` keep
/// their leading zeros.
fn load_from(
    config_file: &str,
    overrides: Overrides,
    env: Option<config::Map<String, String>>,
) -> Result<PtvConfig, config::ConfigError> {
    let mut builder = config::Config::builder()
        .add_source(config::File::with_name(config_file).required(false))
        .add_source(
            config::Environment::with_prefix("PTV")
                .prefix_separator("_")
                .separator("__")
                .source(env),
        )
        .set_override_option("base_url", overrides.base_url)?
        .set_override_option("user_id", overrides.user_id)?
        .set_override_option("api_key", overrides.api_key)?
        .set_override_option("timeout_secs", overrides.timeout_secs)?;

    if overrides.strict_status {
        builder = builder.set_override("strict_status", true)?;
    }

    builder.build()?.try_deserialize()
}
