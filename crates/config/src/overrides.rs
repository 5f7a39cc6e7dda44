//! Environment variable overrides, applied on top of the loaded file.

use tracing::warn;

use crate::schema::NexusConfig;

pub const ENV_HOST: &str = "NEXUS_HOST";
pub const ENV_PORT: &str = "NEXUS_PORT";
pub const ENV_TOKEN: &str = "NEXUS_TOKEN";
pub const ENV_URL: &str = "NEXUS_URL";
pub const ENV_DOWNSTREAM: &str = "INTERFACE_TARGET";
pub const ENV_INTERFACE_ID: &str = "INTERFACE_ID";
pub const ENV_TICK_MS: &str = "GRID_TICK_MS";
pub const ENV_SEED: &str = "GRID_SEED";
pub const ENV_API_KEY: &str = "OPENROUTER_API_KEY";

/// Apply overrides read through `lookup`. Unparseable numeric values are
/// logged and ignored.
pub fn apply_env_overrides(config: &mut NexusConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(host) = lookup(ENV_HOST) {
        config.gateway.bind = host;
    }
    if let Some(port) = parsed(&lookup, ENV_PORT) {
        config.gateway.port = port;
    }
    if let Some(token) = lookup(ENV_TOKEN) {
        config.gateway.token = Some(token);
    }
    if let Some(target) = parsed(&lookup, ENV_DOWNSTREAM) {
        config.gateway.downstream = target;
    }
    if let Some(url) = lookup(ENV_URL) {
        config.ticker.url = url.clone();
        config.interface.url = url;
    }
    if let Some(id) = lookup(ENV_INTERFACE_ID) {
        config.interface.id = id;
    }
    if let Some(ms) = parsed(&lookup, ENV_TICK_MS) {
        config.ticker.interval_ms = ms;
    }
    if let Some(seed) = parsed(&lookup, ENV_SEED) {
        config.ticker.seed = Some(seed);
    }
    if let Some(key) = lookup(ENV_API_KEY) {
        config.chat.api_key = Some(key);
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(var = name, value = %raw, error = %e, "ignoring invalid environment override");
            None
        },
    }
}
