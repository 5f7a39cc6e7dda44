//! Configuration: schema, file discovery (TOML/YAML/JSON), `${VAR}`
//! substitution and environment overrides.

pub mod env_subst;
pub mod loader;
pub mod overrides;
pub mod schema;

pub use {
    loader::{clear_config_dir, config_dir, discover_and_load, load_config, set_config_dir},
    overrides::apply_env_overrides,
    schema::{
        ChatConfig, DownstreamTarget, GatewayConfig, InterfaceConfig, NexusConfig, TickerConfig,
    },
};
