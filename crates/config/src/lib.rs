//! Configuration loading for the switchboard gateway.
//!
//! Config file: `switchboard.toml`, searched in `./` then
//! `~/.config/switchboard/`.

pub mod loader;
pub mod schema;

pub use {
    loader::{config_dir, discover_and_load, load_config},
    schema::{
        AutoReplyConfig, BootAgent, BootChannel, ServerConfig, StoreConfig, SwitchboardConfig,
    },
};
