//! Configuration loading, env substitution and validation.
//!
//! Config files: `onebridge.toml`, `onebridge.yaml`, `onebridge.yml` or
//! `onebridge.json`, searched in `./` then the user config directory
//! (`~/.config/onebridge/` on Linux).
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{config_dir, discover_and_load, find_config_file, load_config},
    schema::{BotConfig, BridgeConfig, WsProtocol},
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
