//! Configuration loading, validation and env substitution.
//!
//! Config files: `warden.toml`, `warden.yaml`, `warden.yml` or `warden.json`,
//! searched in `./` then `~/.config/warden/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution in the raw
//! file before parsing.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{
        apply_env_overrides, clear_data_dir, config_dir, data_dir,
        discover_and_load, find_config_file, find_or_default_config_path, load_config,
        save_config, set_config_dir, set_data_dir,
    },
    schema::{
        AuthConfig, DatabaseConfig, ServerConfig, WardenConfig, WebhookSourceConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult},
};
