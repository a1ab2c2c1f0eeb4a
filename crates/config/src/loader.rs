use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use {
    secrecy::Secret,
    tracing::{debug, warn},
    warden_common::{Error, Result},
};

use crate::{env_subst::substitute_env, schema::WardenConfig};

warden_common::impl_context!();

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["warden.toml", "warden.yaml", "warden.yml", "warden.json"];

static CONFIG_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);
static DATA_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Override the config directory for this process (`--config-dir`).
pub fn set_config_dir(dir: PathBuf) {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|e| e.into_inner()) = Some(dir);
}

/// Override the data directory for this process (`--data-dir`).
pub fn set_data_dir(dir: PathBuf) {
    *DATA_DIR_OVERRIDE.lock().unwrap_or_else(|e| e.into_inner()) = Some(dir);
}

pub fn clear_data_dir() {
    *DATA_DIR_OVERRIDE.lock().unwrap_or_else(|e| e.into_inner()) = None;
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<WardenConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply env overrides.
///
/// Search order:
/// 1. `./warden.{toml,yaml,yml,json}` (project-local)
/// 2. `<config_dir>/warden.{toml,yaml,yml,json}`
///
/// Falls back to `WardenConfig::default()` if no file is found or it fails
/// to parse.
pub fn discover_and_load() -> WardenConfig {
    let config = if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                WardenConfig::default()
            },
        }
    } else {
        debug!("no config file found, using defaults");
        WardenConfig::default()
    };
    apply_env_overrides(config)
}

/// Apply `WARDEN_TOKEN_SECRET` and `WARDEN_DATABASE_URL` on top of a loaded config.
pub fn apply_env_overrides(config: WardenConfig) -> WardenConfig {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

fn apply_env_overrides_with(
    mut config: WardenConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> WardenConfig {
    if let Some(secret) = lookup("WARDEN_TOKEN_SECRET").filter(|s| !s.is_empty()) {
        config.auth.token_secret = Some(Secret::new(secret));
    }
    if let Some(url) = lookup("WARDEN_DATABASE_URL").filter(|s| !s.is_empty()) {
        config.database.url = Some(url);
    }
    config
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the config directory.
///
/// Resolution order: [`set_config_dir`], `WARDEN_CONFIG_DIR`, `~/.config/warden/`.
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
    {
        return Some(dir);
    }
    if let Some(dir) = std::env::var_os("WARDEN_CONFIG_DIR") {
        return Some(PathBuf::from(dir));
    }
    directories::ProjectDirs::from("", "", "warden").map(|d| d.config_dir().to_path_buf())
}

/// Returns the data directory holding `warden.db`.
///
/// Resolution order: [`set_data_dir`], `WARDEN_DATA_DIR`, the platform data dir.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = DATA_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
    {
        return dir;
    }
    if let Some(dir) = std::env::var_os("WARDEN_DATA_DIR") {
        return PathBuf::from(dir);
    }
    directories::ProjectDirs::from("", "", "warden")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".warden"))
}

/// Returns the path of an existing config file, or the default TOML path.
pub fn find_or_default_config_path() -> PathBuf {
    if let Some(path) = find_config_file() {
        return path;
    }
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("warden.toml")
}

/// Serialize `config` to TOML and write it to the discovered config path.
///
/// Creates parent directories if needed. Returns the path written to.
pub fn save_config(config: &WardenConfig) -> Result<PathBuf> {
    let path = find_or_default_config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(config).map_err(|e| Error::parse("toml", e))?;
    std::fs::write(&path, toml_str)?;
    debug!(path = %path.display(), "saved config");
    Ok(path)
}

pub(crate) fn parse_config(raw: &str, path: &Path) -> Result<WardenConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| Error::parse("toml", e)),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| Error::parse("yaml", e)),
        "json" => serde_json::from_str(raw).map_err(|e| Error::parse("json", e)),
        _ => Err(Error::message(format!("unsupported config format: .{ext}"))),
    }
}
