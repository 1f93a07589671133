//! Process-environment configuration loading for the `cli` binary.
//!
//! The engine crate (`weave`) never reads environment variables itself; it
//! is constructed from explicit config structs. This crate is the one place
//! that bridges an XDG config file and a project `.env` file into the
//! process environment, with precedence `existing env > .env > XDG`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not determine XDG config path for {0}")]
    XdgPath(String),
    #[error("failed to read XDG config file: {0}")]
    XdgRead(#[source] std::io::Error),
    #[error("failed to parse XDG config toml: {0}")]
    XdgParse(#[from] toml::de::Error),
    #[error("failed to read .env file: {0}")]
    DotenvRead(#[source] std::io::Error),
}

#[derive(Debug, Deserialize, Default)]
struct XdgConfig {
    #[serde(default)]
    env: HashMap<String, String>,
}

/// Merges an XDG `config.toml` `[env]` table and a project `.env` file into
/// the current process environment.
///
/// Precedence (highest wins): variables already set in the process
/// environment, then `.env`, then the XDG config file. Missing files are
/// not an error; only malformed ones are.
pub fn load_and_apply(app_name: &str, override_dir: Option<&Path>) -> Result<(), LoadError> {
    let xdg_vars = load_xdg_env(app_name, override_dir)?;
    let dotenv_vars = load_dotenv_vars(override_dir)?;

    for (key, value) in xdg_vars {
        apply_if_absent(&key, &value);
    }
    for (key, value) in dotenv_vars {
        apply_if_absent(&key, &value);
    }
    Ok(())
}

fn apply_if_absent(key: &str, value: &str) {
    if std::env::var_os(key).is_none() {
        std::env::set_var(key, value);
    } else {
        // existing env always wins; nothing to do
    }
}

fn xdg_config_path(app_name: &str, override_dir: Option<&Path>) -> Result<PathBuf, LoadError> {
    if let Some(dir) = override_dir {
        return Ok(dir.join("config.toml"));
    }
    let base = dirs::config_dir().ok_or_else(|| LoadError::XdgPath(app_name.to_string()))?;
    Ok(base.join(app_name).join("config.toml"))
}

fn load_xdg_env(
    app_name: &str,
    override_dir: Option<&Path>,
) -> Result<HashMap<String, String>, LoadError> {
    let path = xdg_config_path(app_name, override_dir)?;
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let contents = std::fs::read_to_string(&path).map_err(LoadError::XdgRead)?;
    let parsed: XdgConfig = toml::from_str(&contents)?;
    Ok(parsed.env)
}

fn load_dotenv_vars(override_dir: Option<&Path>) -> Result<HashMap<String, String>, LoadError> {
    let path = override_dir
        .map(|d| d.join(".env"))
        .unwrap_or_else(|| PathBuf::from(".env"));
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let contents = std::fs::read_to_string(&path).map_err(LoadError::DotenvRead)?;
    let mut vars = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            vars.insert(key.trim().to_string(), value.trim().trim_matches('"').to_string());
        }
    }
    Ok(vars)
}
