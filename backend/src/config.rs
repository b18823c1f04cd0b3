//! Runtime configuration from the environment.
//!
//! A `.env` file in the working directory is loaded first. Every setting has a
//! default, so an empty environment is a valid configuration:
//!
//! | Variable | Default |
//! |---|---|
//! | `PRICEDEPOT_PORT` | `3000` |
//! | `PRICEDEPOT_LAYOUT` | `standard` (`auto`, a preset, `stored:<id>` or a `.json` path) |
//! | `PRICEDEPOT_LAYOUT_DIR` | `.pricedepot/layouts` |
//! | `PRICEDEPOT_RATES_FILE` | built-in table |
//! | `PRICEDEPOT_MAX_FILES` | `30` |
//! | `PRICEDEPOT_SEARCH_LIMIT` | `10` |

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::catalog::{DEFAULT_SEARCH_LIMIT, MAX_UPLOADED_FILES};
use crate::error::{ConfigError, ConfigResult};
use crate::normalize::{LayoutChoice, NormalizeOptions};
use crate::pricing::StaticRates;
use crate::registry::DEFAULT_REGISTRY_DIR;

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub layout: LayoutChoice,
    pub layout_dir: PathBuf,
    pub rates_file: Option<PathBuf>,
    pub max_files: usize,
    pub search_limit: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            layout: LayoutChoice::default(),
            layout_dir: PathBuf::from(DEFAULT_REGISTRY_DIR),
            rates_file: None,
            max_files: MAX_UPLOADED_FILES,
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl AppConfig {
    /// Load `.env` and read the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        // A missing .env file is fine
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let layout = match get("PRICEDEPOT_LAYOUT") {
            Some(value) => value.parse::<LayoutChoice>()?,
            None => defaults.layout,
        };

        let config = Self {
            port: parse_var("PRICEDEPOT_PORT", get("PRICEDEPOT_PORT"), defaults.port)?,
            layout,
            layout_dir: get("PRICEDEPOT_LAYOUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.layout_dir),
            rates_file: get("PRICEDEPOT_RATES_FILE").map(PathBuf::from),
            max_files: parse_var("PRICEDEPOT_MAX_FILES", get("PRICEDEPOT_MAX_FILES"), defaults.max_files)?,
            search_limit: parse_var(
                "PRICEDEPOT_SEARCH_LIMIT",
                get("PRICEDEPOT_SEARCH_LIMIT"),
                defaults.search_limit,
            )?,
        };

        if config.max_files == 0 {
            return Err(ConfigError::InvalidVar {
                key: "PRICEDEPOT_MAX_FILES".into(),
                value: "0".into(),
            });
        }
        Ok(config)
    }

    /// Rate table from `rates_file`, or the built-in one.
    pub fn load_rates(&self) -> ConfigResult<StaticRates> {
        match &self.rates_file {
            Some(path) => StaticRates::from_file(path),
            None => Ok(StaticRates::default()),
        }
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            layout: self.layout.clone(),
            registry_dir: self.layout_dir.clone(),
        }
    }
}

fn parse_var<T: FromStr>(key: &str, value: Option<String>, default: T) -> ConfigResult<T> {
    match value {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidVar {
            key: key.to_string(),
            value: raw,
        }),
    }
}
