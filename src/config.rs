//! App directory, settings file and catalog credential resolution.
//!
//! The app root is `<OS config dir>/.heft`, or `$HEFT_CONFIG_HOME/.heft`.
//! Settings come from `<app root>/config.toml` with every field defaulted, then
//! a few environment overrides. Credentials never live in the settings file:
//! they come from positional arguments or the environment.

use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::PRODUCTS_TABLE;

/// Directory created under the config root for settings and logs.
pub const APP_DIR_NAME: &str = ".heft";
/// Environment variable replacing the OS config root.
pub const CONFIG_HOME_ENV: &str = "HEFT_CONFIG_HOME";

/// Default filename used to store settings.
pub const CONFIG_FILE_NAME: &str = "config.toml";
/// Default location of the trained estimator artifact.
pub const DEFAULT_MODEL_PATH: &str = "ml/weight_model.json";
/// Default listen address for the inference service.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
/// Rows per catalog insert during ingestion.
pub const DEFAULT_INSERT_BATCH_SIZE: usize = 500;
/// URL prefix selecting the local SQLite catalog.
pub const SQLITE_URL_PREFIX: &str = "sqlite://";

const URL_ENV_VARS: [&str; 3] = ["HEFT_CATALOG_URL", "SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"];
const KEY_ENV_VARS: [&str; 3] = [
    "HEFT_CATALOG_KEY",
    "SUPABASE_SERVICE_ROLE_KEY",
    "SUPABASE_SERVICE_KEY",
];

/// Errors raised while loading settings or resolving credentials.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the settings file.
    #[error("Failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Settings file was not valid TOML for [`Settings`].
    #[error("Invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// A required credential was neither passed nor set in the environment.
    #[error("Missing {0} (pass it as an argument or set one of {1})")]
    MissingCredential(&'static str, String),
    /// A setting holds a value the pipeline cannot use.
    #[error("Invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
    /// Command-line arguments could not be parsed.
    #[error("{0}")]
    Usage(String),
}

/// Pipeline settings persisted in `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    #[serde(default = "default_insert_batch_size")]
    pub insert_batch_size: usize,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            insert_batch_size: default_insert_batch_size(),
            table: default_table(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl Settings {
    /// Load settings from the app directory and apply environment overrides.
    ///
    /// A missing app directory or settings file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let lookup = |name: &str| std::env::var(name).ok();
        let settings = match app_root_with(lookup) {
            Some(root) => Self::load_from(&root.join(CONFIG_FILE_NAME))?,
            None => {
                tracing::debug!("No config directory available; using default settings");
                Self::default()
            }
        };
        settings.with_overrides(lookup)
    }

    /// Load settings from an explicit file path, defaulting when absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `HEFT_MODEL_PATH` and `PORT` overrides, then validate.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(path) = lookup("HEFT_MODEL_PATH").filter(|v| !v.trim().is_empty()) {
            self.model_path = PathBuf::from(path);
        }
        if let Some(port) = lookup("PORT").filter(|v| !v.trim().is_empty()) {
            let port: u16 = port.trim().parse().map_err(|_| ConfigError::Invalid {
                field: "PORT",
                reason: format!("`{port}` is not a port number"),
            })?;
            let host = self
                .bind_addr
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            self.bind_addr = format!("{host}:{port}");
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.insert_batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "insert_batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.table.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "table",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Where the product catalog lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogLocation {
    /// Hosted PostgREST endpoint plus service key.
    Rest { url: String, key: String },
    /// Local SQLite database file.
    Sqlite(PathBuf),
}

impl CatalogLocation {
    /// Resolve from optional positional arguments, falling back to the process environment.
    pub fn resolve(url: Option<&str>, key: Option<&str>) -> Result<Self, ConfigError> {
        Self::resolve_with(url, key, |name| std::env::var(name).ok())
    }

    /// Resolve using an explicit environment lookup.
    pub fn resolve_with(
        url: Option<&str>,
        key: Option<&str>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let url = first_present(url, &URL_ENV_VARS, &lookup)
            .ok_or_else(|| ConfigError::MissingCredential("catalog URL", URL_ENV_VARS.join(", ")))?;
        if let Some(path) = url.strip_prefix(SQLITE_URL_PREFIX) {
            return Ok(Self::Sqlite(PathBuf::from(path)));
        }
        let key = first_present(key, &KEY_ENV_VARS, &lookup)
            .ok_or_else(|| ConfigError::MissingCredential("service key", KEY_ENV_VARS.join(", ")))?;
        Ok(Self::Rest { url, key })
    }
}

/// The `.heft` app root; nothing is created on disk.
pub fn app_root_dir() -> Option<PathBuf> {
    app_root_with(|name| std::env::var(name).ok())
}

/// Where per-launch log files go.
pub fn logs_dir() -> Option<PathBuf> {
    app_root_dir().map(|root| root.join("logs"))
}

fn app_root_with(lookup: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    let base = lookup(CONFIG_HOME_ENV)
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .or_else(|| BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf()))?;
    Some(base.join(APP_DIR_NAME))
}

fn first_present(
    explicit: Option<&str>,
    env_names: &[&str],
    lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    explicit
        .map(str::to_string)
        .into_iter()
        .chain(env_names.iter().filter_map(|name| lookup(name)))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

fn default_model_path() -> PathBuf {
    PathBuf::from(DEFAULT_MODEL_PATH)
}

fn default_insert_batch_size() -> usize {
    DEFAULT_INSERT_BATCH_SIZE
}

fn default_table() -> String {
    PRODUCTS_TABLE.to_string()
}

fn default_bind_addr() -> String {
    DEFAULT_BIND_ADDR.to_string()
}
