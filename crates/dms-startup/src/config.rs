//! Startup configuration.
//!
//! Read from environment variables, then overridden by CLI flags.

use std::path::PathBuf;

use dms_schema::{BundledSource, DirectorySource, SchemaSource};

pub const ENV_USE_API_SCHEMA_PATH: &str = "DMS_USE_API_SCHEMA_PATH";
pub const ENV_API_SCHEMA_PATH: &str = "DMS_API_SCHEMA_PATH";
pub const ENV_SCHEMA_FINGERPRINT_PATH: &str = "DMS_SCHEMA_FINGERPRINT_PATH";
pub const ENV_ALLOW_SCHEMA_RELOAD: &str = "DMS_ALLOW_SCHEMA_RELOAD";

pub const DEFAULT_FINGERPRINT_PATH: &str = "dms-schema-fingerprint.json";

/// Configuration for one process start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupConfig {
    /// Load from `api_schema_path` instead of the bundled sample.
    pub use_api_schema_path: bool,
    /// Directory scanned for `ApiSchema*.json`.
    pub api_schema_path: Option<PathBuf>,
    /// Where the backend fingerprint is stored.
    pub fingerprint_path: PathBuf,
    /// Whether reload and upload are permitted.
    pub allow_schema_reload: bool,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            use_api_schema_path: false,
            api_schema_path: None,
            fingerprint_path: PathBuf::from(DEFAULT_FINGERPRINT_PATH),
            allow_schema_reload: false,
        }
    }
}

impl StartupConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `DMS_USE_API_SCHEMA_PATH` (default: `false`)
    /// - `DMS_API_SCHEMA_PATH` (required when the directory origin is used;
    ///   its absence surfaces as a load failure)
    /// - `DMS_SCHEMA_FINGERPRINT_PATH` (default: `dms-schema-fingerprint.json`)
    /// - `DMS_ALLOW_SCHEMA_RELOAD` (default: `false`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        Ok(Self {
            use_api_schema_path: env_bool(ENV_USE_API_SCHEMA_PATH, non_empty(ENV_USE_API_SCHEMA_PATH))?,
            api_schema_path: non_empty(ENV_API_SCHEMA_PATH).map(PathBuf::from),
            fingerprint_path: non_empty(ENV_SCHEMA_FINGERPRINT_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FINGERPRINT_PATH)),
            allow_schema_reload: env_bool(ENV_ALLOW_SCHEMA_RELOAD, non_empty(ENV_ALLOW_SCHEMA_RELOAD))?,
        })
    }

    /// Apply CLI flags on top of the environment. A schema path implies
    /// the directory origin.
    pub fn with_overrides(
        mut self,
        schema_path: Option<PathBuf>,
        fingerprint_path: Option<PathBuf>,
        allow_reload: bool,
    ) -> Self {
        if let Some(path) = schema_path {
            self.use_api_schema_path = true;
            self.api_schema_path = Some(path);
        }
        if let Some(path) = fingerprint_path {
            self.fingerprint_path = path;
        }
        self.allow_schema_reload |= allow_reload;
        self
    }

    /// The schema origin this configuration selects.
    pub fn schema_source(&self) -> Box<dyn SchemaSource> {
        if self.use_api_schema_path {
            Box::new(DirectorySource::new(self.api_schema_path.clone()))
        } else {
            Box::new(BundledSource::sample())
        }
    }
}

fn env_bool(var: &str, raw: Option<String>) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(false);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var: var.to_string(),
            value: raw,
        }),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable is set to something that does not parse.
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: String, value: String },
}
