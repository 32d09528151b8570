//! Extraction settings. Every field has a default reproducing the stock behavior, so a config
//! file only needs to name what it changes. Precedence, lowest first: defaults, TOML file,
//! `SETUPDEPS_*` environment variables, CLI flags.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod env_keys {
    /// Replaces the sentinel text stubs and faked reads produce.
    pub const SETUPDEPS_SENTINEL: &str = "SETUPDEPS_SENTINEL";
    /// Comma-separated module names to treat as importable, added to the configured ones.
    pub const SETUPDEPS_AVAILABLE: &str = "SETUPDEPS_AVAILABLE";
    /// A config file to load when `--config` is not given.
    pub const SETUPDEPS_CONFIG: &str = "SETUPDEPS_CONFIG";
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PythonVersion {
    pub major: i64,
    pub minor: i64,
    pub micro: i64,
}

impl Default for PythonVersion {
    fn default() -> Self {
        Self {
            major: 3,
            minor: 11,
            micro: 0,
        }
    }
}

impl std::fmt::Display for PythonVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Text produced whenever a stub or a faked file read is converted to a string.
    pub sentinel: String,
    /// Callee names treated as the registration call.
    pub registration_names: Vec<String>,
    /// The keyword argument of the registration call holding the dependency list.
    pub requirements_keyword: String,
    /// Reported through `sys.version_info` and `sys.version`.
    pub python_version: PythonVersion,
    /// Reported through `sys.platform`.
    pub platform: String,
    /// Maximum call depth before `RecursionError` is raised.
    pub recursion_limit: usize,
    /// Extra root modules the sandbox reports as importable. Importing them binds an empty
    /// module rather than a stub.
    pub available_modules: Vec<String>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            sentinel: "FIXME".to_string(),
            registration_names: vec!["setup".to_string()],
            requirements_keyword: "install_requires".to_string(),
            python_version: PythonVersion::default(),
            platform: "linux".to_string(),
            recursion_limit: 1000,
            available_modules: vec![],
        }
    }
}

impl ExtractConfig {
    pub fn from_toml_str(path: &Path, text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(path, &text)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded extraction config");
        Ok(config)
    }

    /// Apply `SETUPDEPS_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply `SETUPDEPS_*` overrides from any key lookup.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(sentinel) = lookup(env_keys::SETUPDEPS_SENTINEL) {
            self.sentinel = sentinel;
        }
        if let Some(available) = lookup(env_keys::SETUPDEPS_AVAILABLE) {
            self.available_modules.extend(
                available
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(String::from),
            );
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.registration_names.is_empty() {
            return Err(ConfigError::Invalid {
                key: "registration_names".into(),
                message: "at least one name is required".into(),
            });
        }
        if self.recursion_limit == 0 {
            return Err(ConfigError::Invalid {
                key: "recursion_limit".into(),
                message: "must be positive".into(),
            });
        }
        if let Some(bad) = self
            .available_modules
            .iter()
            .find(|name| name.contains('.') || name.is_empty())
        {
            return Err(ConfigError::Invalid {
                key: "available_modules".into(),
                message: format!("{bad:?} is not a root module name"),
            });
        }
        Ok(())
    }
}
