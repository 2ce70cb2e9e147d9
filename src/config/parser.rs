//! Configuration parser for loading stack files.
//!
//! Loads YAML from disk, applies `CANOPY_*` environment overrides and reads
//! provider credentials from the environment.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{CanopyError, ConfigError, Result};

use super::spec::StackConfig;

/// Environment variable holding the provider gateway token.
pub const TOKEN_ENV_VAR: &str = "CANOPY_PROVIDER_TOKEN";

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["canopy.yaml", "canopy.yml"];

/// Configuration parser for loading stack files.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving `.env`.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<StackConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(CanopyError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
            message: format!("Failed to read file: {e}"),
            location: Some(path.display().to_string()),
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<StackConfig> {
        debug!("Parsing YAML configuration");

        let config: StackConfig = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
            message: format!("YAML parse error: {e}"),
            location: source.map(|p| p.display().to_string()),
        })?;

        debug!("Parsed configuration for project: {}", config.project.name);
        Ok(config)
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// Overrides use the form `CANOPY_<SECTION>_<KEY>`, e.g. `CANOPY_PROJECT_NAME`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<StackConfig> {
        let mut config = self.load_file(path)?;
        Self::apply_overrides(&mut config, |name| std::env::var(name).ok());
        Ok(config)
    }

    /// Applies overrides looked up through `lookup`.
    pub fn apply_overrides(config: &mut StackConfig, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(name) = lookup("CANOPY_PROJECT_NAME") {
            debug!("Overriding project.name from environment");
            config.project.name = name;
        }

        if let Some(env) = lookup("CANOPY_PROJECT_ENVIRONMENT") {
            debug!("Overriding project.environment from environment");
            config.project.environment = env;
        }

        if let Some(endpoint) = lookup("CANOPY_PROVIDER_ENDPOINT") {
            debug!("Overriding provider.endpoint from environment");
            config.provider.endpoint = Some(endpoint);
        }

        if let Some(path) = lookup("CANOPY_STATE_PATH") {
            debug!("Overriding state.path from environment");
            config.state.path = Some(path);
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| ConfigError::ParseError {
                message: format!("Failed to load .env file: {e}"),
                location: Some(env_path.display().to_string()),
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Gets the provider gateway token from the environment (optional).
    #[must_use]
    pub fn provider_token() -> Option<String> {
        std::env::var(TOKEN_ENV_VAR).ok().filter(|token| !token.is_empty())
    }
}

/// Finds the configuration file in the current directory or parent directories.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(CanopyError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}
