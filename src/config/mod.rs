//! Configuration module for the stack file.
//!
//! This module handles:
//! - Parsing and deserializing `canopy.yaml`
//! - Validation of configuration values and component declarations
//! - Computing configuration hashes for history entries

mod hash;
mod parser;
mod spec;
mod validator;

pub use hash::ConfigHasher;
pub use parser::{ConfigParser, DEFAULT_CONFIG_FILES, TOKEN_ENV_VAR, find_config_file};
pub use spec::{
    EngineConfig, ProjectConfig, ProviderConfig, ProviderKind, StackConfig, StateBackend, StateConfig,
};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
