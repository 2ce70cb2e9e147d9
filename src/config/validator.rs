//! Configuration validation for stack files.
//!
//! Collects every problem in one pass. Errors stop a reconciliation,
//! warnings are reported and ignored.

use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

use crate::component::Registry;
use crate::error::{ConfigError, Result};

use super::spec::{ProviderKind, StackConfig};

/// Intervals above this are probably a unit mistake.
const MAX_SANE_INTERVAL_MS: u64 = 60_000;

/// Validator for stack configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator {
    /// Component type tags accepted in declarations.
    known_types: HashSet<String>,
}

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a validator accepting every type in `registry`.
    #[must_use]
    pub fn new(registry: &Registry) -> Self {
        Self {
            known_types: registry.types().into_iter().map(String::from).collect(),
        }
    }

    /// Adds a type tag to the known list.
    pub fn add_type(&mut self, type_name: impl Into<String>) {
        self.known_types.insert(type_name.into());
    }

    /// Validates a stack configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any were found.
    pub fn validate(&self, config: &StackConfig) -> Result<ValidationResult> {
        let result = self.check(config);

        if let Some(first_error) = result.errors.first() {
            return Err(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }
            .into());
        }

        debug!("Configuration validation passed");
        Ok(result)
    }

    /// Runs every check and returns all findings.
    #[must_use]
    pub fn check(&self, config: &StackConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_project(config, &mut result);
        Self::validate_state(config, &mut result);
        Self::validate_provider(config, &mut result);
        Self::validate_engine(config, &mut result);
        self.validate_declaration(&config.root, "root", true, &mut result);

        result
    }

    fn validate_project(config: &StackConfig, result: &mut ValidationResult) {
        let project = &config.project;
        if project.name.is_empty() {
            result.error("project.name", "Project name cannot be empty");
        } else if !is_valid_name(&project.name) {
            result.error(
                "project.name",
                format!(
                    "Project name '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                    project.name
                ),
            );
        }

        if project.environment.is_empty() {
            result.error("project.environment", "Environment cannot be empty");
        }
    }

    fn validate_state(config: &StackConfig, result: &mut ValidationResult) {
        if config.state.path.as_ref().is_some_and(|p| p.trim().is_empty()) {
            result.error("state.path", "State path cannot be empty");
        }
    }

    fn validate_provider(config: &StackConfig, result: &mut ValidationResult) {
        let provider = &config.provider;
        match (provider.kind, provider.endpoint.as_deref()) {
            (ProviderKind::Http, None | Some("")) => {
                result.error("provider.endpoint", "An endpoint is required for the http provider");
            }
            (ProviderKind::Http, Some(endpoint))
                if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") =>
            {
                result.error(
                    "provider.endpoint",
                    format!("Endpoint '{endpoint}' must start with http:// or https://"),
                );
            }
            (ProviderKind::Memory, Some(_)) => {
                result
                    .warnings
                    .push(String::from("provider.endpoint is ignored by the memory provider"));
            }
            _ => {}
        }

        if provider.timeout_secs == 0 {
            result.error("provider.timeout_secs", "Timeout must be at least 1 second");
        }
    }

    fn validate_engine(config: &StackConfig, result: &mut ValidationResult) {
        let interval = config.engine.min_update_interval_ms;
        if interval > MAX_SANE_INTERVAL_MS {
            result.warnings.push(format!(
                "engine.min_update_interval_ms is {interval}ms; every sequential update will wait that long"
            ));
        }
    }

    /// Checks one declaration and, for groups, its declared children.
    ///
    /// The root must be a component. A child that is not one is discarded
    /// during hydration, so it only produces a warning.
    fn validate_declaration(&self, value: &Value, field: &str, required: bool, result: &mut ValidationResult) {
        let type_name = match value.get("type") {
            Some(Value::String(type_name)) => type_name,
            _ if required => {
                result.error(field, "Expected a component declaration with a string 'type'");
                return;
            }
            _ => {
                result
                    .warnings
                    .push(format!("{field} is not a component declaration and will be ignored"));
                return;
            }
        };

        if !self.known_types.contains(type_name) {
            result.error(format!("{field}.type"), format!("Unknown component type '{type_name}'"));
            return;
        }

        if let Some(id) = value.get("id")
            && !id.as_str().is_some_and(|id| !id.is_empty())
        {
            result.error(format!("{field}.id"), "Component id must be a non-empty string");
        }

        match value.get("components") {
            None | Some(Value::Null) => {}
            Some(Value::Object(children)) => {
                for (key, child) in children {
                    self.validate_declaration(child, &format!("{field}.components.{key}"), false, result);
                }
            }
            Some(Value::Array(children)) => {
                for (index, child) in children.iter().enumerate() {
                    self.validate_declaration(child, &format!("{field}.components[{index}]"), false, result);
                }
            }
            Some(_) => {
                result.error(
                    format!("{field}.components"),
                    "Children must be declared as a mapping or a list",
                );
            }
        }
    }
}

/// Validates that a name follows the naming convention.
/// Names must be lowercase alphanumeric with hyphens, starting with a letter.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();

    // First character must be a letter
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }

    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return false;
    }

    !name.ends_with('-') && !name.contains("--")
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
