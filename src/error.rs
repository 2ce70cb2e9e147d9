//! Error types for the Canopy reconciliation engine.
//!
//! This module provides the error hierarchy for every stage of a
//! reconciliation pass: configuration, component hydration, provider
//! calls, state persistence, and the reconciliation driver itself.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the Canopy engine.
#[derive(Debug, Error)]
pub enum CanopyError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Component definition and hydration errors.
    #[error("Component error: {0}")]
    Component(#[from] ComponentError),

    /// Provider (external API) errors.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// State management errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Reconciliation errors.
    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },
}

/// Errors raised while constructing or hydrating components.
#[derive(Debug, Error)]
pub enum ComponentError {
    /// A value that had to be a component is not one.
    #[error("Expected a component, found {value}")]
    NotAComponent {
        /// Rendering of the offending value.
        value: String,
    },

    /// `define` produced something other than a mapping or list of components.
    #[error("Component '{component}' defined an invalid set of children: expected a mapping or list, found {found}")]
    InvalidDefinition {
        /// Instance id of the defining component.
        component: String,
        /// Kind of value that was returned.
        found: String,
    },

    /// A child returned from `define` is already owned by another component.
    #[error("Component '{child}' is already attached to '{owner}' and cannot be attached to '{parent}'")]
    ParentConflict {
        /// Key or id of the child.
        child: String,
        /// Current owner of the child.
        owner: String,
        /// Component that tried to adopt the child.
        parent: String,
    },

    /// No resource type is registered under the given tag.
    #[error("Unknown component type: {type_name}")]
    UnknownType {
        /// The unregistered type tag.
        type_name: String,
    },

    /// Declared inputs could not be turned into a resource.
    #[error("Invalid inputs for {type_name}: {message}")]
    InvalidInputs {
        /// Resource type tag.
        type_name: String,
        /// Description of the problem.
        message: String,
    },

    /// Persisted state could not be restored into a resource.
    #[error("Cannot restore {type_name} from state: {message}")]
    InvalidState {
        /// Resource type tag.
        type_name: String,
        /// Description of the problem.
        message: String,
    },

    /// A required context service was not registered.
    #[error("Service not available in context: {service}")]
    MissingService {
        /// Name of the missing service type.
        service: &'static str,
    },
}

/// Errors surfaced by provider calls.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Authentication failed.
    #[error("Provider authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed.
    #[error("Provider request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP-like status code.
        status: u16,
        /// Error message from the provider.
        message: String,
    },

    /// Rate limited.
    #[error("Provider rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// The addressed resource does not exist.
    #[error("Resource not found: {resource}")]
    NotFound {
        /// Identifier of the missing resource.
        resource: String,
    },

    /// Network error.
    #[error("Network error communicating with provider: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from the provider.
    #[error("Invalid response from provider: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// State management errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// State is corrupted.
    #[error("State is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// State lock acquisition failed.
    #[error("Failed to acquire state lock: {message}")]
    LockFailed {
        /// Description of the lock failure.
        message: String,
    },

    /// State lock is held by another process.
    #[error("State is locked by another process (lock holder: {holder}, since: {since})")]
    LockedByOther {
        /// Identifier of the lock holder.
        holder: String,
        /// When the lock was acquired.
        since: String,
    },

    /// Filesystem write failed.
    #[error("Failed to write state: {message}")]
    WriteFailed {
        /// Description of the failure.
        message: String,
    },

    /// Serialization error.
    #[error("State serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// State version mismatch.
    #[error("State version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected state version.
        expected: String,
        /// Found state version.
        found: String,
    },
}

/// Reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A lifecycle step failed for a specific resource.
    #[error("Failed to {step} {type_name} '{path}': {reason}")]
    ResourceFailed {
        /// Lifecycle step (deploy, replace, remove).
        step: &'static str,
        /// Resource type tag.
        type_name: String,
        /// Key path of the node.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Reconciliation was aborted.
    #[error("Reconciliation aborted: {reason}")]
    Aborted {
        /// Reason for abort.
        reason: String,
    },
}

/// Result type alias for Canopy operations.
pub type Result<T> = std::result::Result<T, CanopyError>;

impl CanopyError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Provider(
                ProviderError::RateLimited { .. } | ProviderError::NetworkError { .. }
            ) | Self::State(StateError::LockFailed { .. })
        )
    }

    /// Returns the delay the provider asked for before retrying, if any.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::Provider(ProviderError::RateLimited { retry_after_secs }) => Some(*retry_after_secs),
            _ => None,
        }
    }

    /// Returns true if this error reports a missing provider resource.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Provider(ProviderError::NotFound { .. }))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl ComponentError {
    /// Creates an input error for a resource type.
    #[must_use]
    pub fn invalid_inputs(type_name: &str, message: impl Into<String>) -> Self {
        Self::InvalidInputs {
            type_name: type_name.to_string(),
            message: message.into(),
        }
    }
}

impl StateError {
    /// Creates a write error with the given message.
    #[must_use]
    pub fn write(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }
}

impl ReconcileError {
    /// Wraps a lifecycle failure with the node it happened on.
    #[must_use]
    pub fn resource_failed(step: &'static str, type_name: &str, path: &str, source: &CanopyError) -> Self {
        Self::ResourceFailed {
            step,
            type_name: type_name.to_string(),
            path: path.to_string(),
            reason: source.to_string(),
        }
    }
}

impl ProviderError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        let rate_limited = CanopyError::Provider(ProviderError::RateLimited {
            retry_after_secs: 7,
        });
        assert!(rate_limited.is_retryable());
        assert_eq!(rate_limited.retry_delay_secs(), Some(7));

        let not_found = CanopyError::Provider(ProviderError::not_found("arn:topic"));
        assert!(!not_found.is_retryable());
        assert!(not_found.is_not_found());
    }

    #[test]
    fn test_invalid_definition_names_component() {
        let err = ComponentError::InvalidDefinition {
            component: String::from("stack"),
            found: String::from("string"),
        };
        assert!(err.to_string().contains("'stack'"));
    }
}
