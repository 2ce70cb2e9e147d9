//! Configuration types mapping the `canopy.yaml` stack file.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::component::EngineSettings;
use crate::planner::UpdateOrdering;

/// Default provider request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// The root of a stack file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StackConfig {
    /// Project-level configuration.
    pub project: ProjectConfig,
    /// State backend configuration.
    #[serde(default)]
    pub state: StateConfig,
    /// Provider connection.
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Engine tuning.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Declaration of the root component.
    pub root: Value,
}

/// Project-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Unique name for the project.
    pub name: String,
    /// Environment (e.g., "dev", "staging", "prod").
    #[serde(default = "default_environment")]
    pub environment: String,
}

/// State backend configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateConfig {
    /// Backend type.
    #[serde(default)]
    pub backend: StateBackend,
    /// State file path, defaults to `.canopy/state.json`.
    #[serde(default)]
    pub path: Option<String>,
}

/// State backend types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StateBackend {
    /// Local file-based state storage.
    #[default]
    Local,
}

/// Provider connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Which topic API implementation to use.
    #[serde(default)]
    pub kind: ProviderKind,
    /// Gateway endpoint, required for `http`.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Topic API implementations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Process-local provider, forgets everything on exit.
    #[default]
    Memory,
    /// JSON-over-HTTP provider gateway.
    Http,
}

/// Engine tuning knobs.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    /// Ordering between the primary and secondary update groups.
    #[serde(default)]
    pub update_ordering: UpdateOrdering,
    /// Minimum spacing between sequential update calls, in milliseconds.
    #[serde(default)]
    pub min_update_interval_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            endpoint: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl EngineConfig {
    /// Settings handed to the reconciliation context.
    #[must_use]
    pub const fn settings(&self) -> EngineSettings {
        EngineSettings {
            update_ordering: self.update_ordering,
            min_update_interval: Duration::from_millis(self.min_update_interval_ms),
        }
    }
}

impl StackConfig {
    /// Type tag of the root declaration, if it has one.
    #[must_use]
    pub fn root_type(&self) -> Option<&str> {
        self.root.get("type").and_then(Value::as_str)
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Http => write!(f, "http"),
        }
    }
}

fn default_environment() -> String {
    String::from("dev")
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
