//! Per-pass context handed to every lifecycle hook.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::error::{ComponentError, Result};
use crate::planner::UpdateOrdering;

use super::registry::Registry;

/// Engine-level knobs consulted by resource adapters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineSettings {
    /// Whether the primary update group completes before the secondary group starts.
    pub update_ordering: UpdateOrdering,
    /// Minimum spacing between consecutive calls of a sequential update group.
    pub min_update_interval: Duration,
}

/// Shared context for a reconciliation pass.
///
/// Carries the component registry, provider services keyed by type, engine
/// settings and a tracing span used by [`Context::log`].
#[derive(Clone)]
pub struct Context {
    registry: Arc<Registry>,
    services: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    settings: EngineSettings,
    span: tracing::Span,
}

impl Context {
    /// Creates a context around a registry with default settings.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            services: HashMap::new(),
            settings: EngineSettings::default(),
            span: tracing::info_span!("reconcile"),
        }
    }

    /// Registers a service that adapters can look up by type.
    #[must_use]
    pub fn with_service<T: Any + Send + Sync>(mut self, service: T) -> Self {
        self.services.insert(TypeId::of::<T>(), Arc::new(service));
        self
    }

    /// Replaces the engine settings.
    #[must_use]
    pub const fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replaces the logging span.
    #[must_use]
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    /// Component registry for declared children.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Engine settings.
    #[must_use]
    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Looks up a registered service.
    ///
    /// # Errors
    ///
    /// Returns `ComponentError::MissingService` if no service of type `T` was registered.
    pub fn service<T: Any + Send + Sync>(&self) -> Result<&T> {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|service| service.downcast_ref::<T>())
            .ok_or_else(|| {
                ComponentError::MissingService {
                    service: type_name::<T>(),
                }
                .into()
            })
    }

    /// Emits an informational message under the pass span.
    pub fn log(&self, message: &str) {
        info!(parent: &self.span, "{}", message);
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("registry", &self.registry)
            .field("services", &self.services.len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
