//! Priority-ordered backend registry
//!
//! Backends are tried in ascending priority order (0 before 10); the first one
//! whose `can_handle` accepts the locator wins. Backends registered with the
//! same priority keep their registration order.

use super::{Backend, DecoderEventSink, DecoderHandle, NopBackend};
use crate::error::{PlaybackError, Result};
use cadence_core::{Locator, SharedItem};
use std::fmt;
use std::sync::Arc;

/// Priority for a backend that should only be used when nothing else matches
pub const FALLBACK_PRIORITY: i32 = i32::MAX;

struct Registration {
    priority: i32,
    backend: Arc<dyn Backend>,
}

/// Registry of decoder backends
#[derive(Default)]
pub struct BackendRegistry {
    registrations: Vec<Registration>,
    forced: Option<Arc<dyn Backend>>,
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.backend_names())
            .field("forced", &self.forced.as_ref().map(|b| b.name().to_string()))
            .finish()
    }
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that always uses the no-op backend
    pub fn headless() -> Self {
        let mut registry = Self::new();
        registry.force(NopBackend);
        registry
    }

    /// Register a backend at `priority` (lower runs first)
    pub fn register(&mut self, priority: i32, backend: impl Backend + 'static) -> &mut Self {
        self.register_shared(priority, Arc::new(backend))
    }

    pub fn register_shared(&mut self, priority: i32, backend: Arc<dyn Backend>) -> &mut Self {
        tracing::debug!(backend = backend.name(), priority, "registered decoder backend");
        self.registrations.push(Registration { priority, backend });
        // Stable, so equal priorities stay in registration order
        self.registrations.sort_by_key(|r| r.priority);
        self
    }

    /// Register a backend built from closures
    pub fn register_fn<C, F>(
        &mut self,
        priority: i32,
        name: impl Into<String>,
        can_handle: C,
        construct: F,
    ) -> &mut Self
    where
        C: Fn(&Locator) -> bool + Send + Sync + 'static,
        F: Fn(&SharedItem, DecoderEventSink) -> Result<Box<dyn DecoderHandle>>
            + Send
            + Sync
            + 'static,
    {
        self.register(priority, FnBackend::new(name, can_handle, construct))
    }

    /// Use `backend` for every item, bypassing resolution
    pub fn force(&mut self, backend: impl Backend + 'static) -> &mut Self {
        self.forced = Some(Arc::new(backend));
        self
    }

    pub fn clear_force(&mut self) -> &mut Self {
        self.forced = None;
        self
    }

    pub fn is_forced(&self) -> bool {
        self.forced.is_some()
    }

    /// Best backend for `locator`
    pub fn resolve(&self, locator: &Locator) -> Result<Arc<dyn Backend>> {
        if let Some(forced) = &self.forced {
            return Ok(Arc::clone(forced));
        }

        self.registrations
            .iter()
            .find(|r| r.backend.can_handle(locator))
            .map(|r| Arc::clone(&r.backend))
            .ok_or_else(|| PlaybackError::Unsupported {
                locator: locator.to_string(),
            })
    }

    /// Registered backend names in resolution order
    pub fn backend_names(&self) -> Vec<String> {
        self.registrations
            .iter()
            .map(|r| r.backend.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

/// Backend assembled from a name and two closures
pub struct FnBackend<C, F> {
    name: String,
    can_handle: C,
    construct: F,
}

impl<C, F> FnBackend<C, F> {
    pub fn new(name: impl Into<String>, can_handle: C, construct: F) -> Self {
        Self {
            name: name.into(),
            can_handle,
            construct,
        }
    }
}

impl<C, F> Backend for FnBackend<C, F>
where
    C: Fn(&Locator) -> bool + Send + Sync,
    F: Fn(&SharedItem, DecoderEventSink) -> Result<Box<dyn DecoderHandle>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn can_handle(&self, locator: &Locator) -> bool {
        (self.can_handle)(locator)
    }

    fn construct(
        &self,
        item: &SharedItem,
        events: DecoderEventSink,
    ) -> Result<Box<dyn DecoderHandle>> {
        (self.construct)(item, events)
    }
}
