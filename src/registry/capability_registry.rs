//! # Capability Registry
//!
//! Maps capability names to the handlers that serve them. The orchestrator only
//! checks that a name is registered before routing; the dispatcher resolves the
//! handler for each delivered request.
//!
//! ## Usage
//!
//! ```rust
//! use fabflow_core::messaging::{CapabilityResponse, Message, Payload};
//! use fabflow_core::registry::{CapabilityRegistry, FnCapability};
//!
//! let registry = CapabilityRegistry::new();
//! registry
//!     .register(
//!         "research_agent",
//!         FnCapability::new(|request: Message| async move {
//!             Ok(CapabilityResponse::success(request.payload))
//!         }),
//!     )
//!     .unwrap();
//!
//! assert!(registry.contains("research_agent"));
//! ```

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::messaging::{CapabilityResponse, Message};

/// Registry errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Capability '{name}' is already registered")]
    DuplicateCapability { name: String },

    #[error("Capability '{name}' is not registered")]
    CapabilityNotFound { name: String },

    #[error("Invalid capability name: {reason}")]
    InvalidName { reason: String },
}

impl RegistryError {
    pub fn duplicate_capability(name: impl Into<String>) -> Self {
        Self::DuplicateCapability { name: name.into() }
    }

    pub fn capability_not_found(name: impl Into<String>) -> Self {
        Self::CapabilityNotFound { name: name.into() }
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// A pipeline stage reachable by name
///
/// `Ok` carries the stage's answer, success or failure, which the dispatcher
/// turns into a response message. `Err` means no answer could be produced at all;
/// the request is then negatively acknowledged and redelivered while it has
/// retry budget.
#[async_trait]
pub trait CapabilityHandler: Send + Sync + 'static {
    async fn handle(&self, request: &Message) -> anyhow::Result<CapabilityResponse>;
}

/// Adapts an async closure into a [`CapabilityHandler`]
pub struct FnCapability<F, Fut> {
    handler: F,
    _marker: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnCapability<F, Fut>
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<CapabilityResponse>> + Send + 'static,
{
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut> CapabilityHandler for FnCapability<F, Fut>
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<CapabilityResponse>> + Send + 'static,
{
    async fn handle(&self, request: &Message) -> anyhow::Result<CapabilityResponse> {
        (self.handler)(request.clone()).await
    }
}

/// Thread-safe name → handler table, populated at startup
#[derive(Default, Clone)]
pub struct CapabilityRegistry {
    handlers: Arc<DashMap<String, Arc<dyn CapabilityHandler>>>,
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("capabilities", &self.names())
            .finish()
    }
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; names are unique
    pub fn register<H>(&self, name: impl Into<String>, handler: H) -> RegistryResult<()>
    where
        H: CapabilityHandler,
    {
        self.register_arc(name, Arc::new(handler))
    }

    pub fn register_arc(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn CapabilityHandler>,
    ) -> RegistryResult<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RegistryError::InvalidName {
                reason: "capability name must not be empty".to_string(),
            });
        }

        match self.handlers.entry(name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(RegistryError::duplicate_capability(name))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(handler);
                info!(capability = %name, "🔌 Capability registered");
                Ok(())
            }
        }
    }

    /// Remove a capability, returning whether it was present
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.handlers.remove(name).is_some();
        if removed {
            debug!(capability = %name, "Capability unregistered");
        }
        removed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CapabilityHandler>> {
        self.handlers.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Resolve a handler or report it missing
    pub fn resolve(&self, name: &str) -> RegistryResult<Arc<dyn CapabilityHandler>> {
        self.get(name)
            .ok_or_else(|| RegistryError::capability_not_found(name))
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
