//! # Registry Infrastructure
//!
//! Name-based lookup of the capabilities that serve each pipeline stage.

pub mod capability_registry;

pub use capability_registry::{
    CapabilityHandler, CapabilityRegistry, FnCapability, RegistryError, RegistryResult,
};
