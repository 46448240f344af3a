//! # Queue Service Abstraction
//!
//! Provider-agnostic priority queue contract plus the in-memory provider.

pub mod providers;
pub mod traits;
pub mod types;

pub use providers::InMemoryQueueBackend;
pub use traits::QueueBackend;
pub use types::BackendStats;
