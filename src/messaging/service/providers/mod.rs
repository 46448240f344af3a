//! # Queue Backend Providers
//!
//! - [`InMemoryQueueBackend`] - single-process priority queue guarded by a mutex

mod in_memory;

pub use in_memory::InMemoryQueueBackend;
