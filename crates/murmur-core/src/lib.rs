//! Murmur core crate - shared types, errors, events, config, and storage contract.
//!
//! Everything the other Murmur crates have in common lives here: the error
//! taxonomy, the closed domain event set and its broadcast bus, the TOML
//! configuration tree, and the generic key-value snapshot store.

pub mod config;
pub mod error;
pub mod events;
pub mod store;
pub mod types;

pub use config::MurmurConfig;
pub use error::{MurmurError, Result};
pub use events::{DomainEvent, EventBus};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
pub use types::*;
