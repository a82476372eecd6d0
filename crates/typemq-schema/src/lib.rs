//! Typed message contracts and queue registries.
//!
//! Messages are plain serde structs with a canonical UTF-8 JSON wire form;
//! every payload is validated when it is decoded, never lazily. A
//! [`QueueRegistry`] binds symbolic queue identifiers to transport queue
//! names and message schemas. It is built once, is immutable afterwards,
//! and is safe to share across threads.

pub mod error;
pub mod message;
pub mod registry;

pub use error::{RegistryError, Result, SchemaError};
pub use message::{Message, SchemaDescriptor};
pub use registry::{QueueEntry, QueueRegistry, QueueRegistryBuilder};
