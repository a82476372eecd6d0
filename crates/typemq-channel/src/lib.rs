//! Schema-validated publish and consume over a raw broker channel.
//!
//! A [`ValidatedChannel`] binds one raw channel to one
//! [`QueueRegistry`](typemq_schema::QueueRegistry): queues are declared at
//! construction, publishes are checked for queue membership and schema
//! identity before encoding, and consumer callbacks receive payloads that
//! have already been decoded and validated. Raw channel operations outside
//! the typed surface are forwarded unchanged.

pub mod channel;
pub mod context;
pub mod error;

pub use channel::ValidatedChannel;
pub use context::DeliveryContext;
pub use error::{ChannelError, Result};
