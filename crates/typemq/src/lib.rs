//! Typed queue contracts over a blocking message-queue channel.
//!
//! typemq binds named queues to strongly-typed message schemas and layers
//! validated publish/consume helpers over a raw broker channel: queue
//! declaration happens at channel construction, payloads are encoded and
//! validated automatically, and consumer callbacks receive decoded typed
//! values instead of raw bytes.
//!
//! # Crate Structure
//!
//! - [`schema`] — Message contracts and the queue registry
//! - [`broker`] — In-process broker, raw channels, and the dispatch loop
//! - [`channel`] — The validated channel binding the two together

/// Re-export schema types.
pub mod schema {
    pub use typemq_schema::*;
}

/// Re-export broker types.
pub mod broker {
    pub use typemq_broker::*;
}

/// Re-export validated channel types.
pub mod channel {
    pub use typemq_channel::*;
}
