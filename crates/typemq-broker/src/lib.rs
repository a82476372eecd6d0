//! In-process message broker with blocking channel primitives.
//!
//! This crate is the raw transport layer: queues, publish/consume,
//! acknowledgements, and a blocking event-dispatch loop. It knows nothing
//! about message schemas; bodies are opaque bytes. The typed contract
//! layer lives in `typemq-channel`.
//!
//! Dispatch is single-threaded and cooperative: one event at a time,
//! callbacks run to completion, and a channel is confined to the thread
//! that drives it. Connections, by contrast, are `Send + Sync` handles and
//! may open one channel per thread.

pub mod broker;
pub mod channel;
pub mod error;
pub mod event;
pub mod options;

pub use broker::{Broker, Connection};
pub use channel::{RawChannel, RawDeliveryCallback};
pub use error::{BrokerError, DispatchError, Result};
pub use event::{
    CancellationEvent, ChannelEvent, ConsumerTag, DeclareOk, Delivery, DeliveryEvent,
    MessageProperties,
};
pub use options::{ConsumeOptions, PublishOptions};
