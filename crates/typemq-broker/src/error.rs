use crate::event::ConsumerTag;

/// Error type carried by a failing consumer callback.
///
/// Higher layers box their own error enums into this; the dispatch loop
/// wraps it in [`BrokerError::Callback`] without inspecting it.
pub type DispatchError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur in broker channel operations.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The connection has been closed.
    #[error("connection is closed")]
    ConnectionClosed,

    /// The target queue has never been declared.
    #[error("queue {queue:?} has not been declared")]
    QueueNotDeclared { queue: String },

    /// The queue exists with different properties.
    #[error("queue {queue:?} is already declared with durable={existing}")]
    DeclareConflict { queue: String, existing: bool },

    /// No unacknowledged delivery carries this tag on the channel.
    #[error("unknown delivery tag {0}")]
    UnknownDeliveryTag(u64),

    /// No active consumer carries this tag.
    #[error("unknown consumer tag {0}")]
    UnknownConsumerTag(ConsumerTag),

    /// A consumer callback returned an error during dispatch.
    ///
    /// The failing event has been consumed; later events stay queued and
    /// the next dispatch call keeps processing them.
    #[error("consumer {consumer_tag} callback failed: {source}")]
    Callback {
        consumer_tag: ConsumerTag,
        #[source]
        source: DispatchError,
    },
}

pub type Result<T> = std::result::Result<T, BrokerError>;
