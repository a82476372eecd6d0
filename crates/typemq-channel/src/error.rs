use typemq_broker::BrokerError;
use typemq_schema::{RegistryError, SchemaError};

/// Errors raised by validated channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The channel could not be constructed from the given arguments.
    #[error("invalid channel configuration: {0}")]
    Configuration(String),

    /// The queue identifier is not part of the bound registry.
    #[error("queue {id:?} is not part of the bound registry")]
    UnknownQueue { id: String },

    /// The message type does not match the schema bound to the queue.
    #[error("queue {id:?} carries {expected} messages, got {actual}")]
    SchemaMismatch {
        id: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Encoding failed, or wire bytes failed schema validation.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Transport-level error, passed through unmodified.
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

impl From<RegistryError> for ChannelError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownQueue { id } => ChannelError::UnknownQueue { id },
            other => ChannelError::Configuration(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;
