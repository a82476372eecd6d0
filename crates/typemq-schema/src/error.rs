/// Errors that can occur while encoding or validating messages.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The message could not be serialized to its wire form.
    #[error("failed to encode {schema}: {source}")]
    Encode {
        schema: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The wire payload failed schema validation.
    #[error("invalid payload for {schema}: {detail}")]
    Validation { schema: &'static str, detail: String },
}

/// Errors that can occur while building or querying a queue registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Two entries were declared under the same queue identifier.
    #[error("duplicate queue identifier {id:?}")]
    DuplicateIdentifier { id: String },

    /// Two identifiers were declared with the same transport queue name.
    #[error("duplicate transport queue name {queue_name:?}")]
    DuplicateQueueName { queue_name: String },

    /// The queue identifier is not part of the registry.
    #[error("unknown queue identifier {id:?}")]
    UnknownQueue { id: String },
}

pub type Result<T> = std::result::Result<T, SchemaError>;
