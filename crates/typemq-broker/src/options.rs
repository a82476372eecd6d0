use crate::event::MessageProperties;

/// Options forwarded verbatim to the raw publish primitive.
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    /// Metadata delivered alongside the message body.
    pub properties: MessageProperties,
}

impl PublishOptions {
    /// Options for a JSON payload.
    pub fn json() -> Self {
        Self {
            properties: MessageProperties::json(),
        }
    }
}

/// Options forwarded verbatim to the raw consume primitive.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsumeOptions {
    /// Settle deliveries at routing time instead of waiting for an
    /// explicit acknowledgement. Off by default.
    pub auto_ack: bool,
}

impl ConsumeOptions {
    /// Consume with automatic acknowledgement.
    pub fn auto_ack() -> Self {
        Self { auto_ack: true }
    }
}
