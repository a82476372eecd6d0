use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;

/// Opaque token identifying an active consumer subscription.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConsumerTag(String);

impl ConsumerTag {
    pub(crate) fn new(channel_id: u64, sequence: u64) -> Self {
        Self(format!("ctag-{channel_id}.{sequence}"))
    }

    /// Tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConsumerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Delivery metadata handed to consumer callbacks.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Consumer the message was routed to.
    pub consumer_tag: ConsumerTag,
    /// Channel-scoped tag used to acknowledge this delivery.
    pub delivery_tag: u64,
    /// Transport queue the message came from.
    pub queue: String,
    /// Whether this message was requeued after an earlier delivery.
    pub redelivered: bool,
}

/// Message metadata forwarded verbatim with each delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageProperties {
    pub content_type: Option<String>,
    pub headers: BTreeMap<String, String>,
}

impl MessageProperties {
    /// Properties for a JSON payload.
    pub fn json() -> Self {
        Self {
            content_type: Some("application/json".to_string()),
            headers: BTreeMap::new(),
        }
    }
}

/// Result of a queue declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclareOk {
    /// Declared queue name.
    pub queue: String,
    /// Messages waiting in the queue backlog.
    pub message_count: usize,
    /// Consumers currently registered on the queue.
    pub consumer_count: usize,
}

/// A pending event queued for a channel's dispatch loop.
///
/// Dispatch classifies events by matching on this enum exhaustively; there
/// is no other event kind.
#[derive(Debug)]
pub enum ChannelEvent {
    /// A message delivery for a registered consumer.
    Delivery(DeliveryEvent),
    /// A consumer cancellation; its registration is removed when processed.
    Cancellation(CancellationEvent),
}

/// A delivery waiting to be dispatched.
#[derive(Debug)]
pub struct DeliveryEvent {
    pub delivery: Delivery,
    pub properties: MessageProperties,
    pub body: Bytes,
}

/// A cancellation waiting to be dispatched.
#[derive(Debug)]
pub struct CancellationEvent {
    pub consumer_tag: ConsumerTag,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consumer_tags_are_unique_per_channel_sequence() {
        let a = ConsumerTag::new(1, 0);
        let b = ConsumerTag::new(1, 1);
        let c = ConsumerTag::new(2, 0);

        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str(), "ctag-1.0");
        assert_eq!(a.to_string(), "ctag-1.0");
    }

    #[test]
    fn json_properties_set_content_type() {
        let properties = MessageProperties::json();
        assert_eq!(properties.content_type.as_deref(), Some("application/json"));
        assert!(properties.headers.is_empty());
    }
}
