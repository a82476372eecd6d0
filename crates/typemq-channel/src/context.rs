use typemq_broker::{ConsumerTag, PublishOptions, RawChannel};
use typemq_schema::{Message, QueueRegistry};

use crate::channel::publish_message;
use crate::error::Result;

/// The channel surface handed to consumer callbacks.
///
/// Borrows the channel driving the dispatch loop for the duration of one
/// callback invocation, so a consumer can publish follow-up messages,
/// acknowledge its delivery, or cancel consumers without a second channel.
/// Typed publishes go through the same registry checks as
/// [`ValidatedChannel::publish`](crate::ValidatedChannel::publish).
#[derive(Debug)]
pub struct DeliveryContext<'a> {
    raw: &'a mut RawChannel,
    registry: &'a QueueRegistry,
}

impl<'a> DeliveryContext<'a> {
    pub(crate) fn new(raw: &'a mut RawChannel, registry: &'a QueueRegistry) -> Self {
        Self { raw, registry }
    }

    /// Publish a typed message to a registry queue.
    pub fn publish<M: Message>(&mut self, id: &str, message: &M) -> Result<()> {
        publish_message(self.raw, self.registry, id, message, &PublishOptions::json())
    }

    /// Publish with explicit transport options, forwarded verbatim.
    pub fn publish_with_options<M: Message>(
        &mut self,
        id: &str,
        message: &M,
        options: &PublishOptions,
    ) -> Result<()> {
        publish_message(self.raw, self.registry, id, message, options)
    }

    /// Acknowledge a delivery received on this channel.
    pub fn ack(&mut self, delivery_tag: u64) -> Result<()> {
        Ok(self.raw.ack(delivery_tag)?)
    }

    /// Cancel a consumer on this channel.
    pub fn cancel(&mut self, consumer_tag: &ConsumerTag) -> Result<()> {
        Ok(self.raw.cancel(consumer_tag)?)
    }

    /// The registry the channel is bound to.
    pub fn registry(&self) -> &QueueRegistry {
        self.registry
    }

    /// Mutably borrow the raw channel for operations outside the typed
    /// surface.
    pub fn raw_mut(&mut self) -> &mut RawChannel {
        self.raw
    }
}
