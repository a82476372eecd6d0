use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::broker::Shared;
use crate::error::{BrokerError, DispatchError, Result};
use crate::event::{ChannelEvent, ConsumerTag, DeclareOk, Delivery, DeliveryEvent, MessageProperties};
use crate::options::{ConsumeOptions, PublishOptions};

/// Callback invoked for each delivery dispatched to a consumer.
///
/// Receives the channel driving the dispatch, so it can publish, ack, or
/// cancel from inside the loop. Deliberately not `Send`: holding one of
/// these makes the owning channel thread-confined.
pub type RawDeliveryCallback = Box<
    dyn FnMut(
        &mut RawChannel,
        &Delivery,
        &MessageProperties,
        &[u8],
    ) -> std::result::Result<(), DispatchError>,
>;

/// A raw broker channel: queue declaration, publish/consume primitives,
/// acknowledgements, and the blocking event-dispatch loop.
///
/// The consumer-tag to callback map is owned by the channel and mutated
/// only from the thread driving [`process_events`](Self::process_events).
/// The callback type is not `Send`, so the compiler keeps a channel (and
/// with it the map) on a single thread; open one channel per thread of
/// execution.
pub struct RawChannel {
    channel_id: u64,
    shared: Arc<Shared>,
    callbacks: BTreeMap<ConsumerTag, RawDeliveryCallback>,
}

impl RawChannel {
    pub(crate) fn new(channel_id: u64, shared: Arc<Shared>) -> Self {
        Self {
            channel_id,
            shared,
            callbacks: BTreeMap::new(),
        }
    }

    /// Broker-assigned channel id.
    pub fn channel_id(&self) -> u64 {
        self.channel_id
    }

    /// Declare a queue.
    ///
    /// Re-declaring an existing queue with identical properties is a no-op
    /// and reports current backlog and consumer counts.
    pub fn declare_queue(&mut self, queue: &str, durable: bool) -> Result<DeclareOk> {
        self.shared.declare_queue(queue, durable)
    }

    /// Publish a message body to a queue.
    ///
    /// Blocks until the broker has accepted the message.
    pub fn publish(&mut self, routing_key: &str, body: &[u8], options: &PublishOptions) -> Result<()> {
        self.shared.publish(routing_key, body, options)
    }

    /// Register a consumer on a queue.
    ///
    /// Messages already waiting in the queue are routed to the new consumer
    /// immediately; they are handed to `callback` on the next dispatch call.
    pub fn consume(
        &mut self,
        queue: &str,
        options: ConsumeOptions,
        callback: RawDeliveryCallback,
    ) -> Result<ConsumerTag> {
        let tag = self.shared.consume(self.channel_id, queue, options)?;
        self.callbacks.insert(tag.clone(), callback);
        Ok(tag)
    }

    /// Acknowledge a delivery received on this channel.
    pub fn ack(&mut self, delivery_tag: u64) -> Result<()> {
        self.shared.ack(self.channel_id, delivery_tag)
    }

    /// Cancel a consumer.
    ///
    /// Routing to the consumer stops immediately; its callback registration
    /// is removed when the cancellation event is dispatched, before any
    /// later event is processed.
    pub fn cancel(&mut self, consumer_tag: &ConsumerTag) -> Result<()> {
        self.shared.cancel(self.channel_id, consumer_tag)
    }

    /// Whether any consumer callback is still registered.
    pub fn has_consumers(&self) -> bool {
        !self.callbacks.is_empty()
    }

    /// Number of registered consumer callbacks.
    pub fn consumer_count(&self) -> usize {
        self.callbacks.len()
    }

    /// Dispatch one pass of pending events on the calling thread.
    ///
    /// Takes a snapshot of the mailbox (waiting up to `wait` for the first
    /// event when it is empty) and dispatches it one event at a time.
    /// Messages published from inside a callback are queued for the *next*
    /// pass, not this one. Returns the number of events dispatched.
    ///
    /// A callback error is returned with the failing event consumed;
    /// everything behind it stays queued for the next call, so one bad
    /// message cannot stall the loop.
    pub fn process_events(&mut self, wait: Option<Duration>) -> Result<usize> {
        let mut batch = self.shared.take_pending(self.channel_id, wait)?;
        let mut dispatched = 0usize;

        while let Some(event) = batch.pop_front() {
            dispatched += 1;
            let outcome = match event {
                ChannelEvent::Delivery(delivery) => self.dispatch_delivery(delivery),
                ChannelEvent::Cancellation(cancellation) => {
                    debug!(consumer_tag = %cancellation.consumer_tag, "consumer registration removed");
                    self.callbacks.remove(&cancellation.consumer_tag);
                    Ok(())
                }
            };
            if let Err(err) = outcome {
                if !batch.is_empty() {
                    self.shared.requeue_front(self.channel_id, batch);
                }
                return Err(err);
            }
        }

        Ok(dispatched)
    }

    /// Block dispatching events until every consumer has been cancelled.
    ///
    /// `idle_wait` bounds how long each pass waits for new events before
    /// re-checking the consumer set.
    pub fn run_dispatch(&mut self, idle_wait: Duration) -> Result<()> {
        while self.has_consumers() {
            self.process_events(Some(idle_wait))?;
        }
        Ok(())
    }

    fn dispatch_delivery(&mut self, event: DeliveryEvent) -> Result<()> {
        let tag = event.delivery.consumer_tag.clone();
        let Some(mut callback) = self.callbacks.remove(&tag) else {
            // The delivery raced a cancellation; the broker has already
            // stopped routing to this consumer.
            debug!(consumer_tag = %tag, "dropping delivery for unregistered consumer");
            return Ok(());
        };

        let outcome = callback(self, &event.delivery, &event.properties, event.body.as_ref());
        self.callbacks.insert(tag.clone(), callback);
        outcome.map_err(|source| BrokerError::Callback {
            consumer_tag: tag,
            source,
        })
    }
}

impl std::fmt::Debug for RawChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawChannel")
            .field("channel_id", &self.channel_id)
            .field("consumers", &self.callbacks.len())
            .finish()
    }
}

impl Drop for RawChannel {
    fn drop(&mut self) {
        self.shared.unregister_channel(self.channel_id);
    }
}
