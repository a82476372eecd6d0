use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, info};

use crate::channel::RawChannel;
use crate::error::{BrokerError, Result};
use crate::event::{
    CancellationEvent, ChannelEvent, ConsumerTag, DeclareOk, Delivery, DeliveryEvent,
    MessageProperties,
};
use crate::options::{ConsumeOptions, PublishOptions};

/// A message sitting in a queue backlog or awaiting acknowledgement.
#[derive(Debug, Clone)]
struct QueuedMessage {
    properties: MessageProperties,
    body: Bytes,
    redelivered: bool,
}

/// One registered consumer, from the broker's point of view.
#[derive(Debug, Clone)]
struct QueueConsumer {
    channel_id: u64,
    tag: ConsumerTag,
    auto_ack: bool,
}

#[derive(Debug)]
struct QueueState {
    durable: bool,
    backlog: VecDeque<QueuedMessage>,
    /// Rotated front-to-back for round-robin routing.
    consumers: VecDeque<QueueConsumer>,
}

#[derive(Debug)]
struct ChannelState {
    mailbox: VecDeque<ChannelEvent>,
    next_delivery_tag: u64,
    next_consumer_sequence: u64,
    /// delivery tag -> (queue name, message), for requeue on channel close.
    unacked: BTreeMap<u64, (String, QueuedMessage)>,
}

impl ChannelState {
    fn new() -> Self {
        Self {
            mailbox: VecDeque::new(),
            next_delivery_tag: 1,
            next_consumer_sequence: 0,
            unacked: BTreeMap::new(),
        }
    }
}

#[derive(Debug)]
struct SharedState {
    open: bool,
    queues: BTreeMap<String, QueueState>,
    channels: BTreeMap<u64, ChannelState>,
    next_channel_id: u64,
}

/// Broker state shared between connections and channels.
#[derive(Debug)]
pub(crate) struct Shared {
    state: Mutex<SharedState>,
    events_ready: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register_channel(&self) -> Result<u64> {
        let mut state = self.lock();
        if !state.open {
            return Err(BrokerError::ConnectionClosed);
        }
        let channel_id = state.next_channel_id;
        state.next_channel_id += 1;
        state.channels.insert(channel_id, ChannelState::new());
        debug!(channel_id, "channel opened");
        Ok(channel_id)
    }

    pub(crate) fn unregister_channel(&self, channel_id: u64) {
        let mut state = self.lock();
        let Some(channel) = state.channels.remove(&channel_id) else {
            return;
        };

        // Requeue unacknowledged deliveries at the front, oldest first.
        let mut touched = Vec::new();
        let unacked: Vec<_> = channel.unacked.into_values().collect();
        for (queue_name, message) in unacked.into_iter().rev() {
            if let Some(queue) = state.queues.get_mut(&queue_name) {
                queue.backlog.push_front(QueuedMessage {
                    redelivered: true,
                    ..message
                });
                touched.push(queue_name);
            }
        }

        for queue in state.queues.values_mut() {
            queue
                .consumers
                .retain(|consumer| consumer.channel_id != channel_id);
        }
        for queue_name in touched {
            drain_queue(&mut state, &queue_name);
        }

        drop(state);
        self.events_ready.notify_all();
        debug!(channel_id, "channel closed");
    }

    pub(crate) fn declare_queue(&self, queue: &str, durable: bool) -> Result<DeclareOk> {
        let mut state = self.lock();
        if !state.open {
            return Err(BrokerError::ConnectionClosed);
        }

        if let Some(existing) = state.queues.get(queue) {
            if existing.durable != durable {
                return Err(BrokerError::DeclareConflict {
                    queue: queue.to_string(),
                    existing: existing.durable,
                });
            }
            return Ok(DeclareOk {
                queue: queue.to_string(),
                message_count: existing.backlog.len(),
                consumer_count: existing.consumers.len(),
            });
        }

        state.queues.insert(
            queue.to_string(),
            QueueState {
                durable,
                backlog: VecDeque::new(),
                consumers: VecDeque::new(),
            },
        );
        info!(queue = %queue, durable, "queue declared");
        Ok(DeclareOk {
            queue: queue.to_string(),
            message_count: 0,
            consumer_count: 0,
        })
    }

    pub(crate) fn publish(
        &self,
        routing_key: &str,
        body: &[u8],
        options: &PublishOptions,
    ) -> Result<()> {
        let mut state = self.lock();
        if !state.open {
            return Err(BrokerError::ConnectionClosed);
        }
        let Some(queue) = state.queues.get_mut(routing_key) else {
            return Err(BrokerError::QueueNotDeclared {
                queue: routing_key.to_string(),
            });
        };

        queue.backlog.push_back(QueuedMessage {
            properties: options.properties.clone(),
            body: Bytes::copy_from_slice(body),
            redelivered: false,
        });
        drain_queue(&mut state, routing_key);

        drop(state);
        self.events_ready.notify_all();
        Ok(())
    }

    pub(crate) fn consume(
        &self,
        channel_id: u64,
        queue: &str,
        options: ConsumeOptions,
    ) -> Result<ConsumerTag> {
        let mut state = self.lock();
        if !state.open {
            return Err(BrokerError::ConnectionClosed);
        }
        if !state.queues.contains_key(queue) {
            return Err(BrokerError::QueueNotDeclared {
                queue: queue.to_string(),
            });
        }
        let Some(channel) = state.channels.get_mut(&channel_id) else {
            return Err(BrokerError::ConnectionClosed);
        };

        let tag = ConsumerTag::new(channel_id, channel.next_consumer_sequence);
        channel.next_consumer_sequence += 1;

        let consumer = QueueConsumer {
            channel_id,
            tag: tag.clone(),
            auto_ack: options.auto_ack,
        };
        if let Some(queue_state) = state.queues.get_mut(queue) {
            queue_state.consumers.push_back(consumer);
        }
        drain_queue(&mut state, queue);

        drop(state);
        self.events_ready.notify_all();
        debug!(consumer_tag = %tag, queue = %queue, auto_ack = options.auto_ack, "consumer registered");
        Ok(tag)
    }

    pub(crate) fn cancel(&self, channel_id: u64, consumer_tag: &ConsumerTag) -> Result<()> {
        let mut state = self.lock();
        if !state.open {
            return Err(BrokerError::ConnectionClosed);
        }

        let mut found = false;
        for queue in state.queues.values_mut() {
            let before = queue.consumers.len();
            queue
                .consumers
                .retain(|c| c.channel_id != channel_id || c.tag != *consumer_tag);
            found |= queue.consumers.len() != before;
        }
        if !found {
            return Err(BrokerError::UnknownConsumerTag(consumer_tag.clone()));
        }

        if let Some(channel) = state.channels.get_mut(&channel_id) {
            channel
                .mailbox
                .push_back(ChannelEvent::Cancellation(CancellationEvent {
                    consumer_tag: consumer_tag.clone(),
                }));
        }

        drop(state);
        self.events_ready.notify_all();
        debug!(consumer_tag = %consumer_tag, "consumer cancelled");
        Ok(())
    }

    pub(crate) fn ack(&self, channel_id: u64, delivery_tag: u64) -> Result<()> {
        let mut state = self.lock();
        if !state.open {
            return Err(BrokerError::ConnectionClosed);
        }
        let Some(channel) = state.channels.get_mut(&channel_id) else {
            return Err(BrokerError::ConnectionClosed);
        };
        if channel.unacked.remove(&delivery_tag).is_none() {
            return Err(BrokerError::UnknownDeliveryTag(delivery_tag));
        }
        Ok(())
    }

    /// Take every event currently queued for the channel, waiting up to
    /// `wait` when the mailbox is empty.
    ///
    /// Returns an empty queue when nothing arrived within the wait budget.
    /// Taking a snapshot (rather than popping one event at a time) keeps
    /// messages published from inside a callback out of the dispatch pass
    /// that produced them.
    pub(crate) fn take_pending(
        &self,
        channel_id: u64,
        wait: Option<Duration>,
    ) -> Result<VecDeque<ChannelEvent>> {
        let deadline = wait.map(|wait| Instant::now() + wait);
        let mut state = self.lock();
        loop {
            if let Some(channel) = state.channels.get_mut(&channel_id) {
                if !channel.mailbox.is_empty() {
                    return Ok(std::mem::take(&mut channel.mailbox));
                }
            }
            if !state.open {
                return Err(BrokerError::ConnectionClosed);
            }
            let Some(deadline) = deadline else {
                return Ok(VecDeque::new());
            };
            let now = Instant::now();
            if now >= deadline {
                return Ok(VecDeque::new());
            }
            state = self
                .events_ready
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Put undispatched events back at the head of the mailbox, ahead of
    /// anything that arrived in the meantime.
    pub(crate) fn requeue_front(&self, channel_id: u64, mut events: VecDeque<ChannelEvent>) {
        let mut state = self.lock();
        if let Some(channel) = state.channels.get_mut(&channel_id) {
            while let Some(event) = events.pop_back() {
                channel.mailbox.push_front(event);
            }
        }
    }

    pub(crate) fn close(&self) {
        let mut state = self.lock();
        if state.open {
            state.open = false;
            info!("connection closed");
        }
        drop(state);
        self.events_ready.notify_all();
    }

    pub(crate) fn is_open(&self) -> bool {
        self.lock().open
    }
}

/// Route backlog messages to registered consumers, round-robin.
///
/// Stops when the backlog is empty or no live consumer remains.
fn drain_queue(state: &mut SharedState, queue_name: &str) {
    let SharedState {
        queues, channels, ..
    } = state;
    let Some(queue) = queues.get_mut(queue_name) else {
        return;
    };

    while !queue.backlog.is_empty() {
        let mut routed = false;

        for _ in 0..queue.consumers.len() {
            let Some(consumer) = queue.consumers.pop_front() else {
                break;
            };
            let Some(channel) = channels.get_mut(&consumer.channel_id) else {
                // Stale registration for a closed channel; drop it.
                continue;
            };
            let Some(message) = queue.backlog.pop_front() else {
                queue.consumers.push_front(consumer);
                return;
            };

            let delivery_tag = channel.next_delivery_tag;
            channel.next_delivery_tag += 1;

            if !consumer.auto_ack {
                channel
                    .unacked
                    .insert(delivery_tag, (queue_name.to_string(), message.clone()));
            }
            channel
                .mailbox
                .push_back(ChannelEvent::Delivery(DeliveryEvent {
                    delivery: Delivery {
                        consumer_tag: consumer.tag.clone(),
                        delivery_tag,
                        queue: queue_name.to_string(),
                        redelivered: message.redelivered,
                    },
                    properties: message.properties,
                    body: message.body,
                }));

            queue.consumers.push_back(consumer);
            routed = true;
            break;
        }

        if !routed {
            return;
        }
    }
}

/// In-process message broker.
///
/// Stands in for an external broker process: it owns the queue table and
/// routes published messages to registered consumers. Connections obtained
/// with [`Broker::connect`] are cheap handles onto the same broker.
#[derive(Debug, Clone)]
pub struct Broker {
    shared: Arc<Shared>,
}

impl Broker {
    /// Start an empty broker.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SharedState {
                    open: true,
                    queues: BTreeMap::new(),
                    channels: BTreeMap::new(),
                    next_channel_id: 1,
                }),
                events_ready: Condvar::new(),
            }),
        }
    }

    /// Open a connection to this broker.
    pub fn connect(&self) -> Connection {
        Connection {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

/// A connection to the broker; the factory for channels.
///
/// The handle is `Send + Sync` and may be cloned freely, but each
/// [`RawChannel`] it opens is confined to the thread that drives it.
#[derive(Debug, Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    /// Open a new channel on this connection.
    pub fn channel(&self) -> Result<RawChannel> {
        let channel_id = self.shared.register_channel()?;
        Ok(RawChannel::new(channel_id, Arc::clone(&self.shared)))
    }

    /// Whether the connection is still open.
    pub fn is_open(&self) -> bool {
        self.shared.is_open()
    }

    /// Close the connection. Channel operations fail afterwards.
    pub fn close(&self) {
        self.shared.close();
    }
}
