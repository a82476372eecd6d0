use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use typemq_broker::{
    BrokerError, Connection, ConsumeOptions, ConsumerTag, DeclareOk, Delivery, DispatchError,
    MessageProperties, PublishOptions, RawChannel, RawDeliveryCallback,
};
use typemq_schema::{Message, QueueEntry, QueueRegistry, SchemaDescriptor};

use crate::context::DeliveryContext;
use crate::error::{ChannelError, Result};

/// A raw channel bound to a queue registry.
///
/// On construction, every queue in the registry is declared durable.
/// [`publish`](Self::publish) and [`consume`](Self::consume) enforce the
/// registry contract (queue membership and schema identity) before any
/// byte reaches the transport; everything else is forwarded to the raw
/// channel unchanged.
///
/// Like the raw channel it wraps, a validated channel is confined to the
/// thread that drives its dispatch loop. Open one per thread from a shared
/// [`Connection`].
#[derive(Debug)]
pub struct ValidatedChannel {
    raw: RawChannel,
    registry: Arc<QueueRegistry>,
}

impl ValidatedChannel {
    /// Open a channel on `connection` bound to `registry`.
    ///
    /// Declares every registry queue durable. Re-declaration with identical
    /// properties is a no-op, so any number of channels can share one
    /// registry; a queue that already exists with different properties
    /// surfaces the transport error unmodified.
    pub fn open(connection: &Connection, registry: Arc<QueueRegistry>) -> Result<Self> {
        if !connection.is_open() {
            return Err(ChannelError::Configuration(
                "connection is closed".to_string(),
            ));
        }

        let mut raw = connection.channel()?;
        for entry in registry.entries() {
            raw.declare_queue(entry.queue_name(), true)?;
        }
        debug!(
            channel_id = raw.channel_id(),
            queues = registry.len(),
            "validated channel opened"
        );

        Ok(Self { raw, registry })
    }

    /// The registry this channel is bound to.
    pub fn registry(&self) -> &QueueRegistry {
        &self.registry
    }

    /// Publish a typed message to a registry queue.
    ///
    /// Fails with [`ChannelError::UnknownQueue`] when `id` is not in the
    /// registry and [`ChannelError::SchemaMismatch`] when `M` is not the
    /// schema bound to it. Nothing reaches the transport on failure.
    pub fn publish<M: Message>(&mut self, id: &str, message: &M) -> Result<()> {
        publish_message(&mut self.raw, &self.registry, id, message, &PublishOptions::json())
    }

    /// Publish with explicit transport options, forwarded verbatim.
    pub fn publish_with_options<M: Message>(
        &mut self,
        id: &str,
        message: &M,
        options: &PublishOptions,
    ) -> Result<()> {
        publish_message(&mut self.raw, &self.registry, id, message, options)
    }

    /// Register a typed consumer on a registry queue.
    ///
    /// The callback receives a [`DeliveryContext`] for publishing or acking
    /// from inside the dispatch loop, the delivery metadata, the message
    /// properties, and the decoded payload. Each delivery is decoded and
    /// validated against `M` before the callback runs; a payload that fails
    /// validation never reaches the callback and surfaces as
    /// [`SchemaError::Validation`](typemq_schema::SchemaError::Validation)
    /// from the dispatch call instead.
    ///
    /// Transport options are forwarded verbatim; when `auto_ack` is off,
    /// acknowledging each delivery remains the callback's responsibility.
    pub fn consume<M, F>(&mut self, id: &str, options: ConsumeOptions, mut callback: F) -> Result<ConsumerTag>
    where
        M: Message,
        F: FnMut(&mut DeliveryContext<'_>, &Delivery, &MessageProperties, M) -> Result<()>
            + 'static,
    {
        let entry = checked_entry::<M>(&self.registry, id)?;
        let queue_name = entry.queue_name().to_string();

        let registry = Arc::clone(&self.registry);
        let wrapped: RawDeliveryCallback = Box::new(
            move |raw: &mut RawChannel,
                  delivery: &Delivery,
                  properties: &MessageProperties,
                  body: &[u8]|
                  -> std::result::Result<(), DispatchError> {
                let message = M::decode(body).map_err(ChannelError::Schema)?;
                let mut context = DeliveryContext::new(raw, &registry);
                callback(&mut context, delivery, properties, message)?;
                Ok(())
            },
        );

        Ok(self.raw.consume(&queue_name, options, wrapped)?)
    }

    // The operations below are not part of the typed surface; they forward
    // to the wrapped raw channel and preserve its contract exactly.

    /// Declare a queue directly on the raw channel.
    pub fn declare_queue(&mut self, queue: &str, durable: bool) -> Result<DeclareOk> {
        Ok(self.raw.declare_queue(queue, durable)?)
    }

    /// Acknowledge a delivery received on this channel.
    pub fn ack(&mut self, delivery_tag: u64) -> Result<()> {
        Ok(self.raw.ack(delivery_tag)?)
    }

    /// Cancel a consumer.
    pub fn cancel(&mut self, consumer_tag: &ConsumerTag) -> Result<()> {
        Ok(self.raw.cancel(consumer_tag)?)
    }

    /// Whether any consumer is still registered on this channel.
    pub fn has_consumers(&self) -> bool {
        self.raw.has_consumers()
    }

    /// Number of registered consumers.
    pub fn consumer_count(&self) -> usize {
        self.raw.consumer_count()
    }

    /// Dispatch pending events on the calling thread.
    ///
    /// Same contract as the raw loop, except that validation failures and
    /// consumer callback errors come back as [`ChannelError`] rather than a
    /// boxed transport error.
    pub fn process_events(&mut self, wait: Option<Duration>) -> Result<usize> {
        self.raw.process_events(wait).map_err(reclassify)
    }

    /// Block dispatching events until every consumer has been cancelled.
    pub fn run_dispatch(&mut self, idle_wait: Duration) -> Result<()> {
        while self.has_consumers() {
            self.process_events(Some(idle_wait))?;
        }
        Ok(())
    }

    /// Borrow the wrapped raw channel.
    pub fn raw(&self) -> &RawChannel {
        &self.raw
    }

    /// Mutably borrow the wrapped raw channel.
    pub fn raw_mut(&mut self) -> &mut RawChannel {
        &mut self.raw
    }

    /// Consume the wrapper and return the raw channel.
    pub fn into_raw(self) -> RawChannel {
        self.raw
    }
}

/// Look up `id` and require that `M` is the schema bound to it.
pub(crate) fn checked_entry<'r, M: Message>(
    registry: &'r QueueRegistry,
    id: &str,
) -> Result<&'r QueueEntry> {
    let entry = registry.lookup(id)?;
    let actual = SchemaDescriptor::of::<M>();
    if entry.schema() != actual {
        return Err(ChannelError::SchemaMismatch {
            id: id.to_string(),
            expected: entry.schema().name(),
            actual: actual.name(),
        });
    }
    Ok(entry)
}

/// Validate, encode, and hand a message to the raw publish primitive.
pub(crate) fn publish_message<M: Message>(
    raw: &mut RawChannel,
    registry: &QueueRegistry,
    id: &str,
    message: &M,
    options: &PublishOptions,
) -> Result<()> {
    let entry = checked_entry::<M>(registry, id)?;
    let body = message.encode()?;
    raw.publish(entry.queue_name(), &body, options)?;
    Ok(())
}

/// Surface callback failures as their original [`ChannelError`] when the
/// boxed dispatch error carries one.
fn reclassify(err: BrokerError) -> ChannelError {
    match err {
        BrokerError::Callback {
            consumer_tag,
            source,
        } => match source.downcast::<ChannelError>() {
            Ok(channel_error) => *channel_error,
            Err(source) => ChannelError::Broker(BrokerError::Callback {
                consumer_tag,
                source,
            }),
        },
        other => ChannelError::Broker(other),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde::{Deserialize, Serialize};
    use typemq_broker::Broker;
    use typemq_schema::SchemaError;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Text {
        text: String,
    }

    impl Message for Text {}

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Payload {
        value: i64,
        elements: Vec<String>,
    }

    impl Message for Payload {}

    fn sample_registry() -> Arc<QueueRegistry> {
        Arc::new(
            QueueRegistry::builder()
                .queue::<Text>("MESSAGE", "m")
                .queue::<Payload>("DATA", "d")
                .build()
                .expect("sample registry should build"),
        )
    }

    #[test]
    fn open_declares_every_registry_queue() {
        let broker = Broker::new();
        let connection = broker.connect();
        let mut channel = ValidatedChannel::open(&connection, sample_registry())
            .expect("channel should open");

        // Identical re-declaration must succeed for each queue.
        for queue in ["m", "d"] {
            let ok = channel.declare_queue(queue, true).expect("redeclare");
            assert_eq!(ok.queue, queue);
        }
    }

    #[test]
    fn open_on_closed_connection_is_a_configuration_error() {
        let broker = Broker::new();
        let connection = broker.connect();
        connection.close();

        let err = ValidatedChannel::open(&connection, sample_registry()).unwrap_err();
        assert!(matches!(err, ChannelError::Configuration(_)));
    }

    #[test]
    fn second_channel_on_same_registry_succeeds() {
        let broker = Broker::new();
        let connection = broker.connect();
        let registry = sample_registry();

        let _first = ValidatedChannel::open(&connection, registry.clone())
            .expect("first channel should open");
        let _second = ValidatedChannel::open(&connection, registry)
            .expect("second channel should re-declare without error");
    }

    #[test]
    fn conflicting_pre_declaration_surfaces_transport_error() {
        let broker = Broker::new();
        let connection = broker.connect();
        let mut raw = connection.channel().expect("raw channel");
        raw.declare_queue("m", false).expect("non-durable declare");

        let err = ValidatedChannel::open(&connection, sample_registry()).unwrap_err();
        assert!(matches!(
            err,
            ChannelError::Broker(BrokerError::DeclareConflict { .. })
        ));
    }

    #[test]
    fn publish_to_unknown_identifier_fails() {
        let broker = Broker::new();
        let connection = broker.connect();
        let mut channel = ValidatedChannel::open(&connection, sample_registry())
            .expect("channel should open");

        let err = channel
            .publish("MISSING", &Text { text: "x".to_string() })
            .unwrap_err();
        assert!(matches!(err, ChannelError::UnknownQueue { id } if id == "MISSING"));
    }

    #[test]
    fn publish_with_wrong_type_fails_without_side_effect() {
        let broker = Broker::new();
        let connection = broker.connect();
        let mut channel = ValidatedChannel::open(&connection, sample_registry())
            .expect("channel should open");

        let err = channel
            .publish("MESSAGE", &Payload { value: 1, elements: vec![] })
            .unwrap_err();
        match err {
            ChannelError::SchemaMismatch { id, expected, actual } => {
                assert_eq!(id, "MESSAGE");
                assert!(expected.ends_with("Text"));
                assert!(actual.ends_with("Payload"));
            }
            other => panic!("expected schema mismatch, got {other:?}"),
        }

        // Nothing reached the transport.
        let ok = channel.declare_queue("m", true).expect("redeclare");
        assert_eq!(ok.message_count, 0);
    }

    #[test]
    fn consume_with_wrong_type_fails() {
        let broker = Broker::new();
        let connection = broker.connect();
        let mut channel = ValidatedChannel::open(&connection, sample_registry())
            .expect("channel should open");

        let err = channel
            .consume::<Text, _>("DATA", ConsumeOptions::auto_ack(), |_, _, _, _| Ok(()))
            .unwrap_err();
        assert!(matches!(err, ChannelError::SchemaMismatch { id, .. } if id == "DATA"));
    }

    #[test]
    fn consumer_receives_decoded_message() {
        let broker = Broker::new();
        let connection = broker.connect();
        let mut channel = ValidatedChannel::open(&connection, sample_registry())
            .expect("channel should open");

        let received: Rc<RefCell<Vec<Text>>> = Rc::new(RefCell::new(Vec::new()));
        let received_in_callback = received.clone();
        channel
            .consume::<Text, _>(
                "MESSAGE",
                ConsumeOptions::auto_ack(),
                move |_context, _delivery, _properties, message| {
                    received_in_callback.borrow_mut().push(message);
                    Ok(())
                },
            )
            .expect("consume");

        channel
            .publish("MESSAGE", &Text { text: "hello".to_string() })
            .expect("publish");
        channel.process_events(None).expect("dispatch");

        assert_eq!(
            received.borrow().as_slice(),
            [Text { text: "hello".to_string() }]
        );
    }

    #[test]
    fn invalid_payload_surfaces_validation_and_skips_callback() {
        let broker = Broker::new();
        let connection = broker.connect();
        let mut channel = ValidatedChannel::open(&connection, sample_registry())
            .expect("channel should open");

        let received: Rc<RefCell<Vec<Text>>> = Rc::new(RefCell::new(Vec::new()));
        let received_in_callback = received.clone();
        channel
            .consume::<Text, _>(
                "MESSAGE",
                ConsumeOptions::auto_ack(),
                move |_, _, _, message| {
                    received_in_callback.borrow_mut().push(message);
                    Ok(())
                },
            )
            .expect("consume");

        // Bypass the typed surface to inject a payload that violates the
        // schema, then a conforming one behind it.
        channel
            .raw_mut()
            .publish("m", br#"{"wrong":true}"#, &PublishOptions::default())
            .expect("raw publish");
        channel
            .publish("MESSAGE", &Text { text: "good".to_string() })
            .expect("publish");

        let err = channel.process_events(None).unwrap_err();
        assert!(matches!(
            err,
            ChannelError::Schema(SchemaError::Validation { .. })
        ));
        assert!(received.borrow().is_empty());

        // The loop keeps working for the next message.
        channel.process_events(None).expect("dispatch");
        assert_eq!(
            received.borrow().as_slice(),
            [Text { text: "good".to_string() }]
        );
    }

    #[test]
    fn callback_can_republish_typed_messages() {
        let broker = Broker::new();
        let connection = broker.connect();
        let mut channel = ValidatedChannel::open(&connection, sample_registry())
            .expect("channel should open");

        let notes: Rc<RefCell<Vec<Text>>> = Rc::new(RefCell::new(Vec::new()));
        let notes_in_callback = notes.clone();
        channel
            .consume::<Text, _>(
                "MESSAGE",
                ConsumeOptions::auto_ack(),
                move |_, _, _, message| {
                    notes_in_callback.borrow_mut().push(message);
                    Ok(())
                },
            )
            .expect("consume MESSAGE");
        channel
            .consume::<Payload, _>(
                "DATA",
                ConsumeOptions::auto_ack(),
                |context, _, _, payload| {
                    context.publish(
                        "MESSAGE",
                        &Text {
                            text: format!("processed {}", payload.value),
                        },
                    )
                },
            )
            .expect("consume DATA");

        channel
            .publish("DATA", &Payload { value: 25, elements: vec!["a".to_string()] })
            .expect("publish");

        channel.process_events(None).expect("first dispatch");
        channel.process_events(None).expect("second dispatch");
        assert_eq!(
            notes.borrow().as_slice(),
            [Text { text: "processed 25".to_string() }]
        );
    }

    #[test]
    fn republishing_to_wrong_queue_from_callback_is_rejected() {
        let broker = Broker::new();
        let connection = broker.connect();
        let mut channel = ValidatedChannel::open(&connection, sample_registry())
            .expect("channel should open");

        channel
            .consume::<Payload, _>(
                "DATA",
                ConsumeOptions::auto_ack(),
                |context, _, _, payload| {
                    // MESSAGE carries Text, not Payload.
                    context.publish("MESSAGE", &payload)
                },
            )
            .expect("consume");

        channel
            .publish("DATA", &Payload { value: 1, elements: vec![] })
            .expect("publish");

        let err = channel.process_events(None).unwrap_err();
        assert!(matches!(err, ChannelError::SchemaMismatch { .. }));
    }

    #[test]
    fn delegated_ack_matches_raw_behavior() {
        let broker = Broker::new();
        let connection = broker.connect();
        let mut channel = ValidatedChannel::open(&connection, sample_registry())
            .expect("channel should open");

        let tags: Rc<RefCell<Vec<u64>>> = Rc::new(RefCell::new(Vec::new()));
        let tags_in_callback = tags.clone();
        channel
            .consume::<Text, _>(
                "MESSAGE",
                ConsumeOptions::default(),
                move |_, delivery, _, _| {
                    tags_in_callback.borrow_mut().push(delivery.delivery_tag);
                    Ok(())
                },
            )
            .expect("consume");

        channel
            .publish("MESSAGE", &Text { text: "ack me".to_string() })
            .expect("publish");
        channel.process_events(None).expect("dispatch");

        let tag = tags.borrow()[0];
        channel.ack(tag).expect("ack through the validated channel");
        assert!(matches!(
            channel.ack(tag).unwrap_err(),
            ChannelError::Broker(BrokerError::UnknownDeliveryTag(t)) if t == tag
        ));
    }

    #[test]
    fn cancel_through_validated_channel_stops_consumer() {
        let broker = Broker::new();
        let connection = broker.connect();
        let mut channel = ValidatedChannel::open(&connection, sample_registry())
            .expect("channel should open");

        let tag = channel
            .consume::<Text, _>("MESSAGE", ConsumeOptions::auto_ack(), |_, _, _, _| Ok(()))
            .expect("consume");
        assert!(channel.has_consumers());

        channel.cancel(&tag).expect("cancel");
        channel.process_events(None).expect("dispatch");
        assert!(!channel.has_consumers());
    }
}
