//! A simple producer and consumer where the consumer acknowledges each
//! delivery explicitly.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use typemq::broker::{Broker, ConsumeOptions};
use typemq::channel::ValidatedChannel;
use typemq::schema::{Message, QueueRegistry};

#[derive(Debug, Serialize, Deserialize)]
struct MyMessage {
    title: String,
    text: String,
}

impl Message for MyMessage {}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let registry = Arc::new(
        QueueRegistry::builder()
            .queue::<MyMessage>("MESSAGE", "example.messages")
            .build()?,
    );

    let broker = Broker::new();
    let connection = broker.connect();
    let mut channel = ValidatedChannel::open(&connection, registry)?;

    // auto_ack is off by default: the delivery stays unacknowledged until
    // the callback settles it through the context.
    channel.consume::<MyMessage, _>(
        "MESSAGE",
        ConsumeOptions::default(),
        |context, delivery, _properties, message| {
            println!(
                "I received a message with title ({}) and text ({}).",
                message.title, message.text
            );
            context.ack(delivery.delivery_tag)
        },
    )?;

    channel.publish(
        "MESSAGE",
        &MyMessage {
            title: "Important".to_string(),
            text: "Remember to water the plants".to_string(),
        },
    )?;

    channel.process_events(None)?;
    Ok(())
}
