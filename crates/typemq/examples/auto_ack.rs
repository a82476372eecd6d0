//! A simple producer and consumer with a defined message type, consuming
//! with automatic acknowledgement.

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
    // Queue definitions: one queue, carrying MyMessage payloads.
    let registry = Arc::new(
        QueueRegistry::builder()
            .queue::<MyMessage>("MESSAGE", "example.messages")
            .build()?,
    );

    // An in-process broker stands in for an external one.
    let broker = Broker::new();
    let connection = broker.connect();
    let mut channel = ValidatedChannel::open(&connection, registry)?;

    // The consumer receives an already decoded and validated MyMessage.
    channel.consume::<MyMessage, _>(
        "MESSAGE",
        ConsumeOptions::auto_ack(),
        |_context, _delivery, _properties, message| {
            println!(
                "I received a message with title ({}) and text ({}).",
                message.title, message.text
            );
            Ok(())
        },
    )?;

    // Producers publish typed values; encoding and validation are automatic.
    channel.publish(
        "MESSAGE",
        &MyMessage {
            title: "Important".to_string(),
            text: "Remember to feed the dog".to_string(),
        },
    )?;

    // Run one dispatch pass instead of blocking in run_dispatch().
    channel.process_events(None)?;
    Ok(())
}
