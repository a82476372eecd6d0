use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;
use typemq_broker::{Broker, ConsumeOptions};
use typemq_channel::ValidatedChannel;
use typemq_schema::{Message, QueueRegistry};

use crate::cmd::DemoArgs;
use crate::exit::{channel_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_received, OutputFormat};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Note {
    pub title: String,
    pub text: String,
}

impl Message for Note {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CollectedData {
    pub counter: u32,
    pub data: Vec<String>,
}

impl Message for CollectedData {}

pub(crate) const NOTES: &str = "NOTES";
pub(crate) const PROCESS_DATA: &str = "PROCESS_DATA";

pub(crate) fn demo_registry() -> CliResult<Arc<QueueRegistry>> {
    let registry = QueueRegistry::builder()
        .queue::<Note>(NOTES, "demo.notes")
        .queue::<CollectedData>(PROCESS_DATA, "demo.process")
        .build()
        .map_err(|err| CliError::new(INTERNAL, format!("registry definition invalid: {err}")))?;
    Ok(Arc::new(registry))
}

/// Publish a batch of jobs and drive both consumers to completion, all in
/// one process: the data consumer republishes a completion note for every
/// job it handles.
pub fn run(args: DemoArgs, format: OutputFormat) -> CliResult<i32> {
    let broker = Broker::new();
    let connection = broker.connect();
    let mut channel = ValidatedChannel::open(&connection, demo_registry()?)
        .map_err(|err| channel_error("channel open failed", err))?;

    let options = if args.manual_ack {
        ConsumeOptions::default()
    } else {
        ConsumeOptions::auto_ack()
    };
    let manual_ack = args.manual_ack;

    channel
        .consume::<Note, _>(NOTES, options, move |context, delivery, _properties, note| {
            let payload = serde_json::to_value(&note).unwrap_or(serde_json::Value::Null);
            print_received(NOTES, &payload, format);
            if manual_ack {
                context.ack(delivery.delivery_tag)?;
            }
            Ok(())
        })
        .map_err(|err| channel_error("consume failed", err))?;

    channel
        .consume::<CollectedData, _>(
            PROCESS_DATA,
            options,
            move |context, delivery, _properties, data| {
                let payload = serde_json::to_value(&data).unwrap_or(serde_json::Value::Null);
                print_received(PROCESS_DATA, &payload, format);
                context.publish(
                    NOTES,
                    &Note {
                        title: "processed".to_string(),
                        text: format!("job {} complete", data.counter),
                    },
                )?;
                if manual_ack {
                    context.ack(delivery.delivery_tag)?;
                }
                Ok(())
            },
        )
        .map_err(|err| channel_error("consume failed", err))?;

    for counter in 1..=args.jobs {
        let job = CollectedData {
            counter,
            data: vec![format!("sample-{counter}")],
        };
        channel
            .publish(PROCESS_DATA, &job)
            .map_err(|err| channel_error("publish failed", err))?;
    }

    // Drain dispatch passes until one moves nothing; the completion notes
    // republished by the data consumer arrive on the second pass.
    let mut total = 0usize;
    loop {
        let dispatched = channel
            .process_events(Some(Duration::from_millis(20)))
            .map_err(|err| channel_error("dispatch failed", err))?;
        if dispatched == 0 {
            break;
        }
        total += dispatched;
    }

    info!(jobs = args.jobs, events = total, "demo complete");
    Ok(SUCCESS)
}
