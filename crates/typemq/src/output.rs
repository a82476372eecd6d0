use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use typemq_schema::QueueRegistry;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct RegistryEntryOutput {
    id: String,
    queue: String,
    schema: String,
}

#[derive(Serialize)]
struct RegistryOutput {
    schema_id: &'static str,
    entries: Vec<RegistryEntryOutput>,
}

pub fn print_registry(registry: &QueueRegistry, format: OutputFormat) {
    let entries: Vec<RegistryEntryOutput> = registry
        .entries()
        .iter()
        .map(|entry| RegistryEntryOutput {
            id: entry.id().to_string(),
            queue: entry.queue_name().to_string(),
            schema: entry.schema().name().to_string(),
        })
        .collect();

    match format {
        OutputFormat::Json => {
            let out = RegistryOutput {
                schema_id: "https://schemas.typemq.dev/cli/v1/registry.schema.json",
                entries,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ID", "QUEUE", "SCHEMA"]);
            for entry in entries {
                table.add_row(vec![entry.id, entry.queue, entry.schema]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for entry in entries {
                println!("{} -> {} ({})", entry.id, entry.queue, entry.schema);
            }
        }
    }
}

#[derive(Serialize)]
struct ReceivedOutput<'a> {
    schema_id: &'a str,
    queue: &'a str,
    payload: &'a serde_json::Value,
}

pub fn print_received(queue: &str, payload: &serde_json::Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ReceivedOutput {
                schema_id: "https://schemas.typemq.dev/cli/v1/message-received.schema.json",
                queue,
                payload,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["QUEUE", "PAYLOAD"])
                .add_row(vec![queue.to_string(), payload.to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("queue={queue} payload={payload}");
        }
    }
}
