use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::RegistryError;
use crate::message::{Message, SchemaDescriptor};

/// One queue binding: symbolic identifier, transport queue name, schema.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    id: String,
    queue_name: String,
    schema: SchemaDescriptor,
}

impl QueueEntry {
    /// Symbolic identifier used by application code.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Queue name used on the wire.
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Schema bound to this queue.
    pub fn schema(&self) -> SchemaDescriptor {
        self.schema
    }
}

/// A closed, immutable mapping from queue identifiers to (queue name,
/// schema) pairs.
///
/// Built once at application start-up and shared read-only from then on;
/// any number of channels may reference the same registry.
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use typemq_schema::{Message, QueueRegistry};
///
/// #[derive(Serialize, Deserialize)]
/// struct Note {
///     text: String,
/// }
///
/// impl Message for Note {}
///
/// let registry = QueueRegistry::builder()
///     .queue::<Note>("NOTES", "app.notes")
///     .build()
///     .unwrap();
/// assert!(registry.contains("NOTES"));
/// ```
#[derive(Debug)]
pub struct QueueRegistry {
    entries: Vec<QueueEntry>,
    by_id: BTreeMap<String, usize>,
}

impl QueueRegistry {
    /// Start declaring a registry.
    pub fn builder() -> QueueRegistryBuilder {
        QueueRegistryBuilder {
            entries: Vec::new(),
        }
    }

    /// All entries in declaration order.
    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    /// Transport queue names, index-aligned with [`entries`](Self::entries).
    pub fn queue_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.queue_name()).collect()
    }

    /// Bound schemas, index-aligned with [`entries`](Self::entries).
    pub fn schemas(&self) -> Vec<SchemaDescriptor> {
        self.entries.iter().map(|e| e.schema()).collect()
    }

    /// Whether the identifier is part of this registry.
    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Look up an entry by identifier.
    pub fn lookup(&self, id: &str) -> Result<&QueueEntry, RegistryError> {
        self.by_id
            .get(id)
            .map(|&index| &self.entries[index])
            .ok_or_else(|| RegistryError::UnknownQueue { id: id.to_string() })
    }

    /// Number of declared queues.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry declares no queues.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Accumulates queue declarations for a [`QueueRegistry`].
#[derive(Debug)]
pub struct QueueRegistryBuilder {
    entries: Vec<QueueEntry>,
}

impl QueueRegistryBuilder {
    /// Declare a queue carrying messages of type `M`.
    pub fn queue<M: Message>(
        mut self,
        id: impl Into<String>,
        queue_name: impl Into<String>,
    ) -> Self {
        self.entries.push(QueueEntry {
            id: id.into(),
            queue_name: queue_name.into(),
            schema: SchemaDescriptor::of::<M>(),
        });
        self
    }

    /// Finalize the registry.
    ///
    /// Identifiers must be unique. Transport queue names must be unique as
    /// well: two identifiers aliasing one wire queue would make consumer
    /// schema enforcement ambiguous, so the collision is rejected here
    /// instead of surfacing as misrouted messages later.
    pub fn build(self) -> Result<QueueRegistry, RegistryError> {
        let mut by_id = BTreeMap::new();
        let mut seen_names = BTreeSet::new();

        for (index, entry) in self.entries.iter().enumerate() {
            if by_id.insert(entry.id.clone(), index).is_some() {
                return Err(RegistryError::DuplicateIdentifier {
                    id: entry.id.clone(),
                });
            }
            if !seen_names.insert(entry.queue_name.clone()) {
                return Err(RegistryError::DuplicateQueueName {
                    queue_name: entry.queue_name.clone(),
                });
            }
        }

        debug!(queues = self.entries.len(), "queue registry built");
        Ok(QueueRegistry {
            entries: self.entries,
            by_id,
        })
    }
}
