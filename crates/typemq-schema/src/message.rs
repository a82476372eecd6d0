use std::any::TypeId;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, SchemaError};

/// A typed message payload with a canonical wire form.
///
/// Implementors are plain serde structs; every field's presence and type is
/// enforced when a payload is decoded, never lazily. The wire form is a
/// UTF-8 JSON object keyed by field names, so `decode(encode(x))`
/// reproduces `x` for every valid message.
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use typemq_schema::Message;
///
/// #[derive(Debug, PartialEq, Serialize, Deserialize)]
/// struct Greeting {
///     text: String,
/// }
///
/// impl Message for Greeting {}
///
/// let original = Greeting { text: "hello".to_string() };
/// let wire = original.encode().unwrap();
/// assert_eq!(Greeting::decode(&wire).unwrap(), original);
/// ```
pub trait Message: Serialize + DeserializeOwned + 'static {
    /// Diagnostic name for this schema.
    fn schema_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Serialize into the canonical wire form.
    ///
    /// Field order follows struct declaration order, so the encoding is
    /// deterministic for a given message value.
    fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|source| SchemaError::Encode {
            schema: Self::schema_name(),
            source,
        })
    }

    /// Parse and validate a wire payload.
    ///
    /// Fails with [`SchemaError::Validation`] when the payload is not valid
    /// JSON or any field is missing or mistyped. A decoded message is fully
    /// valid; there is no default-filling of absent fields.
    fn decode(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|err| SchemaError::Validation {
            schema: Self::schema_name(),
            detail: err.to_string(),
        })
    }
}

/// Runtime identity of a message schema.
///
/// A registry entry binds a queue to a descriptor; publish and consume
/// compare the caller's message type against it to reject mismatched
/// payloads before they reach the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaDescriptor {
    id: TypeId,
    name: &'static str,
}

impl SchemaDescriptor {
    /// Descriptor for a message type.
    pub fn of<M: Message>() -> Self {
        Self {
            id: TypeId::of::<M>(),
            name: M::schema_name(),
        }
    }

    /// Diagnostic schema name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this descriptor identifies the message type `M`.
    pub fn describes<M: Message>(&self) -> bool {
        self.id == TypeId::of::<M>()
    }
}

impl std::fmt::Display for SchemaDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Text {
        text: String,
    }

    impl Message for Text {}

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        value: i64,
        elements: Vec<String>,
    }

    impl Message for Payload {}

    #[test]
    fn encode_decode_roundtrip() {
        let data = Payload {
            value: 5,
            elements: vec!["a".to_string(), "b".to_string()],
        };

        let encoded = data.encode().expect("payload should encode");
        assert_eq!(encoded, br#"{"value":5,"elements":["a","b"]}"#);

        let decoded = Payload::decode(&encoded).expect("payload should decode");
        assert_eq!(decoded, data);
    }

    #[test]
    fn decode_missing_field_fails() {
        let err = Payload::decode(br#"{"value":5}"#).unwrap_err();
        match err {
            SchemaError::Validation { detail, .. } => {
                assert!(detail.contains("elements"), "detail was: {detail}");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn decode_mistyped_field_fails() {
        let err = Payload::decode(br#"{"value":"five","elements":[]}"#).unwrap_err();
        assert!(matches!(err, SchemaError::Validation { .. }));
    }

    #[test]
    fn decode_rejects_non_json() {
        let err = Text::decode(b"not-json").unwrap_err();
        assert!(matches!(err, SchemaError::Validation { .. }));
    }

    #[test]
    fn decode_never_default_fills() {
        // An empty object must not become Text { text: "" }.
        assert!(Text::decode(b"{}").is_err());
    }

    #[test]
    fn descriptor_identity() {
        let text = SchemaDescriptor::of::<Text>();
        let payload = SchemaDescriptor::of::<Payload>();

        assert_eq!(text, SchemaDescriptor::of::<Text>());
        assert_ne!(text, payload);
        assert!(text.describes::<Text>());
        assert!(!text.describes::<Payload>());
        assert!(text.name().ends_with("Text"));
    }
}
