//! Wire codec.
//!
//! Converts typed records to frames and frames back to typed records. The
//! envelope (`type`, optional `id`, remaining fields) is read before any
//! shape is resolved, so an unknown or malformed shape never hides the
//! correlation id of the frame that carried it.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;

use crate::protocol::catalog::{Incoming, Outgoing};
use crate::protocol::registry::{Fields, TypeRegistry};
use crate::protocol::RequestId;
use crate::{Error, Result};

/// Envelope key holding the type name.
pub const TYPE_KEY: &str = "type";

/// Envelope key holding the correlation id.
pub const ID_KEY: &str = "id";

/// Transport-level marshaling of an envelope object.
///
/// JSON is the default; other encodings only need to round-trip a flat
/// object of JSON values.
pub trait Marshaler: Send + Sync {
    /// Turn an envelope object into frame bytes.
    fn marshal(&self, envelope: &Fields) -> Result<Bytes>;

    /// Parse frame bytes into an envelope object.
    fn unmarshal(&self, frame: &[u8]) -> Result<Fields>;
}

/// JSON text marshaler.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonMarshaler;

impl Marshaler for JsonMarshaler {
    fn marshal(&self, envelope: &Fields) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(envelope)?))
    }

    fn unmarshal(&self, frame: &[u8]) -> Result<Fields> {
        match serde_json::from_slice::<Value>(frame)? {
            Value::Object(fields) => Ok(fields),
            other => Err(Error::InvalidEnvelope(format!(
                "frame is not an object: {other}"
            ))),
        }
    }
}

/// Parsed frame before shape resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    // ---
    /// Wire type name.
    pub type_name: String,

    /// Correlation id, absent for push messages and the `0` sentinel.
    pub id: Option<RequestId>,

    /// Remaining fields, envelope keys removed.
    pub fields: Fields,
}

impl Envelope {
    /// Split a raw envelope object into its parts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEnvelope`] if `type` is missing or not a
    /// string, or if `id` is present but not a non-negative integer. Integral
    /// floats such as `1.0` are accepted as ids.
    pub fn from_fields(mut fields: Fields) -> Result<Self> {
        // ---
        let type_name = match fields.remove(TYPE_KEY) {
            Some(Value::String(name)) => name,
            Some(other) => {
                return Err(Error::InvalidEnvelope(format!(
                    "type is not a string: {other}"
                )))
            }
            None => return Err(Error::InvalidEnvelope("missing type".into())),
        };

        let id = match fields.remove(ID_KEY) {
            None | Some(Value::Null) => None,
            Some(value) => {
                let raw = integral_id(&value).ok_or_else(|| {
                    Error::InvalidEnvelope(format!(
                        "{type_name}: id is not a non-negative integer: {value}"
                    ))
                })?;
                RequestId::new(raw)
            }
        };

        Ok(Self {
            type_name,
            id,
            fields,
        })
    }

    /// Reassemble the envelope object.
    pub fn into_fields(self) -> Fields {
        // ---
        let mut out = Fields::new();
        out.insert(TYPE_KEY.into(), Value::String(self.type_name));
        if let Some(id) = self.id {
            out.insert(ID_KEY.into(), Value::from(id.get()));
        }
        out.extend(self.fields);
        out
    }
}

/// Read an id written as an integer, or as a float with no fractional part
/// (`1.0`). Negative and fractional values are rejected.
fn integral_id(value: &Value) -> Option<u64> {
    // ---
    if let Some(raw) = value.as_u64() {
        return Some(raw);
    }
    let float = value.as_f64()?;
    // 2^64 itself is not representable as u64.
    if float >= 0.0 && float.fract() == 0.0 && float < 18_446_744_073_709_551_616.0 {
        Some(float as u64)
    } else {
        None
    }
}

/// Codec over both message catalogs.
///
/// Cheap to clone; the registries are shared and never mutated after
/// construction.
#[derive(Clone)]
pub struct WireCodec {
    outgoing: Arc<TypeRegistry<Outgoing>>,
    incoming: Arc<TypeRegistry<Incoming>>,
    marshaler: Arc<dyn Marshaler>,
}

impl WireCodec {
    // ---

    /// Codec for the built-in catalogs, marshaled as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateType`] if a catalog is misdeclared.
    pub fn new() -> Result<Self> {
        // ---
        Ok(Self::with_registries(
            Outgoing::registry()?,
            Incoming::registry()?,
            Arc::new(JsonMarshaler),
        ))
    }

    /// Codec over explicit registries and marshaler.
    pub fn with_registries(
        outgoing: TypeRegistry<Outgoing>,
        incoming: TypeRegistry<Incoming>,
        marshaler: Arc<dyn Marshaler>,
    ) -> Self {
        // ---
        Self {
            outgoing: Arc::new(outgoing),
            incoming: Arc::new(incoming),
            marshaler,
        }
    }

    /// Encode an outgoing record into a frame, tagging it with `id` if given.
    pub fn serialize(&self, message: &Outgoing, id: Option<RequestId>) -> Result<Bytes> {
        // ---
        let fields = self.outgoing.encode(message)?;
        let envelope = Envelope {
            type_name: crate::protocol::Record::type_name(message).to_string(),
            id,
            fields,
        };
        self.marshaler.marshal(&envelope.into_fields())
    }

    /// Read the envelope of a received frame without resolving its shape.
    pub fn deserialize(&self, frame: &[u8]) -> Result<Envelope> {
        // ---
        Envelope::from_fields(self.marshaler.unmarshal(frame)?)
    }

    /// Resolve an envelope to an incoming record.
    pub fn decode(&self, envelope: Envelope) -> Result<Incoming> {
        // ---
        self.incoming.decode(&envelope.type_name, envelope.fields)
    }

    /// Build an outgoing record from caller-supplied fields.
    pub fn decode_outgoing(&self, type_name: &str, fields: Fields) -> Result<Outgoing> {
        // ---
        self.outgoing.decode(type_name, fields)
    }

    /// Encode an incoming record as a frame.
    ///
    /// The client never sends these; test peers and loopback servers use it
    /// to produce replies the dispatcher will accept.
    pub fn serialize_incoming(&self, message: &Incoming, id: Option<RequestId>) -> Result<Bytes> {
        // ---
        let envelope = Envelope {
            type_name: crate::protocol::Record::type_name(message).to_string(),
            id,
            fields: self.incoming.encode(message)?,
        };
        self.marshaler.marshal(&envelope.into_fields())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::protocol::catalog::{ChatMessage, SignIn};
    use serde_json::json;

    fn codec() -> WireCodec {
        WireCodec::new().unwrap()
    }

    #[test]
    fn test_serialize_with_id() {
        // ---
        let frame = codec()
            .serialize(
                &SignIn {
                    email: "a@b.com".into(),
                    password: "x".into(),
                }
                .into(),
                RequestId::new(1),
            )
            .unwrap();

        let value: Value = serde_json::from_slice(&frame).unwrap();
        assert_eq!(
            value,
            json!({ "type": "signIn", "id": 1, "email": "a@b.com", "password": "x" })
        );
    }

    #[test]
    fn test_serialize_without_id() {
        // ---
        let frame = codec()
            .serialize(
                &SignIn {
                    email: "a@b.com".into(),
                    password: "x".into(),
                }
                .into(),
                None,
            )
            .unwrap();

        let value: Value = serde_json::from_slice(&frame).unwrap();
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_deserialize_envelope_of_unknown_type() {
        // ---
        let envelope = codec()
            .deserialize(br#"{"type":"bogus","id":3,"x":1}"#)
            .unwrap();
        assert_eq!(envelope.type_name, "bogus");
        assert_eq!(envelope.id, RequestId::new(3));
        assert_eq!(envelope.fields.len(), 1);

        let err = codec().decode(envelope).unwrap_err();
        assert!(matches!(err, Error::UnknownType(name) if name == "bogus"));
    }

    #[test]
    fn test_deserialize_rejects_bad_envelopes() {
        // ---
        let codec = codec();
        for frame in [
            &b"not json"[..],
            br#"[1,2,3]"#,
            br#"{"id":1}"#,
            br#"{"type":5}"#,
            br#"{"type":"message","id":"abc"}"#,
            br#"{"type":"message","id":-1}"#,
            br#"{"type":"message","id":-1.0}"#,
            br#"{"type":"message","id":1.5}"#,
            br#"{"type":"message","id":true}"#,
        ] {
            assert!(codec.deserialize(frame).is_err(), "accepted {frame:?}");
        }
    }

    #[test]
    fn test_integral_float_id_is_accepted() {
        // ---
        let codec = codec();
        assert_eq!(codec.deserialize(br#"{"type":"x","id":1.0}"#).unwrap().id, RequestId::new(1));
        assert_eq!(codec.deserialize(br#"{"type":"x","id":7e0}"#).unwrap().id, RequestId::new(7));
        assert_eq!(codec.deserialize(br#"{"type":"x","id":0.0}"#).unwrap().id, None);

        let err = codec.deserialize(br#"{"type":"message","id":2.5}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidEnvelope(reason) if reason.starts_with("message:")));
    }

    #[test]
    fn test_zero_and_null_id_mean_uncorrelated() {
        // ---
        let codec = codec();
        assert_eq!(codec.deserialize(br#"{"type":"x","id":0}"#).unwrap().id, None);
        assert_eq!(codec.deserialize(br#"{"type":"x","id":null}"#).unwrap().id, None);
    }

    #[test]
    fn test_incoming_round_trip_through_frame() {
        // ---
        let codec = codec();
        let message = Incoming::from(ChatMessage {
            message_id: 1,
            channel_id: 2,
            author_id: 3,
            contents: "hi".into(),
        });

        let frame = codec.serialize_incoming(&message, None).unwrap();
        let decoded = codec.decode(codec.deserialize(&frame).unwrap()).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_decode_outgoing_validates_fields() {
        // ---
        let codec = codec();
        let mut fields = Fields::new();
        fields.insert("email".into(), json!("a@b.com"));
        let err = codec.decode_outgoing("signIn", fields).unwrap_err();
        assert!(matches!(err, Error::MissingField { field, .. } if field == "password"));
    }
}
