//! Type-name registry.
//!
//! Maps a wire type name to the pair of functions that build a typed record
//! from its raw fields and turn the record back into raw fields. One registry
//! exists per direction; a name has independent meaning in each.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::{Error, Result};

/// Raw field mapping of a message, without envelope keys.
pub type Fields = serde_json::Map<String, Value>;

/// Build a record from raw fields.
pub type DecodeFn<M> = fn(Fields) -> Result<M>;

/// Turn a record back into raw fields.
pub type EncodeFn<M> = fn(&M) -> Result<Fields>;

/// A record that knows the wire name of its own shape.
pub trait Record: Send + Sync + 'static {
    /// Wire type name of this particular value.
    fn type_name(&self) -> &'static str;
}

/// A statically declared message shape.
///
/// `FIELDS` lists the wire names of every field the shape declares. Decoding
/// rejects maps that miss any of them or carry anything else.
pub trait Shape: Serialize + DeserializeOwned {
    const TYPE_NAME: &'static str;
    const FIELDS: &'static [&'static str];
}

/// Decode a shape from raw fields, checking the field set first.
pub fn decode_shape<S: Shape>(fields: Fields) -> Result<S> {
    // ---
    if let Some(missing) = S::FIELDS.iter().find(|f| !fields.contains_key(**f)) {
        return Err(Error::MissingField {
            type_name: S::TYPE_NAME.to_string(),
            field: (*missing).to_string(),
        });
    }

    let declared = |key: &str| S::FIELDS.iter().any(|f| *f == key);
    if let Some(extra) = fields.keys().find(|k| !declared(k.as_str())) {
        return Err(Error::UnexpectedField {
            type_name: S::TYPE_NAME.to_string(),
            field: extra.clone(),
        });
    }

    Ok(serde_json::from_value(Value::Object(fields))?)
}

/// Encode a shape into raw fields.
pub fn encode_shape<S: Shape>(shape: &S) -> Result<Fields> {
    // ---
    match serde_json::to_value(shape)? {
        Value::Object(fields) => Ok(fields),
        other => Err(Error::InvalidEnvelope(format!(
            "{} did not encode to an object: {other}",
            S::TYPE_NAME
        ))),
    }
}

struct Entry<M> {
    decode: DecodeFn<M>,
    encode: EncodeFn<M>,
}

/// Registry of message shapes for one direction.
///
/// Populated once at startup and read-only afterwards.
pub struct TypeRegistry<M> {
    entries: HashMap<&'static str, Entry<M>>,
}

impl<M: Record> TypeRegistry<M> {
    // ---

    /// Create an empty registry.
    pub fn new() -> Self {
        // ---
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register the decode/encode pair for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateType`] if `name` is already registered.
    pub fn register(
        &mut self,
        name: &'static str,
        decode: DecodeFn<M>,
        encode: EncodeFn<M>,
    ) -> Result<()> {
        // ---
        if self.entries.contains_key(name) {
            return Err(Error::DuplicateType(name.to_string()));
        }
        self.entries.insert(name, Entry { decode, encode });
        Ok(())
    }

    /// Build a record of type `name` from raw fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownType`] if `name` is not registered, or the
    /// shape's own decoding error.
    pub fn decode(&self, name: &str, fields: Fields) -> Result<M> {
        // ---
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| Error::UnknownType(name.to_string()))?;
        (entry.decode)(fields)
    }

    /// Turn a record back into raw fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownType`] if the record's type name was never
    /// registered here.
    pub fn encode(&self, record: &M) -> Result<Fields> {
        // ---
        let name = record.type_name();
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| Error::UnknownType(name.to_string()))?;
        (entry.encode)(record)
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of registered shapes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.entries.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl<M: Record> Default for TypeRegistry<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Ping {
        #[serde(rename = "seqNo")]
        seq_no: u32,
    }

    impl Shape for Ping {
        const TYPE_NAME: &'static str = "ping";
        const FIELDS: &'static [&'static str] = &["seqNo"];
    }

    #[derive(Debug, PartialEq)]
    enum TestRecord {
        Ping(Ping),
        Orphan,
    }

    impl Record for TestRecord {
        fn type_name(&self) -> &'static str {
            match self {
                TestRecord::Ping(_) => "ping",
                TestRecord::Orphan => "orphan",
            }
        }
    }

    fn decode_ping(fields: Fields) -> Result<TestRecord> {
        Ok(TestRecord::Ping(decode_shape(fields)?))
    }

    fn encode_ping(record: &TestRecord) -> Result<Fields> {
        match record {
            TestRecord::Ping(p) => encode_shape(p),
            other => Err(Error::UnknownType(other.type_name().into())),
        }
    }

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn registry() -> TypeRegistry<TestRecord> {
        let mut reg = TypeRegistry::new();
        reg.register("ping", decode_ping, encode_ping).unwrap();
        reg
    }

    #[test]
    fn test_register_and_decode() {
        // ---
        let reg = registry();
        let record = reg.decode("ping", fields(json!({ "seqNo": 4 }))).unwrap();
        assert_eq!(record, TestRecord::Ping(Ping { seq_no: 4 }));
    }

    #[test]
    fn test_duplicate_type() {
        // ---
        let mut reg = registry();
        let err = reg.register("ping", decode_ping, encode_ping).unwrap_err();
        assert!(matches!(err, Error::DuplicateType(name) if name == "ping"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_unknown_type_on_decode() {
        // ---
        let reg = registry();
        let err = reg.decode("pong", Fields::new()).unwrap_err();
        assert!(matches!(err, Error::UnknownType(name) if name == "pong"));
    }

    #[test]
    fn test_unknown_type_on_encode() {
        // ---
        let reg = registry();
        let err = reg.encode(&TestRecord::Orphan).unwrap_err();
        assert!(matches!(err, Error::UnknownType(name) if name == "orphan"));
    }

    #[test]
    fn test_missing_field() {
        // ---
        let reg = registry();
        let err = reg.decode("ping", Fields::new()).unwrap_err();
        assert!(matches!(err, Error::MissingField { field, .. } if field == "seqNo"));
    }

    #[test]
    fn test_unexpected_field() {
        // ---
        let reg = registry();
        let err = reg
            .decode("ping", fields(json!({ "seqNo": 1, "extra": true })))
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedField { field, .. } if field == "extra"));
    }

    #[test]
    fn test_wrong_value_type() {
        // ---
        let reg = registry();
        let err = reg
            .decode("ping", fields(json!({ "seqNo": "four" })))
            .unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_encode_uses_wire_names() {
        // ---
        let reg = registry();
        let encoded = reg.encode(&TestRecord::Ping(Ping { seq_no: 9 })).unwrap();
        assert_eq!(encoded, fields(json!({ "seqNo": 9 })));
    }
}
