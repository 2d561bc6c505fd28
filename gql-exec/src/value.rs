use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// A typed message value read off the wire or synthesized for a
/// request. The executor and the bridge never re-materialize one of
/// these into a generic map — they read fields off it through this
/// trait and otherwise carry it opaquely through sync hops without
/// re-materializing it.
///
/// A real deployment backs this with generated `prost::Message` types;
/// [`DynamicMessage`] is the crate's own reference implementation, used
/// by tests and by the envelope-decoding helpers in the RPC bridge.
pub trait TypedMessage: Send + Sync + fmt::Debug {
    /// The name this message is registered under in the descriptor
    /// registry.
    fn type_name(&self) -> &str;

    /// Whether `field` is set on this message. Distinguishes "not set"
    /// from "set to a zero value" the way a protobuf wire message does.
    fn has_field(&self, field: &str) -> bool;

    /// Reads `field`, converted to the host `Value` domain. Returns
    /// `None` if the field isn't set.
    fn get_field(&self, field: &str) -> Option<Value>;

    /// A union envelope is a message containing exactly one oneof
    /// group named `value`, each variant being a message-typed field.
    /// Non-oneof-envelope messages (the overwhelming majority) just
    /// answer `false`/`None` through the defaults here.
    fn is_union_envelope(&self) -> bool {
        false
    }

    /// The field name of whichever oneof variant is set, if any. Only
    /// meaningful when [`TypedMessage::is_union_envelope`] is `true`;
    /// `None` means the oneof is empty, which decodes to `null`.
    fn union_variant(&self) -> Option<String> {
        None
    }
}

/// The generic, dynamically-typed value domain the executor and the
/// RPC bridge pass around: coerced variables and arguments, raw
/// resolver results before completion, and task source values.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    Message(Arc<dyn TypedMessage>),
}

impl Value {
    /// Whether a value is absent: a reference to an absent value, or a
    /// typed container whose underlying storage is the host-level
    /// empty reference (not an empty collection). In this domain
    /// that's exactly `Value::Null` — absence upstream (an unset
    /// field, a missing map key) is always normalized to `Value::Null`
    /// before it reaches completion, and an empty list or empty
    /// message is not nullish.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&Arc<dyn TypedMessage>> {
        match self {
            Value::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Converts a scalar/enum leaf value into the JSON-safe response
    /// tree representation. Not meant for `Message` or `Map` values,
    /// which are assembled structurally by the
    /// executor instead; both fall back to `null` defensively.
    pub fn into_json(self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int32(n) => serde_json::Value::from(n),
            Value::Int64(n) => serde_json::Value::from(n),
            Value::UInt32(n) => serde_json::Value::from(n),
            Value::UInt64(n) => serde_json::Value::from(n),
            Value::Float32(n) => serde_json::Number::from_f64(n as f64)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Float64(n) => serde_json::Number::from_f64(n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::Bytes(bytes) => {
                serde_json::Value::String(base64::Engine::encode(
                    &base64::engine::general_purpose::STANDARD,
                    bytes,
                ))
            }
            Value::List(items) => {
                serde_json::Value::Array(items.into_iter().map(Value::into_json).collect())
            }
            Value::Map(fields) => serde_json::Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, v.into_json()))
                    .collect(),
            ),
            Value::Message(_) => serde_json::Value::Null,
        }
    }

    /// Builds a `Value` from a plain JSON tree, inferring the
    /// narrowest numeric representation the way a wire decoder would.
    /// Used by the RPC bridge to materialize a message out of an
    /// interface envelope's `payload` bytes, where the crate's own
    /// reference registry models payload bytes as a JSON-encoded field
    /// map rather than a protobuf wire encoding.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64().and_then(|n| i32::try_from(n).ok()) {
                    Value::Int32(i)
                } else if let Some(i) = n.as_i64() {
                    Value::Int64(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Float64(f)
                } else {
                    Value::Null
                }
            }
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(fields) => {
                let mut out = IndexMap::new();
                for (k, v) in fields {
                    out.insert(k.clone(), Value::from_json(v));
                }
                Value::Map(out)
            }
        }
    }
}

/// A reference [`TypedMessage`] implementation backed by an ordered
/// field map, standing in for a generated protobuf message. Field
/// insertion order is preserved so repeated construction from a
/// coerced argument map round-trips predictably in tests.
#[derive(Debug, Clone, Default)]
pub struct DynamicMessage {
    type_name: String,
    fields: IndexMap<String, Value>,
    /// Set when this message stands for a union envelope's oneof
    /// group `value`: the field name of the set variant, if any.
    union_variant: Option<Option<String>>,
}

impl DynamicMessage {
    pub fn new(type_name: impl Into<String>) -> Self {
        DynamicMessage {
            type_name: type_name.into(),
            fields: IndexMap::new(),
            union_variant: None,
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Marks this message as a union envelope whose oneof `value`
    /// currently has `variant_field` set (or is empty, if `None`).
    pub fn with_union_variant(mut self, variant_field: Option<impl Into<String>>) -> Self {
        self.union_variant = Some(variant_field.map(Into::into));
        self
    }
}

impl TypedMessage for DynamicMessage {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    fn get_field(&self, field: &str) -> Option<Value> {
        self.fields.get(field).cloned()
    }

    fn is_union_envelope(&self) -> bool {
        self.union_variant.is_some()
    }

    fn union_variant(&self) -> Option<String> {
        self.union_variant.clone().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nullish_is_exactly_null() {
        assert!(Value::Null.is_nullish());
        assert!(!Value::List(vec![]).is_nullish());
        assert!(!Value::String(String::new()).is_nullish());
    }

    #[test]
    fn bytes_serialize_as_base64() {
        let json = Value::Bytes(vec![0xde, 0xad, 0xbe, 0xef]).into_json();
        assert_eq!(json, serde_json::Value::String("3q2+7w==".to_string()));
    }
}
