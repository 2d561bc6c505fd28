//! The descriptor registry: for each `(object-type, field-name)` pair,
//! whether the field is a physical projection or one of the four RPC
//! method shapes, plus the request schema each method needs to build a
//! typed request and the request-field source mapping a method may
//! declare.
//!
//! This module defines the trait boundary and a small in-memory
//! implementation good enough to drive the bridge in tests; a real
//! deployment's registry is built once from the schema IR and shared
//! read-only across requests.

use crate::value::Value;
use indexmap::IndexMap;
use std::collections::HashMap;

/// The RPC shape a method descriptor routes a field through. Lookup
/// priority when more than one is registered for the same field:
/// `BatchResolver` > `SingleResolver` > `BatchLoader` > `SingleLoader`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    BatchResolver,
    SingleResolver,
    BatchLoader,
    SingleLoader,
}

impl MethodKind {
    /// Loaders are the only shape the null-key short-circuit applies
    /// to.
    pub fn is_loader(self) -> bool {
        matches!(self, MethodKind::BatchLoader | MethodKind::SingleLoader)
    }

    pub fn is_batch(self) -> bool {
        matches!(self, MethodKind::BatchResolver | MethodKind::BatchLoader)
    }
}

/// The protobuf-shaped kind of one request-message field, used to
/// validate and convert a task's coerced argument map into a typed
/// request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Bool,
    String,
    Int32,
    Int64,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Bytes,
}

#[derive(Debug, Clone)]
pub enum RequestFieldKind {
    Scalar(ScalarKind),
    Repeated(ScalarKind),
    /// The host value is the enum value's symbolic name as a string.
    Enum,
    /// Nested message; `request_schema` on the registry supplies the
    /// field schema to recurse with. `None` if the registry doesn't
    /// separately describe the nested type, in which case the nested
    /// map is passed through unvalidated.
    Message(Option<String>),
    RepeatedMessage(Option<String>),
    /// No shape validation is applied; the host value is passed
    /// through unconverted, as a sequence of any.
    Any,
}

/// The declared shape of one method's request message.
#[derive(Debug, Clone, Default)]
pub struct RequestSchema {
    pub type_name: String,
    pub fields: IndexMap<String, RequestFieldKind>,
}

impl RequestSchema {
    pub fn new(type_name: impl Into<String>) -> Self {
        RequestSchema {
            type_name: type_name.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, kind: RequestFieldKind) -> Self {
        self.fields.insert(name.into(), kind);
        self
    }
}

/// Whether a single-shape method's `data` response field is declared
/// message-typed, which changes how a missing `data` value is treated:
/// an unset message-typed `data` completes to `null`; any other
/// missing `data` is a per-task error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseDataKind {
    Message,
    Repeated,
    Scalar,
}

/// One method's full descriptor: which RPC shape it is, the wire
/// method identifier the transport dispatches on, its request schema,
/// and (for single shapes) how a missing `data` response is to be
/// read.
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    pub name: String,
    pub kind: MethodKind,
    pub request: RequestSchema,
    pub response_data_kind: ResponseDataKind,
}

/// The physical field descriptor for a synchronous projection field:
/// the wire field name to read off the source message.
#[derive(Debug, Clone)]
pub struct PhysicalFieldDescriptor {
    pub wire_field: String,
}

/// Read-only lookup the RPC bridge consumes. Implementations are
/// built once and shared across requests without locking.
pub trait DescriptorRegistry: Send + Sync {
    /// The physical field descriptor for a sync projection field.
    /// `None` if `field_name` isn't a projection field on
    /// `object_type` at all (it may still be an async one).
    fn physical_field(
        &self,
        object_type: &str,
        field_name: &str,
    ) -> Option<&PhysicalFieldDescriptor>;

    fn batch_resolver(&self, object_type: &str, field_name: &str) -> Option<&MethodDescriptor>;
    fn single_resolver(&self, object_type: &str, field_name: &str) -> Option<&MethodDescriptor>;
    fn batch_loader(&self, object_type: &str, field_name: &str) -> Option<&MethodDescriptor>;
    fn single_loader(&self, object_type: &str, field_name: &str) -> Option<&MethodDescriptor>;

    /// Priority scan: batch-resolver, single-resolver, batch-loader,
    /// single-loader, in that order. The first one registered wins.
    fn method_for(&self, object_type: &str, field_name: &str) -> Option<&MethodDescriptor> {
        self.batch_resolver(object_type, field_name)
            .or_else(|| self.single_resolver(object_type, field_name))
            .or_else(|| self.batch_loader(object_type, field_name))
            .or_else(|| self.single_loader(object_type, field_name))
    }

    /// Destination request-field name → parent source field name,
    /// consulted when assembling a task's request.
    fn request_field_sources(
        &self,
        object_type: &str,
        field_name: &str,
    ) -> Option<&IndexMap<String, String>>;

    /// For nested message fields: the request schema for a message
    /// type named elsewhere as a `Message`/`RepeatedMessage` field
    /// kind.
    fn request_schema(&self, type_name: &str) -> Option<&RequestSchema>;

    /// Interface envelope decoding: given the `typename` carried on
    /// the wire and the envelope's `payload` bytes, decode the named
    /// message. `None` if `typename` isn't a known source message type
    /// (a fatal configuration error at the call site).
    fn decode_message(
        &self,
        type_name: &str,
        payload: &[u8],
    ) -> Option<Result<std::sync::Arc<dyn crate::value::TypedMessage>, String>>;
}

/// A registry built directly from in-process tables, for tests and for
/// callers who assemble the descriptor set by hand rather than from a
/// generated schema IR.
#[derive(Default)]
pub struct InMemoryRegistry {
    physical_fields: HashMap<(String, String), PhysicalFieldDescriptor>,
    batch_resolvers: HashMap<(String, String), MethodDescriptor>,
    single_resolvers: HashMap<(String, String), MethodDescriptor>,
    batch_loaders: HashMap<(String, String), MethodDescriptor>,
    single_loaders: HashMap<(String, String), MethodDescriptor>,
    request_field_sources: HashMap<(String, String), IndexMap<String, String>>,
    request_schemas: HashMap<String, RequestSchema>,
    /// Interface-envelope payloads are modeled as JSON-encoded field
    /// maps: this is a stand-in for parsing real protobuf bytes
    /// against a generated descriptor, good enough to exercise the
    /// envelope-unwrap contract in tests.
    message_types: std::collections::HashSet<String>,
}

impl InMemoryRegistry {
    pub fn builder() -> InMemoryRegistryBuilder {
        InMemoryRegistryBuilder {
            registry: InMemoryRegistry::default(),
        }
    }
}

impl DescriptorRegistry for InMemoryRegistry {
    fn physical_field(
        &self,
        object_type: &str,
        field_name: &str,
    ) -> Option<&PhysicalFieldDescriptor> {
        self.physical_fields
            .get(&(object_type.to_string(), field_name.to_string()))
    }

    fn batch_resolver(&self, object_type: &str, field_name: &str) -> Option<&MethodDescriptor> {
        self.batch_resolvers
            .get(&(object_type.to_string(), field_name.to_string()))
    }

    fn single_resolver(&self, object_type: &str, field_name: &str) -> Option<&MethodDescriptor> {
        self.single_resolvers
            .get(&(object_type.to_string(), field_name.to_string()))
    }

    fn batch_loader(&self, object_type: &str, field_name: &str) -> Option<&MethodDescriptor> {
        self.batch_loaders
            .get(&(object_type.to_string(), field_name.to_string()))
    }

    fn single_loader(&self, object_type: &str, field_name: &str) -> Option<&MethodDescriptor> {
        self.single_loaders
            .get(&(object_type.to_string(), field_name.to_string()))
    }

    fn request_field_sources(
        &self,
        object_type: &str,
        field_name: &str,
    ) -> Option<&IndexMap<String, String>> {
        self.request_field_sources
            .get(&(object_type.to_string(), field_name.to_string()))
    }

    fn request_schema(&self, type_name: &str) -> Option<&RequestSchema> {
        self.request_schemas.get(type_name)
    }

    fn decode_message(
        &self,
        type_name: &str,
        payload: &[u8],
    ) -> Option<Result<std::sync::Arc<dyn crate::value::TypedMessage>, String>> {
        if !self.message_types.contains(type_name) {
            return None;
        }
        Some(decode_json_message(type_name, payload))
    }
}

fn decode_json_message(
    type_name: &str,
    payload: &[u8],
) -> Result<std::sync::Arc<dyn crate::value::TypedMessage>, String> {
    let json: serde_json::Value =
        serde_json::from_slice(payload).map_err(|e| format!("invalid envelope payload: {}", e))?;
    let fields = json
        .as_object()
        .ok_or_else(|| "envelope payload must decode to a JSON object".to_string())?;
    let mut message = crate::value::DynamicMessage::new(type_name);
    for (key, value) in fields {
        message.set_field(key.clone(), Value::from_json(value));
    }
    Ok(std::sync::Arc::new(message))
}

pub struct InMemoryRegistryBuilder {
    registry: InMemoryRegistry,
}

impl InMemoryRegistryBuilder {
    pub fn physical_field(
        mut self,
        object_type: impl Into<String>,
        field_name: impl Into<String>,
        wire_field: impl Into<String>,
    ) -> Self {
        self.registry.physical_fields.insert(
            (object_type.into(), field_name.into()),
            PhysicalFieldDescriptor {
                wire_field: wire_field.into(),
            },
        );
        self
    }

    pub fn batch_resolver(
        mut self,
        object_type: impl Into<String>,
        field_name: impl Into<String>,
        method: MethodDescriptor,
    ) -> Self {
        self.registry
            .batch_resolvers
            .insert((object_type.into(), field_name.into()), method);
        self
    }

    pub fn single_resolver(
        mut self,
        object_type: impl Into<String>,
        field_name: impl Into<String>,
        method: MethodDescriptor,
    ) -> Self {
        self.registry
            .single_resolvers
            .insert((object_type.into(), field_name.into()), method);
        self
    }

    pub fn batch_loader(
        mut self,
        object_type: impl Into<String>,
        field_name: impl Into<String>,
        method: MethodDescriptor,
    ) -> Self {
        self.registry
            .batch_loaders
            .insert((object_type.into(), field_name.into()), method);
        self
    }

    pub fn single_loader(
        mut self,
        object_type: impl Into<String>,
        field_name: impl Into<String>,
        method: MethodDescriptor,
    ) -> Self {
        self.registry
            .single_loaders
            .insert((object_type.into(), field_name.into()), method);
        self
    }

    pub fn request_field_sources(
        mut self,
        object_type: impl Into<String>,
        field_name: impl Into<String>,
        sources: IndexMap<String, String>,
    ) -> Self {
        self.registry
            .request_field_sources
            .insert((object_type.into(), field_name.into()), sources);
        self
    }

    pub fn request_schema(mut self, schema: RequestSchema) -> Self {
        self.registry
            .request_schemas
            .insert(schema.type_name.clone(), schema);
        self
    }

    pub fn message_type(mut self, type_name: impl Into<String>) -> Self {
        self.registry.message_types.insert(type_name.into());
        self
    }

    pub fn build(self) -> std::sync::Arc<InMemoryRegistry> {
        std::sync::Arc::new(self.registry)
    }
}
