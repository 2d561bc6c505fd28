//! The RPC runtime bridge: the `Runtime` implementation that satisfies
//! the executor's four-entry contract by routing each
//! async field to one of the four RPC shapes, grouping tasks by
//! (object-type, field), translating arguments and responses between
//! the executor's `Value` domain and typed wire messages, and
//! enforcing the loader null-key short-circuit.

use crate::config::ExecutorConfig;
use crate::error::{configuration_error, LocatedError, TransportError};
use crate::path::ResponsePath;
use crate::rpc::registry::{
    DescriptorRegistry, MethodDescriptor, MethodKind, RequestFieldKind, RequestSchema,
    ResponseDataKind, ScalarKind,
};
use crate::rpc::transport::{CancellationSignal, Transport};
use crate::runtime::{AsyncTask, Runtime};
use crate::value::{DynamicMessage, TypedMessage, Value};
use async_trait::async_trait;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use indexmap::IndexMap;
use std::sync::Arc;

/// Ties a [`DescriptorRegistry`] and a [`Transport`] together into the
/// `Runtime` the BFS executor drives. Cheap to clone — both fields are
/// `Arc`s — and safe to share across requests: the registry and
/// transport are read-only after construction.
pub struct RpcBridge {
    registry: Arc<dyn DescriptorRegistry>,
    transport: Arc<dyn Transport>,
    config: ExecutorConfig,
}

impl RpcBridge {
    pub fn new(registry: Arc<dyn DescriptorRegistry>, transport: Arc<dyn Transport>) -> Self {
        RpcBridge::with_config(registry, transport, ExecutorConfig::default())
    }

    pub fn with_config(
        registry: Arc<dyn DescriptorRegistry>,
        transport: Arc<dyn Transport>,
        config: ExecutorConfig,
    ) -> Self {
        RpcBridge {
            registry,
            transport,
            config,
        }
    }

    /// Runs every task belonging to one (object-type, field-name)
    /// group, returning each task's result tagged with its original
    /// position in the caller's task slice; results are placed into
    /// pre-allocated per-task slots by the caller.
    async fn run_group(
        &self,
        object_type: &str,
        field_name: &str,
        indices: &[usize],
        tasks: &[AsyncTask],
        cancel: &CancellationSignal,
    ) -> Vec<(usize, Result<Value, LocatedError>)> {
        let method = self
            .registry
            .method_for(object_type, field_name)
            .unwrap_or_else(|| {
                configuration_error(format!(
                    "no resolver, loader, or RPC method is registered for {}.{}",
                    object_type, field_name
                ))
            });

        let mut out: Vec<(usize, Result<Value, LocatedError>)> = Vec::with_capacity(indices.len());
        let mut included: Vec<(usize, &ResponsePath, DynamicMessage)> = Vec::new();

        for &idx in indices {
            let task = &tasks[idx];
            let merged_args = merge_request_field_sources(&self.registry, task);

            if method.kind.is_loader() && is_short_circuit(&method.request, &merged_args) {
                out.push((idx, Ok(Value::Null)));
                continue;
            }

            match build_request(&method.request, &merged_args, self.registry.as_ref()) {
                Ok(request) => included.push((idx, &task.path, request)),
                Err(message) => {
                    out.push((idx, Err(LocatedError::new(message, task.path.clone()))))
                }
            }
        }

        if method.kind.is_batch() {
            out.extend(self.call_batch(method, included, cancel).await);
        } else {
            out.extend(self.call_single(method, included, cancel).await);
        }

        out
    }

    /// One wire call carrying every included task's request item; the
    /// response's `batches` list is matched back to tasks by position.
    async fn call_batch(
        &self,
        method: &MethodDescriptor,
        included: Vec<(usize, &ResponsePath, DynamicMessage)>,
        cancel: &CancellationSignal,
    ) -> Vec<(usize, Result<Value, LocatedError>)> {
        if included.is_empty() {
            return Vec::new();
        }

        let items: Vec<Value> = included
            .iter()
            .map(|(_, _, msg)| Value::Message(Arc::new(msg.clone())))
            .collect();
        let batch_request = DynamicMessage::new(format!("{}Request", method.name))
            .with_field("batches", Value::List(items));

        match self
            .transport
            .call(method, Arc::new(batch_request), cancel)
            .await
        {
            Err(err) => included
                .into_iter()
                .map(|(idx, path, _)| {
                    (idx, Err(LocatedError::new(err.to_string(), path.clone())))
                })
                .collect(),
            Ok(response) => {
                let batches = match response.get_field("batches") {
                    Some(Value::List(items)) => items,
                    _ => {
                        return included
                            .into_iter()
                            .map(|(idx, path, _)| {
                                (
                                    idx,
                                    Err(LocatedError::new(
                                        "response is missing its `batches` field",
                                        path.clone(),
                                    )),
                                )
                            })
                            .collect()
                    }
                };
                included
                    .into_iter()
                    .enumerate()
                    .map(|(position, (idx, path, _))| {
                        let result = match batches.get(position) {
                            Some(value) => decode_response_value(value.clone(), self.registry.as_ref())
                                .map_err(|e| LocatedError::new(e, path.clone())),
                            None => Err(LocatedError::new(
                                "missing batch element",
                                path.clone(),
                            )),
                        };
                        (idx, result)
                    })
                    .collect()
            }
        }
    }

    /// One wire call per included task.
    async fn call_single(
        &self,
        method: &MethodDescriptor,
        included: Vec<(usize, &ResponsePath, DynamicMessage)>,
        cancel: &CancellationSignal,
    ) -> Vec<(usize, Result<Value, LocatedError>)> {
        join_all(included.into_iter().map(|(idx, path, request)| async move {
            let result = match self.transport.call(method, Arc::new(request), cancel).await {
                Err(err) => Err(LocatedError::new(err.to_string(), path.clone())),
                Ok(response) => match response.get_field("data") {
                    Some(value) => decode_response_value(value, self.registry.as_ref())
                        .map_err(|e| LocatedError::new(e, path.clone())),
                    None if method.response_data_kind == ResponseDataKind::Message => {
                        Ok(Value::Null)
                    }
                    None => Err(LocatedError::new(
                        "response is missing its `data` field",
                        path.clone(),
                    )),
                },
            };
            (idx, result)
        }))
        .await
    }
}

#[async_trait]
impl Runtime for RpcBridge {
    fn resolve_sync(
        &self,
        object_type: &str,
        field_name: &str,
        source: &Value,
        _args: &IndexMap<String, Value>,
        _cancel: &CancellationSignal,
    ) -> Value {
        let descriptor = self
            .registry
            .physical_field(object_type, field_name)
            .unwrap_or_else(|| {
                configuration_error(format!(
                    "no physical field descriptor for {}.{}",
                    object_type, field_name
                ))
            });
        let message = source.as_message().unwrap_or_else(|| {
            configuration_error(format!(
                "sync resolution of {}.{} requires a typed message source",
                object_type, field_name
            ))
        });
        if message.has_field(&descriptor.wire_field) {
            message.get_field(&descriptor.wire_field).unwrap_or(Value::Null)
        } else {
            Value::Null
        }
    }

    async fn batch_resolve_async(
        &self,
        tasks: &[AsyncTask],
        cancel: &CancellationSignal,
    ) -> Result<Vec<Result<Value, LocatedError>>, TransportError> {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        let mut groups: IndexMap<(String, String), Vec<usize>> = IndexMap::new();
        for (i, task) in tasks.iter().enumerate() {
            groups
                .entry((task.object_type.clone(), task.field_name.clone()))
                .or_default()
                .push(i);
        }

        let concurrency = self.config.max_group_concurrency.max(1);
        let group_results: Vec<Vec<(usize, Result<Value, LocatedError>)>> =
            stream::iter(groups.into_iter())
                .map(|((object_type, field_name), indices)| {
                    self.run_group(&object_type, &field_name, &indices, tasks, cancel)
                })
                .buffer_unordered(concurrency)
                .collect()
                .await;

        let mut slots: Vec<Option<Result<Value, LocatedError>>> = vec![None; tasks.len()];
        for group in group_results {
            for (idx, result) in group {
                slots[idx] = Some(result);
            }
        }
        Ok(slots
            .into_iter()
            .map(|slot| slot.expect("every async task index is populated by its own group"))
            .collect())
    }

    fn resolve_type(&self, _abstract_type: &str, value: &Value) -> String {
        let message = value
            .as_message()
            .unwrap_or_else(|| configuration_error("abstract type resolution requires a typed message value"));
        let name = message.type_name();
        name.strip_suffix("Source").map(str::to_string).unwrap_or_else(|| {
            configuration_error(format!(
                "message type '{}' does not carry the 'Source' suffix abstract-type resolution expects",
                name
            ))
        })
    }

    fn serialize_leaf(
        &self,
        _type_name: &str,
        value: &Value,
        _cancel: &CancellationSignal,
    ) -> Result<serde_json::Value, String> {
        Ok(value.clone().into_json())
    }
}

/// Copies parent-source fields into the argument map under the
/// destination names the registry declares, for any destination not
/// already supplied as an explicit argument.
fn merge_request_field_sources(
    registry: &Arc<dyn DescriptorRegistry>,
    task: &AsyncTask,
) -> IndexMap<String, Value> {
    let mut args = task.args.clone();
    if let Some(sources) = registry.request_field_sources(&task.object_type, &task.field_name) {
        if let Some(parent) = task.source.as_message() {
            for (destination, parent_field) in sources {
                if args.contains_key(destination) {
                    continue;
                }
                if parent.has_field(parent_field) {
                    if let Some(value) = parent.get_field(parent_field) {
                        args.insert(destination.clone(), value);
                    }
                }
            }
        }
    }
    args
}

/// A loader task is short-circuited when any top-level request field
/// the schema declares is present in the (merged) argument map with an
/// explicit `null` value.
fn is_short_circuit(schema: &RequestSchema, args: &IndexMap<String, Value>) -> bool {
    schema
        .fields
        .keys()
        .any(|field| matches!(args.get(field), Some(Value::Null)))
}

/// Builds a typed request message out of a task's (merged) argument
/// map against the method's declared request schema. Unknown argument
/// keys are ignored; a declared field whose
/// host value doesn't match its kind is a per-task error.
fn build_request(
    schema: &RequestSchema,
    args: &IndexMap<String, Value>,
    registry: &dyn DescriptorRegistry,
) -> Result<DynamicMessage, String> {
    let mut message = DynamicMessage::new(schema.type_name.clone());
    for (key, value) in args {
        let Some(kind) = schema.fields.get(key) else {
            continue;
        };
        if value.is_nullish() {
            continue;
        }
        let converted = convert_field(kind, value, registry)
            .map_err(|e| format!("field '{}': {}", key, e))?;
        message.set_field(key.clone(), converted);
    }
    Ok(message)
}

fn convert_field(
    kind: &RequestFieldKind,
    value: &Value,
    registry: &dyn DescriptorRegistry,
) -> Result<Value, String> {
    match kind {
        RequestFieldKind::Any => Ok(value.clone()),
        RequestFieldKind::Scalar(scalar) => convert_scalar(*scalar, value),
        RequestFieldKind::Repeated(scalar) => match value {
            Value::List(items) => items
                .iter()
                .map(|item| convert_scalar(*scalar, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            _ => Err("expected a repeated field".to_string()),
        },
        RequestFieldKind::Enum => match value {
            Value::String(name) => Ok(Value::String(name.clone())),
            _ => Err("expected an enum value's symbolic name as a string".to_string()),
        },
        RequestFieldKind::Message(nested_name) => match value {
            Value::Map(fields) => build_nested_message(nested_name.as_deref(), fields, registry),
            _ => Err("expected a nested object for a message field".to_string()),
        },
        RequestFieldKind::RepeatedMessage(nested_name) => match value {
            Value::List(items) => items
                .iter()
                .map(|item| match item {
                    Value::Map(fields) => {
                        build_nested_message(nested_name.as_deref(), fields, registry)
                    }
                    _ => Err("expected a nested object for a repeated message field".to_string()),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            _ => Err("expected a repeated message field".to_string()),
        },
    }
}

fn build_nested_message(
    nested_name: Option<&str>,
    fields: &IndexMap<String, Value>,
    registry: &dyn DescriptorRegistry,
) -> Result<Value, String> {
    match nested_name.and_then(|name| registry.request_schema(name)) {
        Some(nested_schema) => {
            build_request(nested_schema, fields, registry).map(|msg| Value::Message(Arc::new(msg)))
        }
        None => Ok(Value::Map(fields.clone())),
    }
}

fn convert_scalar(kind: ScalarKind, value: &Value) -> Result<Value, String> {
    use ScalarKind::*;
    match (kind, value) {
        (Bool, Value::Bool(b)) => Ok(Value::Bool(*b)),
        (String, Value::String(s)) => Ok(Value::String(s.clone())),
        (Int32, Value::Int32(n)) => Ok(Value::Int32(*n)),
        (Int32, Value::Int64(n)) => i32::try_from(*n)
            .map(Value::Int32)
            .map_err(|_| "integer does not fit in an Int32 field".to_string()),
        (Int64, Value::Int32(n)) => Ok(Value::Int64(*n as i64)),
        (Int64, Value::Int64(n)) => Ok(Value::Int64(*n)),
        (UInt32, Value::UInt32(n)) => Ok(Value::UInt32(*n)),
        (UInt64, Value::UInt32(n)) => Ok(Value::UInt64(*n as u64)),
        (UInt64, Value::UInt64(n)) => Ok(Value::UInt64(*n)),
        (Float32, Value::Float32(n)) => Ok(Value::Float32(*n)),
        (Float32, Value::Float64(n)) => Ok(Value::Float32(*n as f32)),
        (Float64, Value::Float32(n)) => Ok(Value::Float64(*n as f64)),
        (Float64, Value::Float64(n)) => Ok(Value::Float64(*n)),
        (Bytes, Value::Bytes(b)) => Ok(Value::Bytes(b.clone())),
        (expected, got) => Err(format!(
            "type mismatch: expected a {:?} value, got {:?}",
            expected, got
        )),
    }
}

/// The wire→host response-decoding table, including the two
/// recognized envelope shapes. Applied to every value read back off a
/// wire response before it's handed to the executor for completion.
fn decode_response_value(value: Value, registry: &dyn DescriptorRegistry) -> Result<Value, String> {
    match value {
        Value::Message(message) => decode_message_envelope(message, registry),
        Value::List(items) => items
            .into_iter()
            .map(|item| decode_response_value(item, registry))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        other => Ok(other),
    }
}

fn decode_message_envelope(
    message: Arc<dyn TypedMessage>,
    registry: &dyn DescriptorRegistry,
) -> Result<Value, String> {
    if message.has_field("typename") {
        let typename = match message.get_field("typename") {
            Some(Value::String(name)) => name,
            _ => return Err("interface envelope's `typename` field is not a string".to_string()),
        };
        let payload = match message.get_field("payload") {
            Some(Value::Bytes(bytes)) => bytes,
            _ => configuration_error(format!(
                "interface envelope for type '{}' is missing its `payload` bytes",
                typename
            )),
        };
        return match registry.decode_message(&typename, &payload) {
            Some(Ok(decoded)) => Ok(Value::Message(decoded)),
            Some(Err(message)) => Err(message),
            None => configuration_error(format!(
                "interface envelope names unknown source type '{}'",
                typename
            )),
        };
    }

    if message.is_union_envelope() {
        return match message.union_variant() {
            Some(variant) => match message.get_field(&variant) {
                Some(value) => decode_response_value(value, registry),
                None => Ok(Value::Null),
            },
            None => Ok(Value::Null),
        };
    }

    Ok(Value::Message(message))
}
