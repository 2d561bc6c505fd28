//! The runtime capability set the executor consumes: four entries —
//! sync resolve, batch resolve-async, abstract type resolution, leaf
//! serialization — behind which the RPC bridge routes to wire calls.
//! The executor never speaks to a transport or a descriptor registry
//! directly; it only ever calls through this trait, so tests can
//! supply a trivial fixture instead of a live bridge.

use crate::error::{LocatedError, TransportError};
use crate::path::ResponsePath;
use crate::rpc::transport::CancellationSignal;
use crate::value::Value;
use async_trait::async_trait;
use indexmap::IndexMap;

/// One pending asynchronous field, queued by the BFS depth loop and
/// handed to the runtime's batch entry a whole depth at a time.
#[derive(Debug, Clone)]
pub struct AsyncTask {
    pub path: ResponsePath,
    pub object_type: String,
    pub field_name: String,
    pub source: Value,
    pub args: IndexMap<String, Value>,
}

#[async_trait]
pub trait Runtime: Send + Sync {
    /// `source` must be a typed message value of `object_type`;
    /// violating that is a programmer error, so this does not return a
    /// `Result` for it — implementations call
    /// [`crate::error::configuration_error`] instead. No I/O is
    /// permitted here.
    fn resolve_sync(
        &self,
        object_type: &str,
        field_name: &str,
        source: &Value,
        args: &IndexMap<String, Value>,
        cancel: &CancellationSignal,
    ) -> Value;

    /// Results are returned in the same order and length as `tasks`.
    /// `Err` signals a transport-level failure for the whole call,
    /// which the executor turns into one located error per task in the
    /// group.
    async fn batch_resolve_async(
        &self,
        tasks: &[AsyncTask],
        cancel: &CancellationSignal,
    ) -> Result<Vec<Result<Value, LocatedError>>, TransportError>;

    /// Infers the concrete object type name for an abstract
    /// (interface/union) value. The caller checks the result against
    /// the schema view's possible types.
    fn resolve_type(&self, abstract_type: &str, value: &Value) -> String;

    /// `Err` becomes a located error at the field's path; the field
    /// still completes to `null`.
    fn serialize_leaf(
        &self,
        type_name: &str,
        value: &Value,
        cancel: &CancellationSignal,
    ) -> Result<serde_json::Value, String>;
}
