//! BFS depth-batched GraphQL executor backed by an RPC runtime bridge.
//!
//! Two pieces make up the execution core:
//!
//! * [`execute_request`] walks a parsed query document against a
//!   [`SchemaView`], completing synchronous projection fields inline
//!   and collecting every asynchronous field at the same depth into
//!   one call through a [`Runtime`] — the BFS depth loop.
//! * [`rpc`] is the concrete `Runtime` this crate ships: it routes
//!   each async field to one of four RPC shapes (batch resolver,
//!   single resolver, batch loader, single loader) over a typed
//!   [`rpc::Transport`], grouping tasks by `(object type, field)` and
//!   translating between the executor's dynamic [`Value`] domain and
//!   typed wire messages.
//!
//! The executor only depends on the `SchemaView`/`Runtime` trait
//! boundary; a caller that isn't fronting a remote procedure-call
//! fabric can implement [`Runtime`] directly without pulling in `rpc`
//! at all.
//!
//! The query document itself comes from [`gql_exec_parser`], a
//! sibling crate this one treats as an external collaborator.

mod coercion;
pub mod config;
pub mod error;
mod executor;
mod path;
pub mod rpc;
mod runtime;
pub mod schema;
mod selection;
pub mod value;

pub use coercion::Variables;
pub use config::ExecutorConfig;
pub use error::{LocatedError, RequestError, TransportError};
pub use executor::{execute_request, ExecutionResult};
pub use path::{PathSegment, ResponsePath};
pub use runtime::{AsyncTask, Runtime};
pub use schema::{
    ArgumentDef, FieldDef, Schema, SchemaBuilder, SchemaView, TypeDef, TypeKind, TypeRef,
};
pub use selection::{collect_fields, FieldGroup};
pub use value::{DynamicMessage, TypedMessage, Value};

use gql_exec_parser::ast::Document;
use rpc::transport::CancellationSignal;
use std::sync::Arc;

/// Ties a [`SchemaView`] and a [`Runtime`] together into one reusable,
/// cheaply-cloneable entry point for running requests: a schema bundled
/// with a root resolver behind a single `execute` method. Neither
/// field is required to be the [`rpc`] module's `RpcBridge` — any
/// `Runtime` implementation works.
#[derive(Clone)]
pub struct ExecutionRuntime {
    schema: Arc<dyn SchemaView>,
    runtime: Arc<dyn Runtime>,
}

impl ExecutionRuntime {
    pub fn new(schema: Arc<dyn SchemaView>, runtime: Arc<dyn Runtime>) -> Self {
        ExecutionRuntime { schema, runtime }
    }

    pub fn schema(&self) -> &dyn SchemaView {
        self.schema.as_ref()
    }

    /// Runs one request to completion. See [`execute_request`] for the
    /// full contract; this just threads `self`'s schema and runtime
    /// through it.
    pub async fn execute(
        &self,
        document: &Document,
        operation_name: Option<&str>,
        raw_variables: &serde_json::Map<String, serde_json::Value>,
        initial_value: Value,
        cancel: &CancellationSignal,
    ) -> ExecutionResult {
        execute_request(
            self.schema.as_ref(),
            document,
            self.runtime.as_ref(),
            operation_name,
            raw_variables,
            initial_value,
            cancel,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::registry::{InMemoryRegistry, MethodDescriptor};
    use crate::rpc::transport::Transport;
    use crate::rpc::RpcBridge;
    use crate::schema::{TypeKind as Kind, TypeRef as Ty};
    use async_trait::async_trait;
    use gql_exec_parser::parse_query;

    struct NoopTransport;
    #[async_trait]
    impl Transport for NoopTransport {
        async fn call(
            &self,
            _method: &MethodDescriptor,
            _request: Arc<dyn TypedMessage>,
            _cancel: &CancellationSignal,
        ) -> Result<Arc<dyn TypedMessage>, TransportError> {
            unreachable!("no async field is exercised by this test")
        }
    }

    #[tokio::test]
    async fn execution_runtime_bundles_schema_and_runtime_for_execute() {
        let schema = Schema::builder("Query")
            .type_def(TypeDef {
                name: "Query".to_string(),
                kind: Kind::Object,
                fields: [(
                    "a".to_string(),
                    FieldDef {
                        name: "a".to_string(),
                        ty: Ty::named("String"),
                        arguments: Vec::new(),
                        is_async: false,
                    },
                )]
                .into_iter()
                .collect(),
                possible_types: Default::default(),
                interfaces: Default::default(),
            })
            .build();
        let registry = InMemoryRegistry::builder()
            .physical_field("Query", "a", "a")
            .build();
        let runtime = Arc::new(RpcBridge::new(registry, Arc::new(NoopTransport)));
        let engine = ExecutionRuntime::new(schema, runtime);

        let source = Value::Message(Arc::new(
            DynamicMessage::new("QuerySource").with_field("a", Value::String("A".to_string())),
        ));
        let document = parse_query("{ a }").unwrap();
        let cancel = CancellationSignal::new();
        let result = engine
            .execute(&document, None, &serde_json::Map::new(), source, &cancel)
            .await;

        assert!(result.errors.is_empty());
        assert_eq!(result.data, Some(serde_json::json!({"a": "A"})));
    }
}
