//! The BFS Executor (spec §4.3): walks a selected operation's
//! selection set against a schema and a [`Runtime`], producing a
//! response tree and a list of located errors.
//!
//! Synchronous fields are completed inline, depth by depth; fields the
//! schema marks async are queued and handed to the runtime's batch
//! entry one whole depth at a time (spec §4.3, step 2), so sibling
//! async fields across the entire depth share one RPC round trip
//! regardless of which object they hang off of.

use crate::coercion::{coerce_arguments, coerce_variables, Variables};
use crate::error::{configuration_error, LocatedError, RequestError, TransportError};
use crate::path::{PathSegment, ResponsePath};
use crate::runtime::{AsyncTask, Runtime};
use crate::rpc::transport::CancellationSignal;
use crate::schema::{SchemaView, TypeDef, TypeKind, TypeRef};
use crate::selection::{collect_fields, FieldGroup};
use crate::value::Value;
use gql_exec_parser::ast::{
    Document, Field, OperationDefinition, OperationType, SelectionSet, VariableDefinition,
};
use itertools::Itertools;
use std::collections::HashMap;

/// The outcome of one [`execute_request`] call: a GraphQL response's
/// `data`/`errors` pair (spec §6). `data` is `None` exactly when a
/// Non-Null violation climbed all the way to the top of the response,
/// or when the request never reached execution at all (spec §7,
/// category 1).
#[derive(Debug)]
pub struct ExecutionResult {
    pub data: Option<serde_json::Value>,
    pub errors: Vec<LocatedError>,
}

impl ExecutionResult {
    fn pre_execution(err: RequestError) -> Self {
        ExecutionResult {
            data: None,
            errors: vec![err.into()],
        }
    }
}

/// Runs one request end to end (spec §6, "Execute"): selects the
/// operation, coerces variables, then drives the BFS depth loop over
/// its selection set against `initial_value`.
pub async fn execute_request(
    schema: &dyn SchemaView,
    document: &Document,
    runtime: &dyn Runtime,
    operation_name: Option<&str>,
    raw_variables: &serde_json::Map<String, serde_json::Value>,
    initial_value: Value,
    cancel: &CancellationSignal,
) -> ExecutionResult {
    let operation = match select_operation(document, operation_name) {
        Ok(op) => op,
        Err(err) => return ExecutionResult::pre_execution(err),
    };
    let root_type = match root_type_name(schema, operation.operation_type) {
        Ok(name) => name,
        Err(err) => return ExecutionResult::pre_execution(err),
    };

    let var_defs: Vec<VariableDefinition> = operation
        .variable_definitions
        .iter()
        .map(|def| def.node().clone())
        .collect_vec();
    let variables = match coerce_variables(schema, &var_defs, raw_variables) {
        Ok(vars) => vars,
        Err(err) => return ExecutionResult::pre_execution(err),
    };

    let ctx = Ctx {
        schema,
        document,
        runtime,
        variables: &variables,
        cancel,
    };
    let mut state = ExecState::default();

    let groups = match collect_fields(schema, document, &operation.selection_set, &root_type, &variables) {
        Ok(groups) => groups,
        Err(err) => return ExecutionResult {
            data: None,
            errors: vec![err],
        },
    };

    tracing::debug!(operation = %operation.operation_type, root_type = %root_type, fields = groups.len(), "executing operation");

    if operation.operation_type == OperationType::Mutation {
        for group in &groups {
            let mut pending = Vec::new();
            process_field_group(&ctx, &mut state, group, &root_type, &initial_value, &ResponsePath::root(), &mut pending);
            drive(&ctx, &mut state, pending).await;
        }
    } else {
        let mut pending = Vec::new();
        for group in &groups {
            process_field_group(&ctx, &mut state, group, &root_type, &initial_value, &ResponsePath::root(), &mut pending);
        }
        drive(&ctx, &mut state, pending).await;
    }

    state.into_result()
}

/// Spec §4.3.3: resolves `operation_name` against the document's
/// operations. An explicit name must match exactly one operation; `None`
/// is only valid when the document contains exactly one.
fn select_operation<'a>(
    document: &'a Document,
    operation_name: Option<&str>,
) -> Result<&'a OperationDefinition, RequestError> {
    match operation_name {
        Some(name) => document
            .operations()
            .map(|op| op.node())
            .find(|op| op.name.as_deref() == Some(name))
            .ok_or(RequestError::OperationNotFound),
        None => {
            let mut operations = document.operations().map(|op| op.node());
            let first = operations.next().ok_or(RequestError::OperationNotFound)?;
            if operations.next().is_some() {
                return Err(RequestError::OperationNotFound);
            }
            Ok(first)
        }
    }
}

fn root_type_name(schema: &dyn SchemaView, kind: OperationType) -> Result<String, RequestError> {
    match kind {
        OperationType::Query => Ok(schema.query_type().to_string()),
        OperationType::Mutation => schema
            .mutation_type()
            .map(str::to_string)
            .ok_or(RequestError::RootTypeNotFound { operation: "mutation" }),
        OperationType::Subscription => schema
            .subscription_type()
            .map(str::to_string)
            .ok_or(RequestError::RootTypeNotFound { operation: "subscription" }),
    }
}

/// Request-scoped collaborators threaded through one execution,
/// borrowed rather than owned since nothing here outlives the call to
/// [`execute_request`].
struct Ctx<'a> {
    schema: &'a dyn SchemaView,
    document: &'a Document,
    runtime: &'a dyn Runtime,
    variables: &'a Variables,
    cancel: &'a CancellationSignal,
}

/// One async field queued for the next batch call, carrying the extra
/// type/selection context [`AsyncTask`] itself doesn't (the runtime
/// only needs source/args; completing the result back into the
/// response tree needs the field's declared type and its merged AST
/// fields too).
struct PendingTask {
    task: AsyncTask,
    return_type: TypeRef,
    ast_fields: Vec<Field>,
}

/// Execution state accumulated across the whole BFS depth loop (spec
/// §3): the response tree, located errors in recording order, the
/// tombstone set, and per-path Non-Null bookkeeping.
#[derive(Default)]
struct ExecState {
    tree: serde_json::Value,
    data_is_null: bool,
    errors: Vec<LocatedError>,
    tombstones: Vec<ResponsePath>,
    non_null_fields: HashMap<String, bool>,
}

impl ExecState {
    fn record_nullability(&mut self, path: &ResponsePath, is_non_null: bool) {
        self.non_null_fields.insert(path.encode(), is_non_null);
    }

    fn is_non_null_at(&self, path: &ResponsePath) -> bool {
        self.non_null_fields.get(&path.encode()).copied().unwrap_or(false)
    }

    fn is_tombstoned(&self, path: &ResponsePath) -> bool {
        self.tombstones.iter().any(|t| path.starts_with(t))
    }

    fn add_error(&mut self, message: String, path: ResponsePath) {
        self.errors.push(LocatedError::new(message, path));
    }

    fn add_error_without_path(&mut self, message: String) {
        self.errors.push(LocatedError::without_path(message));
    }

    fn write(&mut self, path: &ResponsePath, value: serde_json::Value) {
        if self.is_tombstoned(path) {
            return;
        }
        write_at(&mut self.tree, path.segments(), value);
    }

    fn write_null(&mut self, path: &ResponsePath) {
        self.write(path, serde_json::Value::Null);
    }

    /// Marks `path` as nulled for the rest of this request (spec §4.3.2,
    /// §3 "Tombstone set"): subsequent writes at or under it are
    /// dropped, and in-flight pending tasks under it are pruned before
    /// their depth's batch call.
    fn tombstone(&mut self, path: &ResponsePath) {
        if self.tombstones.iter().any(|t| t == path) {
            return;
        }
        self.tombstones.push(path.clone());
        write_at(&mut self.tree, path.segments(), serde_json::Value::Null);
    }

    /// Spec §4.3.2: climbs from the violating field's own path to its
    /// nearest enclosing ancestor field (skipping over list indices)
    /// and tombstones exactly that one ancestor. The climb is a single
    /// hop: the ancestor field is where the Non-Null error is caught
    /// and absorbed, regardless of whether the ancestor's own declared
    /// type also happens to be Non-Null. Reaching the top of data (the
    /// violation was already at a top-level field) nulls the whole
    /// response instead.
    fn propagate_non_null(&mut self, path: &ResponsePath) {
        match path.nearest_nullable_ancestor() {
            None => self.data_is_null = true,
            Some(ancestor) => self.tombstone(&ancestor),
        }
    }

    /// A Non-Null violation (spec §4.3.1's "if *v* is nullish" rule):
    /// always records the error and always climbs.
    fn violate(&mut self, message: String, path: ResponsePath) {
        self.add_error(message, path.clone());
        self.propagate_non_null(&path);
    }

    /// Any other completion failure (spec §7): recorded at `path`
    /// regardless, then either climbs (if `path`'s own declared type is
    /// Non-Null) or just nulls `path` and lets execution continue.
    fn fail(&mut self, message: String, path: &ResponsePath, required: bool) {
        self.add_error(message, path.clone());
        if required {
            self.propagate_non_null(path);
        } else {
            self.write_null(path);
        }
    }

    fn into_result(self) -> ExecutionResult {
        ExecutionResult {
            data: if self.data_is_null { None } else { Some(self.tree) },
            errors: self.errors,
        }
    }
}

/// Writes `value` at `segments` into `tree`, growing missing objects
/// and arrays along the way. Used both for a field's normal completion
/// write and for a tombstone's forcible overwrite.
fn write_at(tree: &mut serde_json::Value, segments: &[PathSegment], value: serde_json::Value) {
    match segments.split_first() {
        None => *tree = value,
        Some((PathSegment::Name(name), rest)) => {
            if !tree.is_object() {
                *tree = serde_json::Value::Object(Default::default());
            }
            let entry = tree
                .as_object_mut()
                .expect("just normalized to an object")
                .entry(name.clone())
                .or_insert(serde_json::Value::Null);
            write_at(entry, rest, value);
        }
        Some((PathSegment::Index(index), rest)) => {
            if !tree.is_array() {
                *tree = serde_json::Value::Array(Vec::new());
            }
            let array = tree.as_array_mut().expect("just normalized to an array");
            while array.len() <= *index {
                array.push(serde_json::Value::Null);
            }
            write_at(&mut array[*index], rest, value);
        }
    }
}

/// Drains `pending` one depth at a time (spec §4.3, steps 2-4): a
/// single batch call per depth, with newly discovered async subfields
/// feeding the next depth's list, until nothing is left pending.
async fn drive(ctx: &Ctx<'_>, state: &mut ExecState, mut pending: Vec<PendingTask>) {
    let mut depth = 0usize;
    loop {
        pending.retain(|p| !state.is_tombstoned(&p.task.path));
        if pending.is_empty() {
            return;
        }

        if ctx.cancel.is_cancelled() {
            for pending_task in &pending {
                let path = pending_task.task.path.clone();
                let required = state.is_non_null_at(&path);
                state.fail(TransportError::Cancelled.to_string(), &path, required);
            }
            return;
        }

        tracing::trace!(depth, tasks = pending.len(), "dispatching async depth");
        let batch = std::mem::take(&mut pending);
        let async_tasks: Vec<AsyncTask> = batch.iter().map(|p| p.task.clone()).collect_vec();
        let results = match ctx.runtime.batch_resolve_async(&async_tasks, ctx.cancel).await {
            Ok(results) => results,
            Err(transport_err) => {
                let message = transport_err.to_string();
                for pending_task in &batch {
                    let path = pending_task.task.path.clone();
                    let required = state.is_non_null_at(&path);
                    state.fail(message.clone(), &path, required);
                }
                return;
            }
        };

        let mut next_pending = Vec::new();
        for (pending_task, result) in batch.into_iter().zip(results) {
            if state.is_tombstoned(&pending_task.task.path) {
                continue;
            }
            match result {
                Ok(value) => complete_value(
                    ctx,
                    state,
                    value,
                    &pending_task.return_type,
                    &pending_task.task.path,
                    &pending_task.ast_fields,
                    &mut next_pending,
                ),
                Err(located) => {
                    let path = located.path.clone().unwrap_or(pending_task.task.path);
                    let required = state.is_non_null_at(&path);
                    state.fail(located.message, &path, required);
                }
            }
        }
        pending = next_pending;
        depth += 1;
    }
}

/// Resolves one [`FieldGroup`] against `object_type`/`source` (spec
/// §4.3.3): coerces the primary field's arguments, then either
/// resolves it inline (sync) or queues it (async). `parent_path` is
/// the already-completed object's own path; the field's own path is
/// `parent_path` with the group's response name appended.
fn process_field_group(
    ctx: &Ctx,
    state: &mut ExecState,
    group: &FieldGroup,
    object_type: &str,
    source: &Value,
    parent_path: &ResponsePath,
    pending: &mut Vec<PendingTask>,
) {
    let field_path = parent_path.with_name(&group.response_name);
    let primary = group.primary();

    if primary.name == "__typename" {
        state.record_nullability(&field_path, true);
        state.write(&field_path, serde_json::Value::String(object_type.to_string()));
        return;
    }

    let field_def = match ctx.schema.type_def(object_type).and_then(|td| td.field(&primary.name)) {
        Some(field_def) => field_def,
        None => configuration_error(format!(
            "no field '{}' declared on type '{}'",
            primary.name, object_type
        )),
    };

    state.record_nullability(&field_path, field_def.ty.is_non_null());

    let args = match coerce_arguments(ctx.schema, &field_def.arguments, &primary.arguments, ctx.variables) {
        Ok(args) => args,
        Err(err) => {
            state.fail(err.message, &field_path, field_def.ty.is_non_null());
            return;
        }
    };

    if field_def.is_async {
        pending.push(PendingTask {
            task: AsyncTask {
                path: field_path,
                object_type: object_type.to_string(),
                field_name: primary.name.clone(),
                source: source.clone(),
                args,
            },
            return_type: field_def.ty.clone(),
            ast_fields: group.fields.clone(),
        });
    } else {
        let value = ctx.runtime.resolve_sync(object_type, &primary.name, source, &args, ctx.cancel);
        complete_value(ctx, state, value, &field_def.ty, &field_path, &group.fields, pending);
    }
}

/// Value Completion (spec §4.3.1): dispatches on `ty`'s outermost
/// layer. `ty` is the field's (or list element's) declared type
/// exactly as written in the schema, not yet unwrapped.
fn complete_value(
    ctx: &Ctx,
    state: &mut ExecState,
    value: Value,
    ty: &TypeRef,
    path: &ResponsePath,
    ast_fields: &[Field],
    pending: &mut Vec<PendingTask>,
) {
    state.record_nullability(path, ty.is_non_null());
    match ty {
        TypeRef::NonNull(inner) => {
            if value.is_nullish() {
                state.violate(
                    format!("Cannot return null for non-nullable field {}", path),
                    path.clone(),
                );
                return;
            }
            match inner.as_ref() {
                TypeRef::List(element_ty) => {
                    complete_list(ctx, state, value, element_ty, path, ast_fields, pending, true)
                }
                TypeRef::Named(name) => {
                    complete_named(ctx, state, value, name, path, ast_fields, pending, true)
                }
                TypeRef::NonNull(_) => unreachable!("non-null never directly wraps non-null"),
            }
        }
        TypeRef::List(element_ty) => {
            complete_list(ctx, state, value, element_ty, path, ast_fields, pending, false)
        }
        TypeRef::Named(name) => {
            complete_named(ctx, state, value, name, path, ast_fields, pending, false)
        }
    }
}

/// `required` reflects whether `path`'s own declared type was
/// `NonNull` (threaded down from [`complete_value`], not re-derived
/// from `element_ty`): it decides whether a shape error at this exact
/// position climbs or just nulls the slot.
#[allow(clippy::too_many_arguments)]
fn complete_list(
    ctx: &Ctx,
    state: &mut ExecState,
    value: Value,
    element_ty: &TypeRef,
    path: &ResponsePath,
    ast_fields: &[Field],
    pending: &mut Vec<PendingTask>,
    required: bool,
) {
    if value.is_nullish() {
        if required {
            state.violate(
                format!("Cannot return null for non-nullable field {}", path),
                path.clone(),
            );
        } else {
            state.write_null(path);
        }
        return;
    }
    let items = match value {
        Value::List(items) => items,
        other => {
            state.fail(
                format!("expected a list for field {}, got {:?}", path, other),
                path,
                required,
            );
            return;
        }
    };
    for (index, item) in items.into_iter().enumerate() {
        complete_value(ctx, state, item, element_ty, &path.with_index(index), ast_fields, pending);
    }
}

#[allow(clippy::too_many_arguments)]
fn complete_named(
    ctx: &Ctx,
    state: &mut ExecState,
    value: Value,
    type_name: &str,
    path: &ResponsePath,
    ast_fields: &[Field],
    pending: &mut Vec<PendingTask>,
    required: bool,
) {
    if value.is_nullish() {
        if required {
            state.violate(
                format!("Cannot return null for non-nullable field {}", path),
                path.clone(),
            );
        } else {
            state.write_null(path);
        }
        return;
    }

    match ctx.schema.type_def(type_name).map(|td| &td.kind) {
        None | Some(TypeKind::Scalar) | Some(TypeKind::Enum) => {
            match ctx.runtime.serialize_leaf(type_name, &value, ctx.cancel) {
                Ok(json) => state.write(path, json),
                Err(message) => state.fail(message, path, required),
            }
        }
        Some(TypeKind::Object) => {
            complete_object(ctx, state, value, type_name, path, ast_fields, pending)
        }
        Some(TypeKind::Interface) | Some(TypeKind::Union) => {
            complete_abstract(ctx, state, value, type_name, path, ast_fields, pending, required)
        }
        Some(TypeKind::InputObject) => {
            configuration_error(format!("input object type '{}' used as an output type", type_name))
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn complete_abstract(
    ctx: &Ctx,
    state: &mut ExecState,
    value: Value,
    abstract_type: &str,
    path: &ResponsePath,
    ast_fields: &[Field],
    pending: &mut Vec<PendingTask>,
    required: bool,
) {
    let concrete_type = ctx.runtime.resolve_type(abstract_type, &value);
    let satisfies = ctx
        .schema
        .type_def(&concrete_type)
        .map(|td| td.satisfies(abstract_type))
        .unwrap_or(false);
    if !satisfies {
        state.fail(
            format!(
                "Abstract type {} must resolve to an Object type at runtime. Got: {}",
                abstract_type, concrete_type
            ),
            path,
            required,
        );
        return;
    }
    complete_object(ctx, state, value, &concrete_type, path, ast_fields, pending);
}

fn complete_object(
    ctx: &Ctx,
    state: &mut ExecState,
    value: Value,
    object_type: &str,
    path: &ResponsePath,
    ast_fields: &[Field],
    pending: &mut Vec<PendingTask>,
) {
    let merged = merged_selection_set(ast_fields);
    match collect_fields(ctx.schema, ctx.document, &merged, object_type, ctx.variables) {
        Ok(groups) => {
            for group in &groups {
                process_field_group(ctx, state, group, object_type, &value, path, pending);
            }
        }
        Err(err) => {
            let required = state.is_non_null_at(path);
            state.fail(err.message, path, required);
        }
    }
}

/// Merges every merged field's own sub-selection into one set (spec
/// §4.2: a duplicate response name's selections are combined, one
/// level down, before the next [`collect_fields`] call).
fn merged_selection_set(fields: &[Field]) -> SelectionSet {
    SelectionSet {
        items: fields
            .iter()
            .flat_map(|field| field.selection_set.node().items.clone())
            .collect_vec(),
    }
}
