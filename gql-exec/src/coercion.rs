//! Turning request variables and argument literals into the executor's
//! dynamic `Value` domain, against a field or variable's declared
//! `TypeRef`.

use crate::error::{LocatedError, RequestError};
use crate::schema::{SchemaView, TypeKind, TypeRef};
use crate::value::Value;
use gql_exec_parser::ast::VariableDefinition;
use gql_exec_parser::{GqlValue, Positioned};
use indexmap::IndexMap;

pub type Variables = IndexMap<String, Value>;

/// Coerces the request's raw JSON `variables` object against the
/// operation's variable definitions: provided value or declared
/// default → required-but-absent failure → null-into-non-null failure
/// → recursive coercion, in that order.
pub fn coerce_variables(
    schema: &dyn SchemaView,
    definitions: &[VariableDefinition],
    raw: &serde_json::Map<String, serde_json::Value>,
) -> Result<Variables, RequestError> {
    let mut out = Variables::new();
    for def in definitions {
        let ty = TypeRef::from(&def.var_type);
        let value = match raw.get(&def.name) {
            Some(json) => coerce_json(schema, json, &ty)?,
            None => match &def.default_value {
                Some(default) => coerce_literal(schema, default, &ty, &Variables::new())?,
                None => {
                    if ty.is_non_null() {
                        return Err(RequestError::VariableNotProvided {
                            name: def.name.clone(),
                            ty: ty.to_string(),
                        });
                    }
                    Value::Null
                }
            },
        };

        if value.is_nullish() && ty.is_non_null() {
            return Err(RequestError::VariableNull {
                name: def.name.clone(),
                ty: ty.to_string(),
            });
        }
        out.insert(def.name.clone(), value);
    }
    Ok(out)
}

/// Coerces one field's arguments: declared defaults are
/// injected for absent arguments, and a missing-but-required argument
/// is a located error scoped to this field rather than a pre-execution
/// failure, since the rest of the request can still proceed.
pub fn coerce_arguments(
    schema: &dyn SchemaView,
    arg_defs: &[crate::schema::ArgumentDef],
    provided: &[(String, Positioned<GqlValue>)],
    variables: &Variables,
) -> Result<IndexMap<String, Value>, LocatedError> {
    let mut out = IndexMap::new();
    for arg_def in arg_defs {
        let literal = provided.iter().find(|(name, _)| name == &arg_def.name);
        let value = match literal {
            Some((_, gql_value)) => {
                coerce_literal(schema, gql_value.node(), &arg_def.ty, variables).map_err(|e| {
                    LocatedError::without_path(format!(
                        "argument '{}': {}",
                        arg_def.name, e
                    ))
                })?
            }
            None => match &arg_def.default_value {
                Some(default) => default.clone(),
                None => {
                    if arg_def.ty.is_non_null() {
                        return Err(LocatedError::without_path(format!(
                            "argument '{}' of required type {} was not provided",
                            arg_def.name, arg_def.ty
                        )));
                    }
                    Value::Null
                }
            },
        };

        if value.is_nullish() && arg_def.ty.is_non_null() && literal.is_some() {
            return Err(LocatedError::without_path(format!(
                "argument '{}' of type {} cannot be null",
                arg_def.name, arg_def.ty
            )));
        }
        out.insert(arg_def.name.clone(), value);
    }
    Ok(out)
}

/// Coerces a literal AST value (a default value or an argument
/// literal), resolving `$variable` references against already-coerced
/// variables.
fn coerce_literal(
    schema: &dyn SchemaView,
    literal: &GqlValue,
    ty: &TypeRef,
    variables: &Variables,
) -> Result<Value, RequestError> {
    if let GqlValue::Variable(name) = literal {
        return Ok(variables.get(name).cloned().unwrap_or(Value::Null));
    }

    if let TypeRef::NonNull(inner) = ty {
        if matches!(literal, GqlValue::Null) {
            return Err(RequestError::Coercion(format!(
                "null provided for non-null type {}",
                ty
            )));
        }
        return coerce_literal(schema, literal, inner, variables);
    }

    if matches!(literal, GqlValue::Null) {
        return Ok(Value::Null);
    }

    match ty {
        TypeRef::List(element_ty) => match literal {
            GqlValue::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(coerce_literal(schema, item, element_ty, variables)?);
                }
                Ok(Value::List(out))
            }
            // A lone value for a list type is coerced as a single-item list.
            other => Ok(Value::List(vec![coerce_literal(
                schema, other, element_ty, variables,
            )?])),
        },
        TypeRef::Named(name) => coerce_named_literal(schema, literal, name, variables),
        TypeRef::NonNull(_) => unreachable!("non-null handled above"),
    }
}

fn coerce_named_literal(
    schema: &dyn SchemaView,
    literal: &GqlValue,
    type_name: &str,
    variables: &Variables,
) -> Result<Value, RequestError> {
    match schema.type_def(type_name).map(|t| &t.kind) {
        Some(TypeKind::InputObject) => match literal {
            GqlValue::Object(fields) => {
                let mut out = IndexMap::new();
                for (key, value) in fields {
                    out.insert(key.clone(), literal_to_value_inferred(value, variables)?);
                }
                Ok(Value::Map(out))
            }
            _ => Err(RequestError::Coercion(format!(
                "expected an input object for {}",
                type_name
            ))),
        },
        Some(TypeKind::Enum) => match literal {
            GqlValue::Enum(name) => Ok(Value::String(name.clone())),
            GqlValue::String(s) => Ok(Value::String(s.clone())),
            _ => Err(RequestError::Coercion(format!(
                "expected an enum value for {}",
                type_name
            ))),
        },
        _ => coerce_scalar_literal(literal, type_name),
    }
}

/// The built-in scalar Accepts/Rejects table (spec §4.1): a type name
/// outside this set is a custom scalar and accepts any literal shape
/// structurally, but `Int`/`Float`/`String`/`Boolean`/`ID` each reject
/// shapes outside their own column rather than falling back to
/// inference.
fn coerce_scalar_literal(literal: &GqlValue, type_name: &str) -> Result<Value, RequestError> {
    match type_name {
        "Int" => match literal {
            GqlValue::Int(n) => i32::try_from(*n)
                .map(Value::Int32)
                .map_err(|_| RequestError::Coercion(format!("{} does not fit in Int", n))),
            GqlValue::String(s) => s
                .parse::<i32>()
                .map(Value::Int32)
                .map_err(|_| RequestError::Coercion(format!("{:?} is not a valid Int", s))),
            GqlValue::Boolean(_) => Err(RequestError::Coercion(
                "Boolean cannot be coerced to Int".to_string(),
            )),
            GqlValue::Float(f) => Err(RequestError::Coercion(format!(
                "{} is not a valid Int (float with a fraction)",
                f
            ))),
            other => Err(RequestError::Coercion(format!("{} is not a valid Int", other))),
        },
        "Float" => match literal {
            GqlValue::Int(n) => Ok(Value::Float64(*n as f64)),
            GqlValue::Float(f) => Ok(Value::Float64(*f)),
            GqlValue::String(s) => s
                .parse::<f64>()
                .map(Value::Float64)
                .map_err(|_| RequestError::Coercion(format!("{:?} is not a valid Float", s))),
            GqlValue::Boolean(_) => Err(RequestError::Coercion(
                "Boolean cannot be coerced to Float".to_string(),
            )),
            other => Err(RequestError::Coercion(format!("{} is not a valid Float", other))),
        },
        "String" => Ok(Value::String(literal_to_string(literal))),
        "Boolean" => match literal {
            GqlValue::Boolean(b) => Ok(Value::Bool(*b)),
            other => Err(RequestError::Coercion(format!("{} is not a valid Boolean", other))),
        },
        "ID" => match literal {
            GqlValue::String(s) => Ok(Value::String(s.clone())),
            GqlValue::Int(n) => Ok(Value::String(n.to_string())),
            other => Err(RequestError::Coercion(format!("{} is not a valid ID", other))),
        },
        // Custom scalars accept any literal shape; store it structurally.
        _ => literal_to_value_inferred(literal, &Variables::new()),
    }
}

/// "any -> string formatting" (spec §4.1's `String` row): every literal
/// shape formats to a string, with a bare string passed through as-is
/// rather than re-quoted through `GqlValue`'s `Display` impl.
fn literal_to_string(literal: &GqlValue) -> String {
    match literal {
        GqlValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Converts a literal to `Value` by the literal's own shape, used for
/// custom scalars and input object fields this minimal schema doesn't
/// separately declare field types for.
fn literal_to_value_inferred(
    literal: &GqlValue,
    variables: &Variables,
) -> Result<Value, RequestError> {
    Ok(match literal {
        GqlValue::Variable(name) => variables.get(name).cloned().unwrap_or(Value::Null),
        GqlValue::Int(n) => match i32::try_from(*n) {
            Ok(n32) => Value::Int32(n32),
            Err(_) => Value::Int64(*n),
        },
        GqlValue::Float(f) => Value::Float64(*f),
        GqlValue::String(s) => Value::String(s.clone()),
        GqlValue::Boolean(b) => Value::Bool(*b),
        GqlValue::Null => Value::Null,
        GqlValue::Enum(name) => Value::String(name.clone()),
        GqlValue::List(items) => Value::List(
            items
                .iter()
                .map(|v| literal_to_value_inferred(v, variables))
                .collect::<Result<_, _>>()?,
        ),
        GqlValue::Object(fields) => {
            let mut out = IndexMap::new();
            for (k, v) in fields {
                out.insert(k.clone(), literal_to_value_inferred(v, variables)?);
            }
            Value::Map(out)
        }
    })
}

/// Coerces a raw JSON variable value against a declared type.
fn coerce_json(
    schema: &dyn SchemaView,
    json: &serde_json::Value,
    ty: &TypeRef,
) -> Result<Value, RequestError> {
    if let TypeRef::NonNull(inner) = ty {
        if json.is_null() {
            return Err(RequestError::Coercion(format!(
                "null provided for non-null type {}",
                ty
            )));
        }
        return coerce_json(schema, json, inner);
    }

    if json.is_null() {
        return Ok(Value::Null);
    }

    match ty {
        TypeRef::List(element_ty) => match json {
            serde_json::Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(coerce_json(schema, item, element_ty)?);
                }
                Ok(Value::List(out))
            }
            other => Ok(Value::List(vec![coerce_json(schema, other, element_ty)?])),
        },
        TypeRef::Named(name) => coerce_named_json(schema, json, name),
        TypeRef::NonNull(_) => unreachable!("non-null handled above"),
    }
}

fn coerce_named_json(
    schema: &dyn SchemaView,
    json: &serde_json::Value,
    type_name: &str,
) -> Result<Value, RequestError> {
    match schema.type_def(type_name).map(|t| &t.kind) {
        Some(TypeKind::InputObject) => match json {
            serde_json::Value::Object(fields) => {
                let mut out = IndexMap::new();
                for (key, value) in fields {
                    out.insert(key.clone(), json_to_value_inferred(value));
                }
                Ok(Value::Map(out))
            }
            _ => Err(RequestError::Coercion(format!(
                "expected an input object for {}",
                type_name
            ))),
        },
        Some(TypeKind::Enum) => match json {
            serde_json::Value::String(s) => Ok(Value::String(s.clone())),
            _ => Err(RequestError::Coercion(format!(
                "expected an enum value for {}",
                type_name
            ))),
        },
        _ => coerce_scalar_json(json, type_name),
    }
}

/// The JSON-side mirror of [`coerce_scalar_literal`]'s Accepts/Rejects
/// table.
fn coerce_scalar_json(json: &serde_json::Value, type_name: &str) -> Result<Value, RequestError> {
    match type_name {
        "Int" => match json {
            serde_json::Value::Number(n) => n
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .map(Value::Int32)
                .ok_or_else(|| RequestError::Coercion(format!("{} is not a valid Int", n))),
            serde_json::Value::String(s) => s
                .parse::<i32>()
                .map(Value::Int32)
                .map_err(|_| RequestError::Coercion(format!("{:?} is not a valid Int", s))),
            serde_json::Value::Bool(_) => Err(RequestError::Coercion(
                "Boolean cannot be coerced to Int".to_string(),
            )),
            other => Err(RequestError::Coercion(format!("{} is not a valid Int", other))),
        },
        "Float" => match json {
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(Value::Float64)
                .ok_or_else(|| RequestError::Coercion(format!("{} is not a valid Float", n))),
            serde_json::Value::String(s) => s
                .parse::<f64>()
                .map(Value::Float64)
                .map_err(|_| RequestError::Coercion(format!("{:?} is not a valid Float", s))),
            serde_json::Value::Bool(_) => Err(RequestError::Coercion(
                "Boolean cannot be coerced to Float".to_string(),
            )),
            other => Err(RequestError::Coercion(format!("{} is not a valid Float", other))),
        },
        "String" => Ok(Value::String(json_to_string(json))),
        "Boolean" => match json {
            serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
            other => Err(RequestError::Coercion(format!("{} is not a valid Boolean", other))),
        },
        "ID" => match json {
            serde_json::Value::String(s) => Ok(Value::String(s.clone())),
            serde_json::Value::Number(n) => Ok(Value::String(n.to_string())),
            other => Err(RequestError::Coercion(format!("{} is not a valid ID", other))),
        },
        _ => Ok(json_to_value_inferred(json)),
    }
}

/// "any -> string formatting" for the JSON domain; a bare string
/// passes through rather than being re-quoted via `serde_json::Value`'s
/// `Display` impl.
fn json_to_string(json: &serde_json::Value) -> String {
    match json {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_to_value_inferred(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64().and_then(|n| i32::try_from(n).ok()) {
                Value::Int32(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float64(f)
            } else {
                Value::Null
            }
        }
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => {
            Value::List(items.iter().map(json_to_value_inferred).collect())
        }
        serde_json::Value::Object(fields) => {
            let mut out = IndexMap::new();
            for (k, v) in fields {
                out.insert(k.clone(), json_to_value_inferred(v));
            }
            Value::Map(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Schema, TypeDef, TypeKind};
    use gql_exec_parser::ast::Type as AstType;
    use indexmap::{IndexMap as Map, IndexSet};

    fn test_schema() -> std::sync::Arc<Schema> {
        Schema::builder("Query")
            .type_def(TypeDef {
                name: "Query".to_string(),
                kind: TypeKind::Object,
                fields: Map::new(),
                possible_types: IndexSet::new(),
                interfaces: IndexSet::new(),
            })
            .build()
    }

    fn var_def(name: &str, ty: TypeRef, default_value: Option<GqlValue>) -> VariableDefinition {
        VariableDefinition {
            name: name.to_string(),
            var_type: ast_type_from(ty),
            default_value,
        }
    }

    // the AST's `Type` mirrors our `TypeRef` one-for-one; used only to
    // assemble fixtures without hand-writing VariableDefinition::var_type
    // in AST form at every call site.
    fn ast_type_from(ty: TypeRef) -> AstType {
        match ty {
            TypeRef::Named(n) => AstType::Named(n),
            TypeRef::List(inner) => AstType::List(Box::new(ast_type_from(*inner))),
            TypeRef::NonNull(inner) => AstType::NonNull(Box::new(ast_type_from(*inner))),
        }
    }

    #[test]
    fn missing_required_variable_is_request_error() {
        let schema = test_schema();
        let defs = vec![var_def("id", TypeRef::non_null(TypeRef::named("ID")), None)];
        let raw = serde_json::Map::new();
        let err = coerce_variables(schema.as_ref(), &defs, &raw).unwrap_err();
        assert!(matches!(err, RequestError::VariableNotProvided { .. }));
    }

    #[test]
    fn null_for_non_null_variable_is_request_error() {
        let schema = test_schema();
        let defs = vec![var_def("id", TypeRef::non_null(TypeRef::named("ID")), None)];
        let mut raw = serde_json::Map::new();
        raw.insert("id".to_string(), serde_json::Value::Null);
        let err = coerce_variables(schema.as_ref(), &defs, &raw).unwrap_err();
        assert!(matches!(err, RequestError::VariableNull { .. }));
    }

    #[test]
    fn default_value_used_when_absent() {
        let schema = test_schema();
        let defs = vec![var_def(
            "limit",
            TypeRef::named("Int"),
            Some(GqlValue::Int(10)),
        )];
        let raw = serde_json::Map::new();
        let vars = coerce_variables(schema.as_ref(), &defs, &raw).unwrap();
        assert!(matches!(vars.get("limit"), Some(Value::Int32(10))));
    }

    #[test]
    fn lone_value_is_wrapped_into_list() {
        let schema = test_schema();
        let defs = vec![var_def("tags", TypeRef::list(TypeRef::named("String")), None)];
        let mut raw = serde_json::Map::new();
        raw.insert(
            "tags".to_string(),
            serde_json::Value::String("a".to_string()),
        );
        let vars = coerce_variables(schema.as_ref(), &defs, &raw).unwrap();
        match vars.get("tags") {
            Some(Value::List(items)) => assert_eq!(items.len(), 1),
            other => panic!("expected a single-element list, got {:?}", other),
        }
    }

    #[test]
    fn int_accepts_numeric_string() {
        assert!(matches!(
            coerce_scalar_json(&serde_json::json!("42"), "Int"),
            Ok(Value::Int32(42))
        ));
        assert!(matches!(
            coerce_scalar_literal(&GqlValue::String("42".to_string()), "Int"),
            Ok(Value::Int32(42))
        ));
    }

    #[test]
    fn int_rejects_bool_and_fractional_float() {
        assert!(coerce_scalar_json(&serde_json::json!(true), "Int").is_err());
        assert!(coerce_scalar_json(&serde_json::json!(1.5), "Int").is_err());
        assert!(coerce_scalar_literal(&GqlValue::Boolean(true), "Int").is_err());
        assert!(coerce_scalar_literal(&GqlValue::Float(1.5), "Int").is_err());
    }

    #[test]
    fn float_accepts_numeric_string_and_rejects_bool() {
        assert!(matches!(
            coerce_scalar_json(&serde_json::json!("1.5"), "Float"),
            Ok(Value::Float64(f)) if f == 1.5
        ));
        assert!(coerce_scalar_json(&serde_json::json!(false), "Float").is_err());
        assert!(coerce_scalar_literal(&GqlValue::Boolean(false), "Float").is_err());
    }

    #[test]
    fn string_formats_any_scalar_shape() {
        assert!(matches!(
            coerce_scalar_json(&serde_json::json!(5), "String"),
            Ok(Value::String(s)) if s == "5"
        ));
        assert!(matches!(
            coerce_scalar_literal(&GqlValue::Int(5), "String"),
            Ok(Value::String(s)) if s == "5"
        ));
        assert!(matches!(
            coerce_scalar_literal(&GqlValue::Boolean(true), "String"),
            Ok(Value::String(s)) if s == "true"
        ));
    }

    #[test]
    fn boolean_rejects_string_and_number() {
        assert!(coerce_scalar_json(&serde_json::json!("true"), "Boolean").is_err());
        assert!(coerce_scalar_json(&serde_json::json!(1), "Boolean").is_err());
        assert!(coerce_scalar_literal(&GqlValue::String("true".to_string()), "Boolean").is_err());
        assert!(coerce_scalar_literal(&GqlValue::Int(1), "Boolean").is_err());
    }

    #[test]
    fn custom_scalar_falls_back_to_structural_inference() {
        match coerce_scalar_json(&serde_json::json!({"x": 1}), "JSON") {
            Ok(Value::Map(fields)) => assert!(matches!(fields.get("x"), Some(Value::Int32(1)))),
            other => panic!("expected a structural map, got {:?}", other),
        }
    }
}
