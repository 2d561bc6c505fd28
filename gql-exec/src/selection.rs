//! Collecting and merging the fields that apply to a concrete object
//! type out of a selection set, honoring `@skip`/`@include` and
//! expanding fragments.

use crate::coercion::Variables;
use crate::error::LocatedError;
use crate::schema::SchemaView;
use crate::value::Value;
use gql_exec_parser::ast::{Document, Field, FragmentDefinition, Selection, SelectionSet, TypeCondition};
use indexmap::IndexMap;
use std::collections::HashSet;

/// One response-name group: every AST field in first-appearance order
/// that contributes to it, across however many duplicate selections
/// share the response name.
#[derive(Debug, Clone)]
pub struct FieldGroup {
    pub response_name: String,
    pub fields: Vec<Field>,
}

impl FieldGroup {
    /// The field whose arguments/directives drive resolution. Merging
    /// here only needs to agree on response shape, not validate
    /// cross-field argument compatibility, so the first-appearing
    /// field is authoritative.
    pub fn primary(&self) -> &Field {
        &self.fields[0]
    }
}

/// Collects and merges the fields of `selection_set` that apply to
/// `object_type`, expanding fragment spreads and inline fragments and
/// evaluating `@skip`/`@include`. Returns groups in first-appearance
/// order.
pub fn collect_fields(
    schema: &dyn SchemaView,
    document: &Document,
    selection_set: &SelectionSet,
    object_type: &str,
    variables: &Variables,
) -> Result<Vec<FieldGroup>, LocatedError> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: IndexMap<String, Vec<Field>> = IndexMap::new();
    let mut visited_fragments: HashSet<String> = HashSet::new();

    collect_into(
        schema,
        document,
        selection_set,
        object_type,
        variables,
        &mut visited_fragments,
        &mut groups,
        &mut order,
    )?;

    Ok(order
        .into_iter()
        .map(|response_name| {
            let fields = groups.remove(&response_name).unwrap_or_default();
            FieldGroup {
                response_name,
                fields,
            }
        })
        .collect())
}

#[allow(clippy::too_many_arguments)]
fn collect_into(
    schema: &dyn SchemaView,
    document: &Document,
    selection_set: &SelectionSet,
    object_type: &str,
    variables: &Variables,
    visited_fragments: &mut HashSet<String>,
    groups: &mut IndexMap<String, Vec<Field>>,
    order: &mut Vec<String>,
) -> Result<(), LocatedError> {
    for selection in &selection_set.items {
        match selection {
            Selection::Field(field) => {
                if directives_skip(field.directives.iter().map(|d| d.node()), variables)? {
                    continue;
                }
                let response_name = field.response_name().to_string();
                if !groups.contains_key(&response_name) {
                    order.push(response_name.clone());
                }
                groups
                    .entry(response_name)
                    .or_default()
                    .push(field.node().clone());
            }
            Selection::InlineFragment(inline) => {
                if directives_skip(inline.directives.iter().map(|d| d.node()), variables)? {
                    continue;
                }
                let applies = match &inline.type_condition {
                    Some(TypeCondition::On(condition)) => type_condition_matches(
                        schema, condition, object_type,
                    ),
                    None => true,
                };
                if applies {
                    collect_into(
                        schema,
                        document,
                        &inline.selection_set,
                        object_type,
                        variables,
                        visited_fragments,
                        groups,
                        order,
                    )?;
                }
            }
            Selection::FragmentSpread(spread) => {
                if directives_skip(spread.directives.iter().map(|d| d.node()), variables)? {
                    continue;
                }
                if !visited_fragments.insert(spread.fragment_name.clone()) {
                    // a fragment already on the current expansion path
                    // is skipped, not an error.
                    continue;
                }
                if let Some(fragment) = find_fragment(document, &spread.fragment_name) {
                    let TypeCondition::On(condition) = &fragment.type_condition;
                    if type_condition_matches(schema, condition, object_type) {
                        collect_into(
                            schema,
                            document,
                            &fragment.selection_set,
                            object_type,
                            variables,
                            visited_fragments,
                            groups,
                            order,
                        )?;
                    }
                }
                visited_fragments.remove(&spread.fragment_name);
            }
        }
    }
    Ok(())
}

fn find_fragment<'a>(document: &'a Document, name: &str) -> Option<&'a FragmentDefinition> {
    document.fragments().map(|f| f.node()).find(|f| f.name == name)
}

/// True for identity, or when `condition` names an interface/union the
/// concrete type belongs to.
fn type_condition_matches(schema: &dyn SchemaView, condition: &str, object_type: &str) -> bool {
    if condition == object_type {
        return true;
    }
    match schema.type_def(object_type) {
        Some(type_def) => type_def.satisfies(condition),
        None => false,
    }
}

/// Evaluates `@skip`/`@include` on one node's directive list (already
/// variable-substituted): `true` means the node is excluded.
fn directives_skip<'a>(
    directives: impl Iterator<Item = &'a gql_exec_parser::ast::Directive>,
    variables: &Variables,
) -> Result<bool, LocatedError> {
    for directive in directives {
        let if_arg = directive.argument("if");
        let value = match if_arg {
            Some(gql_exec_parser::GqlValue::Variable(name)) => {
                matches!(variables.get(name), Some(Value::Bool(true)))
            }
            Some(gql_exec_parser::GqlValue::Boolean(b)) => *b,
            _ => {
                return Err(LocatedError::without_path(format!(
                    "directive @{} requires a boolean 'if' argument",
                    directive.name
                )))
            }
        };
        match directive.name.as_str() {
            "skip" if value => return Ok(true),
            "include" if !value => return Ok(true),
            _ => {}
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Schema, TypeDef, TypeKind};
    use gql_exec_parser::parse_query;
    use indexmap::{IndexMap as Map, IndexSet};

    fn schema_with_iface() -> std::sync::Arc<Schema> {
        let mut node = TypeDef {
            name: "Node".to_string(),
            kind: TypeKind::Interface,
            fields: Map::new(),
            possible_types: IndexSet::new(),
            interfaces: IndexSet::new(),
        };
        node.possible_types.insert("User".to_string());

        let mut user = TypeDef {
            name: "User".to_string(),
            kind: TypeKind::Object,
            fields: Map::new(),
            possible_types: IndexSet::new(),
            interfaces: IndexSet::new(),
        };
        user.interfaces.insert("Node".to_string());

        Schema::builder("Query")
            .type_def(node)
            .type_def(user)
            .build()
    }

    #[test]
    fn merges_duplicate_response_names_in_order() {
        let schema = schema_with_iface();
        let doc = parse_query("{ a a b }").unwrap();
        let op = doc.operations().next().unwrap();
        let groups = collect_fields(
            schema.as_ref(),
            &doc,
            &op.selection_set,
            "User",
            &Variables::new(),
        )
        .unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].response_name, "a");
        assert_eq!(groups[0].fields.len(), 2);
        assert_eq!(groups[1].response_name, "b");
    }

    #[test]
    fn skip_excludes_field() {
        let schema = schema_with_iface();
        let doc = parse_query("{ a @skip(if: true) b }").unwrap();
        let op = doc.operations().next().unwrap();
        let groups = collect_fields(
            schema.as_ref(),
            &doc,
            &op.selection_set,
            "User",
            &Variables::new(),
        )
        .unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].response_name, "b");
    }

    #[test]
    fn inline_fragment_on_interface_applies_to_implementing_type() {
        let schema = schema_with_iface();
        let doc = parse_query("{ ... on Node { a } }").unwrap();
        let op = doc.operations().next().unwrap();
        let groups = collect_fields(
            schema.as_ref(),
            &doc,
            &op.selection_set,
            "User",
            &Variables::new(),
        )
        .unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].response_name, "a");
    }

    #[test]
    fn fragment_spread_cycle_is_skipped_not_infinite() {
        let schema = schema_with_iface();
        let doc = parse_query(
            r#"
            { ...Cyclic }
            fragment Cyclic on User { a ...Cyclic }
            "#,
        )
        .unwrap();
        let op = doc.operations().next().unwrap();
        let groups = collect_fields(
            schema.as_ref(),
            &doc,
            &op.selection_set,
            "User",
            &Variables::new(),
        )
        .unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].response_name, "a");
    }
}
