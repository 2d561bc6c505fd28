use gql_exec_parser::ast::{Definition, OperationType, Selection};
use gql_exec_parser::{parse_query, parse_value, GqlValue};
use pretty_assertions::assert_eq;

#[test]
fn parses_anonymous_query_shorthand() {
    let doc = parse_query("{ a b }").unwrap();
    assert_eq!(doc.definitions.len(), 1);
    let Definition::Operation(op) = &doc.definitions[0] else {
        panic!("expected an operation definition");
    };
    assert_eq!(op.operation_type, OperationType::Query);
    assert_eq!(op.selection_set.items.len(), 2);
}

#[test]
fn parses_alias_and_nested_selection() {
    let doc = parse_query("query Named { root: obj { x y } }").unwrap();
    let Definition::Operation(op) = &doc.definitions[0] else {
        panic!("expected an operation definition");
    };
    assert_eq!(op.name.as_deref(), Some("Named"));
    let Selection::Field(field) = &op.selection_set.items[0] else {
        panic!("expected a field selection");
    };
    assert_eq!(field.alias.as_deref(), Some("root"));
    assert_eq!(field.name, "obj");
    assert_eq!(field.response_name(), "root");
    assert_eq!(field.selection_set.items.len(), 2);
}

#[test]
fn parses_directives_with_arguments() {
    let doc = parse_query("{ a @skip(if: true) b @include(if: $flag) }").unwrap();
    let Definition::Operation(op) = &doc.definitions[0] else {
        panic!("expected an operation definition");
    };
    let Selection::Field(a) = &op.selection_set.items[0] else {
        panic!("expected a field")
    };
    assert_eq!(a.directives[0].name, "skip");
    assert_eq!(a.directives[0].argument("if"), Some(&GqlValue::Boolean(true)));

    let Selection::Field(b) = &op.selection_set.items[1] else {
        panic!("expected a field")
    };
    assert_eq!(
        b.directives[0].argument("if"),
        Some(&GqlValue::Variable("flag".to_string()))
    );
}

#[test]
fn parses_fragment_spread_and_inline_fragment() {
    let doc = parse_query(
        r#"
        query {
            iface {
                ... on Obj { a }
                ...Common
            }
        }
        fragment Common on Node { id }
        "#,
    )
    .unwrap();

    let fragments: Vec<_> = doc.fragments().collect();
    assert_eq!(fragments.len(), 1);
    assert_eq!(fragments[0].name, "Common");

    let Definition::Operation(op) = &doc.definitions[0] else {
        panic!("expected an operation definition");
    };
    let Selection::Field(iface) = &op.selection_set.items[0] else {
        panic!("expected a field");
    };
    assert_eq!(iface.selection_set.items.len(), 2);
    matches!(iface.selection_set.items[0], Selection::InlineFragment(_));
    matches!(iface.selection_set.items[1], Selection::FragmentSpread(_));
}

#[test]
fn parses_variable_definitions_with_defaults_and_list_non_null_types() {
    let doc = parse_query("query($id: ID!, $tags: [String!] = []) { node(id: $id) }").unwrap();
    let Definition::Operation(op) = &doc.definitions[0] else {
        panic!("expected an operation definition");
    };
    assert_eq!(op.variable_definitions.len(), 2);
    assert_eq!(op.variable_definitions[0].name, "id");
    assert!(op.variable_definitions[0].var_type.is_non_null());
    assert_eq!(op.variable_definitions[1].default_value, Some(GqlValue::List(vec![])));
}

#[test]
fn parses_scalar_value_literals() {
    assert_eq!(parse_value("42").unwrap(), GqlValue::Int(42));
    assert_eq!(parse_value("-3.5").unwrap(), GqlValue::Float(-3.5));
    assert_eq!(parse_value("\"hi\"").unwrap(), GqlValue::String("hi".to_string()));
    assert_eq!(parse_value("true").unwrap(), GqlValue::Boolean(true));
    assert_eq!(parse_value("null").unwrap(), GqlValue::Null);
    assert_eq!(parse_value("RED").unwrap(), GqlValue::Enum("RED".to_string()));
}

#[test]
fn rejects_malformed_query() {
    assert!(parse_query("{ a { }").is_err());
}
