use crate::ast::{
    Definition, Directive, Document, Field, FragmentDefinition, FragmentSpread, InlineFragment,
    OperationDefinition, OperationType, Selection, SelectionSet, Type, TypeCondition,
    VariableDefinition,
};
use crate::pos::{Pos, Positioned};
use crate::value::GqlValue;
use indexmap::IndexMap;
use pest::iterators::Pair;
use pest::Parser;
use std::char;

#[derive(pest_derive::Parser)]
#[grammar = "graphql.pest"]
struct GraphQLParser;

/// Errors raised while parsing a query document or a standalone value.
///
/// The parser is an external collaborator (spec §6); the core never
/// constructs this error itself, it only consumes the `Document` a
/// successful parse produces.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("syntax error: {0}")]
    Syntax(#[from] Box<pest::error::Error<Rule>>),
    #[error("{message} at {pos}")]
    Semantic { message: String, pos: Pos },
}

pub type Result<T> = std::result::Result<T, Error>;

fn pos_of(pair: &Pair<'_, Rule>) -> Pos {
    let (line, column) = pair.as_span().start_pos().line_col();
    Pos { line, column }
}

fn semantic_error(pair: &Pair<'_, Rule>, message: impl Into<String>) -> Error {
    Error::Semantic {
        message: message.into(),
        pos: pos_of(pair),
    }
}

/// Parses a full query document: one or more operation/fragment
/// definitions.
pub fn parse_query(input: &str) -> Result<Document> {
    let mut pairs =
        GraphQLParser::parse(Rule::document, input).map_err(|e| Error::Syntax(Box::new(e)))?;
    let document_pair = pairs.next().expect("document rule always produces a pair");

    let mut definitions = Vec::new();
    for pair in document_pair.into_inner() {
        match pair.as_rule() {
            Rule::definition => definitions.push(parse_definition(pair)?),
            Rule::EOI => {}
            _ => unreachable!("unexpected rule under document: {:?}", pair.as_rule()),
        }
    }

    Ok(Document { definitions })
}

/// Parses a single standalone value, e.g. a default value supplied out
/// of band from a query document (used by tests and by callers wiring
/// up variable defaults from a non-document source).
pub fn parse_value(input: &str) -> Result<GqlValue> {
    let mut pairs =
        GraphQLParser::parse(Rule::value, input).map_err(|e| Error::Syntax(Box::new(e)))?;
    let pair = pairs.next().expect("value rule always produces a pair");
    build_value(pair)
}

fn parse_definition(pair: Pair<'_, Rule>) -> Result<Definition> {
    let inner = pair.into_inner().next().expect("definition has one child");
    match inner.as_rule() {
        Rule::operation_definition => Ok(Definition::Operation(parse_operation(inner)?)),
        Rule::fragment_definition => Ok(Definition::Fragment(parse_fragment_definition(inner)?)),
        other => unreachable!("unexpected rule under definition: {:?}", other),
    }
}

fn parse_operation(pair: Pair<'_, Rule>) -> Result<Positioned<OperationDefinition>> {
    let pos = pos_of(&pair);
    let mut operation_type = OperationType::Query;
    let mut name = None;
    let mut variable_definitions = Vec::new();
    let mut directives = Vec::new();
    let mut selection_set = None;

    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::operation_type => {
                operation_type = match part.as_str() {
                    "query" => OperationType::Query,
                    "mutation" => OperationType::Mutation,
                    "subscription" => OperationType::Subscription,
                    other => unreachable!("unexpected operation type: {}", other),
                };
            }
            Rule::name => name = Some(part.as_str().to_string()),
            Rule::variable_definitions => {
                for var_def in part.into_inner() {
                    variable_definitions.push(parse_variable_definition(var_def)?);
                }
            }
            Rule::directives => directives = parse_directives(part)?,
            Rule::selection_set => selection_set = Some(parse_selection_set(part)?),
            other => unreachable!("unexpected rule under operation_definition: {:?}", other),
        }
    }

    let selection_set =
        selection_set.ok_or_else(|| Error::Semantic {
            message: "operation has no selection set".to_string(),
            pos,
        })?;

    Ok(Positioned::new(
        OperationDefinition {
            name,
            operation_type,
            variable_definitions,
            directives,
            selection_set,
        },
        pos,
    ))
}

fn parse_variable_definition(pair: Pair<'_, Rule>) -> Result<Positioned<VariableDefinition>> {
    let pos = pos_of(&pair);
    let mut inner = pair.into_inner();

    let variable = inner.next().expect("variable_definition has a variable");
    let name = variable.as_str().trim_start_matches('$').to_string();

    let type_pair = inner.next().expect("variable_definition has a type");
    let var_type = parse_type(type_pair)?;

    let mut default_value = None;
    if let Some(default_pair) = inner.next() {
        let value_pair = default_pair
            .into_inner()
            .next()
            .expect("default_value wraps a value");
        default_value = Some(build_value(value_pair)?);
    }

    Ok(Positioned::new(
        VariableDefinition {
            name,
            var_type,
            default_value,
        },
        pos,
    ))
}

fn parse_type(pair: Pair<'_, Rule>) -> Result<Type> {
    match pair.as_rule() {
        Rule::type_ => parse_type(pair.into_inner().next().expect("type_ has one child")),
        Rule::named_type => Ok(Type::Named(pair.as_str().to_string())),
        Rule::list_type => {
            let inner = pair.into_inner().next().expect("list_type wraps a type_");
            Ok(Type::List(Box::new(parse_type(inner)?)))
        }
        Rule::non_null_type => {
            let inner = pair
                .into_inner()
                .next()
                .expect("non_null_type wraps a named_type or list_type");
            Ok(Type::NonNull(Box::new(parse_type(inner)?)))
        }
        other => unreachable!("unexpected rule while parsing a type: {:?}", other),
    }
}

fn parse_directives(pair: Pair<'_, Rule>) -> Result<Vec<Positioned<Directive>>> {
    pair.into_inner().map(parse_directive).collect()
}

fn parse_directive(pair: Pair<'_, Rule>) -> Result<Positioned<Directive>> {
    let pos = pos_of(&pair);
    let mut inner = pair.into_inner();
    let name = inner.next().expect("directive has a name").as_str().to_string();
    let arguments = match inner.next() {
        Some(args_pair) => parse_arguments(args_pair)?,
        None => Vec::new(),
    };
    Ok(Positioned::new(Directive { name, arguments }, pos))
}

fn parse_arguments(pair: Pair<'_, Rule>) -> Result<Vec<(String, Positioned<GqlValue>)>> {
    pair.into_inner().map(parse_argument).collect()
}

fn parse_argument(pair: Pair<'_, Rule>) -> Result<(String, Positioned<GqlValue>)> {
    let mut inner = pair.into_inner();
    let name = inner.next().expect("argument has a name").as_str().to_string();
    let value_pair = inner.next().expect("argument has a value");
    let pos = pos_of(&value_pair);
    let value = build_value(value_pair)?;
    Ok((name, Positioned::new(value, pos)))
}

fn parse_selection_set(pair: Pair<'_, Rule>) -> Result<Positioned<SelectionSet>> {
    let pos = pos_of(&pair);
    let mut items = Vec::new();
    for selection_pair in pair.into_inner() {
        items.push(parse_selection(selection_pair)?);
    }
    Ok(Positioned::new(SelectionSet { items }, pos))
}

fn parse_selection(pair: Pair<'_, Rule>) -> Result<Selection> {
    let inner = pair.into_inner().next().expect("selection has one child");
    match inner.as_rule() {
        Rule::field => Ok(Selection::Field(parse_field(inner)?)),
        Rule::fragment_spread => Ok(Selection::FragmentSpread(parse_fragment_spread(inner)?)),
        Rule::inline_fragment => Ok(Selection::InlineFragment(parse_inline_fragment(inner)?)),
        other => unreachable!("unexpected rule under selection: {:?}", other),
    }
}

fn parse_field(pair: Pair<'_, Rule>) -> Result<Positioned<Field>> {
    let pos = pos_of(&pair);
    let mut alias = None;
    let mut name = None;
    let mut arguments = Vec::new();
    let mut directives = Vec::new();
    let mut selection_set = None;

    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::alias => {
                let alias_name = part
                    .into_inner()
                    .next()
                    .expect("alias wraps a name")
                    .as_str()
                    .to_string();
                alias = Some(alias_name);
            }
            Rule::name => name = Some(part.as_str().to_string()),
            Rule::arguments => arguments = parse_arguments(part)?,
            Rule::directives => directives = parse_directives(part)?,
            Rule::selection_set => selection_set = Some(parse_selection_set(part)?),
            other => unreachable!("unexpected rule under field: {:?}", other),
        }
    }

    // The grammar emits a bare `name` for the field itself right after
    // an optional alias; both productions use the `name` rule, so the
    // first one encountered above is actually the alias's own name
    // when an alias is present (`alias = { name ~ ":" }` consumes it
    // as a separate `alias` pair), leaving the second `name` as the
    // field name. Since `alias` is parsed as its own sub-rule, `name`
    // here unambiguously refers to the field's name.
    let name = name.ok_or_else(|| Error::Semantic {
        message: "field is missing a name".to_string(),
        pos,
    })?;

    Ok(Positioned::new(
        Field {
            alias,
            name,
            arguments,
            directives,
            selection_set: selection_set.unwrap_or_else(|| Positioned::new(SelectionSet::default(), pos)),
        },
        pos,
    ))
}

fn parse_fragment_spread(pair: Pair<'_, Rule>) -> Result<Positioned<FragmentSpread>> {
    let pos = pos_of(&pair);
    let mut inner = pair.into_inner();
    let fragment_name = inner
        .next()
        .expect("fragment_spread has a fragment_name")
        .as_str()
        .to_string();
    let directives = match inner.next() {
        Some(directives_pair) => parse_directives(directives_pair)?,
        None => Vec::new(),
    };
    Ok(Positioned::new(
        FragmentSpread {
            fragment_name,
            directives,
        },
        pos,
    ))
}

fn parse_inline_fragment(pair: Pair<'_, Rule>) -> Result<Positioned<InlineFragment>> {
    let pos = pos_of(&pair);
    let mut type_condition = None;
    let mut directives = Vec::new();
    let mut selection_set = None;

    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::type_condition => type_condition = Some(parse_type_condition(part)?),
            Rule::directives => directives = parse_directives(part)?,
            Rule::selection_set => selection_set = Some(parse_selection_set(part)?),
            other => unreachable!("unexpected rule under inline_fragment: {:?}", other),
        }
    }

    let selection_set = selection_set.ok_or_else(|| Error::Semantic {
        message: "inline fragment has no selection set".to_string(),
        pos,
    })?;

    Ok(Positioned::new(
        InlineFragment {
            type_condition,
            directives,
            selection_set,
        },
        pos,
    ))
}

fn parse_fragment_definition(pair: Pair<'_, Rule>) -> Result<Positioned<FragmentDefinition>> {
    let pos = pos_of(&pair);
    let mut inner = pair.into_inner();

    let name = inner
        .next()
        .expect("fragment_definition has a fragment_name")
        .as_str()
        .to_string();
    let type_condition_pair = inner
        .next()
        .expect("fragment_definition has a type_condition");
    let type_condition = parse_type_condition(type_condition_pair)?;

    let mut directives = Vec::new();
    let mut selection_set = None;
    for part in inner {
        match part.as_rule() {
            Rule::directives => directives = parse_directives(part)?,
            Rule::selection_set => selection_set = Some(parse_selection_set(part)?),
            other => unreachable!("unexpected rule under fragment_definition: {:?}", other),
        }
    }

    let selection_set = selection_set.ok_or_else(|| Error::Semantic {
        message: "fragment has no selection set".to_string(),
        pos,
    })?;

    Ok(Positioned::new(
        FragmentDefinition {
            name,
            type_condition,
            directives,
            selection_set,
        },
        pos,
    ))
}

fn parse_type_condition(pair: Pair<'_, Rule>) -> Result<TypeCondition> {
    let named_type = pair
        .into_inner()
        .next()
        .expect("type_condition wraps a named_type");
    Ok(TypeCondition::On(named_type.as_str().to_string()))
}

fn build_value(pair: Pair<'_, Rule>) -> Result<GqlValue> {
    match pair.as_rule() {
        Rule::value => build_value(pair.into_inner().next().expect("value has one child")),
        Rule::variable => Ok(GqlValue::Variable(
            pair.as_str().trim_start_matches('$').to_string(),
        )),
        Rule::int_value => {
            let n: i64 = pair
                .as_str()
                .parse()
                .map_err(|_| semantic_error(&pair, "integer literal out of range"))?;
            Ok(GqlValue::Int(n))
        }
        Rule::float_value => {
            let n: f64 = pair
                .as_str()
                .parse()
                .map_err(|_| semantic_error(&pair, "invalid float literal"))?;
            Ok(GqlValue::Float(n))
        }
        Rule::boolean_value => Ok(GqlValue::Boolean(pair.as_str() == "true")),
        Rule::null_value => Ok(GqlValue::Null),
        Rule::enum_value => Ok(GqlValue::Enum(pair.as_str().to_string())),
        Rule::string_value => Ok(GqlValue::String(unescape_string(pair)?)),
        Rule::list_value => {
            let values = pair
                .into_inner()
                .map(build_value)
                .collect::<Result<Vec<_>>>()?;
            Ok(GqlValue::List(values))
        }
        Rule::object_value => {
            let mut fields = IndexMap::new();
            for field_pair in pair.into_inner() {
                let mut inner = field_pair.into_inner();
                let name = inner.next().expect("object_field has a name").as_str().to_string();
                let value_pair = inner.next().expect("object_field has a value");
                fields.insert(name, build_value(value_pair)?);
            }
            Ok(GqlValue::Object(fields))
        }
        other => unreachable!("unexpected rule while parsing a value: {:?}", other),
    }
}

fn unescape_string(pair: Pair<'_, Rule>) -> Result<String> {
    let raw = pair.as_str();
    if let Some(body) = raw.strip_prefix("\"\"\"").and_then(|s| s.strip_suffix("\"\"\"")) {
        return Ok(body.to_string());
    }
    let body = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('u') => {
                let hex: String = (0..4).filter_map(|_| chars.next()).collect();
                let code = u32::from_str_radix(&hex, 16)
                    .map_err(|_| semantic_error(&pair, "invalid unicode escape"))?;
                out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
            }
            _ => return Err(semantic_error(&pair, "invalid escape sequence")),
        }
    }
    Ok(out)
}
