use indexmap::IndexMap;
use std::fmt;

/// An AST-level GraphQL value, as it appears in a query document: a
/// literal, a variable reference, or a composite of either.
///
/// This is distinct from `gql_exec::Value`, the dynamic value domain
/// the executor and the RPC bridge pass around at request time. Value
/// Coercion (spec §4.1) is the bridge between the two: it resolves
/// `Variable` references against the coerced variable map and produces
/// a `gql_exec::Value` from the rest.
#[derive(Debug, Clone, PartialEq)]
pub enum GqlValue {
    Variable(String),
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
    Enum(String),
    List(Vec<GqlValue>),
    Object(IndexMap<String, GqlValue>),
}

impl GqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, GqlValue::Null)
    }

    pub fn as_variable(&self) -> Option<&str> {
        match self {
            GqlValue::Variable(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for GqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GqlValue::Variable(name) => write!(f, "${}", name),
            GqlValue::Int(n) => write!(f, "{}", n),
            GqlValue::Float(n) => write!(f, "{}", n),
            GqlValue::String(s) => write!(f, "{:?}", s),
            GqlValue::Boolean(b) => write!(f, "{}", b),
            GqlValue::Null => write!(f, "null"),
            GqlValue::Enum(name) => write!(f, "{}", name),
            GqlValue::List(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            GqlValue::Object(fields) => {
                write!(f, "{{")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}
