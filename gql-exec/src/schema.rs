use indexmap::{IndexMap, IndexSet};
use std::sync::Arc;

/// A named type's shape, independent of nullability/list wrapping.
/// Mirrors the four kinds the selection and completion algorithms
/// branch on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Scalar,
    Enum,
    Object,
    Interface,
    Union,
    InputObject,
}

/// A type reference as it appears on a field or argument: a named type
/// wrapped in zero or more `List`/`NonNull` layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    pub fn list(of: TypeRef) -> Self {
        TypeRef::List(Box::new(of))
    }

    pub fn non_null(of: TypeRef) -> Self {
        TypeRef::NonNull(Box::new(of))
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, TypeRef::NonNull(_))
    }

    pub fn is_list(&self) -> bool {
        match self {
            TypeRef::NonNull(inner) => inner.is_list(),
            TypeRef::List(_) => true,
            TypeRef::Named(_) => false,
        }
    }

    /// The type one layer in, stripping a `NonNull` or `List` wrapper.
    /// `None` for a bare named type.
    pub fn inner(&self) -> Option<&TypeRef> {
        match self {
            TypeRef::NonNull(inner) | TypeRef::List(inner) => Some(inner),
            TypeRef::Named(_) => None,
        }
    }

    /// The innermost named type, unwrapping any number of `List`/`NonNull`
    /// layers.
    pub fn named_type(&self) -> &str {
        match self {
            TypeRef::Named(name) => name,
            TypeRef::List(inner) | TypeRef::NonNull(inner) => inner.named_type(),
        }
    }
}

impl From<&gql_exec_parser::ast::Type> for TypeRef {
    /// A query's variable declarations are parsed into the AST's own
    /// `Type`; this lifts one into the schema's `TypeRef` domain so
    /// coercion can treat variable types and field/argument types
    /// uniformly.
    fn from(ty: &gql_exec_parser::ast::Type) -> Self {
        match ty {
            gql_exec_parser::ast::Type::Named(name) => TypeRef::Named(name.clone()),
            gql_exec_parser::ast::Type::List(inner) => {
                TypeRef::List(Box::new(TypeRef::from(inner.as_ref())))
            }
            gql_exec_parser::ast::Type::NonNull(inner) => {
                TypeRef::NonNull(Box::new(TypeRef::from(inner.as_ref())))
            }
        }
    }
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeRef::Named(name) => write!(f, "{}", name),
            TypeRef::List(inner) => write!(f, "[{}]", inner),
            TypeRef::NonNull(inner) => write!(f, "{}!", inner),
        }
    }
}

/// One argument's declared shape: its type and, if any, default value.
#[derive(Debug, Clone)]
pub struct ArgumentDef {
    pub name: String,
    pub ty: TypeRef,
    pub default_value: Option<crate::value::Value>,
}

/// A field's declared shape on an object or interface type.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeRef,
    pub arguments: Vec<ArgumentDef>,
    /// Whether this field requires an async RPC hop to resolve, vs.
    /// being resolvable synchronously and inline. A field is
    /// synchronous or asynchronous as declared by the schema.
    pub is_async: bool,
}

impl FieldDef {
    pub fn argument(&self, name: &str) -> Option<&ArgumentDef> {
        self.arguments.iter().find(|a| a.name == name)
    }
}

/// A named type's full definition: its kind, its fields (for
/// object/interface types), and, for interfaces/unions, the concrete
/// object types that implement/inhabit it, for type-condition
/// matching.
#[derive(Debug, Clone)]
pub struct TypeDef {
    pub name: String,
    pub kind: TypeKind,
    pub fields: IndexMap<String, FieldDef>,
    /// Interfaces this object type implements, or member types of a
    /// union.
    pub possible_types: IndexSet<String>,
    /// Interfaces a member of this union or this object type implements,
    /// used the other direction when matching an interface type
    /// condition against a concrete object type.
    pub interfaces: IndexSet<String>,
}

impl TypeDef {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    /// Whether `self` satisfies the type condition `condition`:
    /// identity, or `condition` is an interface/union this type
    /// implements/belongs to.
    pub fn satisfies(&self, condition: &str) -> bool {
        self.name == condition
            || self.possible_types.contains(condition)
            || self.interfaces.contains(condition)
    }
}

/// Read-only access to a schema's type system, the shape the
/// selection-assembly and completion algorithms query against. Kept
/// as a trait so tests can supply a minimal fixture schema without
/// building the full registry-backed one.
pub trait SchemaView: Send + Sync {
    fn type_def(&self, name: &str) -> Option<&TypeDef>;
    fn query_type(&self) -> &str;
    fn mutation_type(&self) -> Option<&str>;
    fn subscription_type(&self) -> Option<&str>;
}

/// An in-memory schema built directly from [`TypeDef`]s, with no
/// dependency on a descriptor registry or wire format. Used by the
/// executor's own test suite and by callers who just want to drive the
/// executor against a small fixed type system.
#[derive(Debug, Default)]
pub struct Schema {
    types: IndexMap<String, TypeDef>,
    query_type: String,
    mutation_type: Option<String>,
    subscription_type: Option<String>,
}

impl Schema {
    pub fn builder(query_type: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            schema: Schema {
                types: IndexMap::new(),
                query_type: query_type.into(),
                mutation_type: None,
                subscription_type: None,
            },
        }
    }
}

impl SchemaView for Schema {
    fn type_def(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    fn query_type(&self) -> &str {
        &self.query_type
    }

    fn mutation_type(&self) -> Option<&str> {
        self.mutation_type.as_deref()
    }

    fn subscription_type(&self) -> Option<&str> {
        self.subscription_type.as_deref()
    }
}

pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn mutation_type(mut self, name: impl Into<String>) -> Self {
        self.schema.mutation_type = Some(name.into());
        self
    }

    pub fn subscription_type(mut self, name: impl Into<String>) -> Self {
        self.schema.subscription_type = Some(name.into());
        self
    }

    pub fn type_def(mut self, type_def: TypeDef) -> Self {
        self.schema.types.insert(type_def.name.clone(), type_def);
        self
    }

    pub fn build(self) -> Arc<Schema> {
        Arc::new(self.schema)
    }
}
