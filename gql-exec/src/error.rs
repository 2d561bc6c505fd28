use crate::path::ResponsePath;
use serde::Serialize;

/// Pre-execution failures: the document or variables could not even be
/// turned into a running request. `data` is null and exactly one
/// error, with no `path`, is returned.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("operation not found")]
    OperationNotFound,
    #[error("root type not found for {operation} operation")]
    RootTypeNotFound { operation: &'static str },
    #[error("variable ${name} of required type {ty} was not provided")]
    VariableNotProvided { name: String, ty: String },
    #[error("variable ${name} of type {ty} cannot be null")]
    VariableNull { name: String, ty: String },
    #[error("{0}")]
    Coercion(String),
}

/// A located runtime error: one entry per failure site. Non-Null
/// violations and any error surfaced by the
/// runtime's sync/batch/serialize/resolve-type entries become one of
/// these.
#[derive(Debug, Clone, Serialize)]
pub struct LocatedError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<ResponsePath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}

impl LocatedError {
    pub fn new(message: impl Into<String>, path: ResponsePath) -> Self {
        LocatedError {
            message: message.into(),
            path: Some(path),
            extensions: None,
        }
    }

    pub fn without_path(message: impl Into<String>) -> Self {
        LocatedError {
            message: message.into(),
            path: None,
            extensions: None,
        }
    }

    pub fn with_extensions(mut self, extensions: serde_json::Value) -> Self {
        self.extensions = Some(extensions);
        self
    }
}

impl From<RequestError> for LocatedError {
    fn from(err: RequestError) -> Self {
        LocatedError::without_path(err.to_string())
    }
}

/// Transport-level failure: propagates to every task that was included
/// in the same wire call.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request was cancelled")]
    Cancelled,
    #[error("transport error: {0}")]
    Failed(String),
}

/// Raised by a programmer/configuration error: a descriptor missing
/// from the registry, a source value that isn't
/// the typed message it was promised to be, an unknown `typename` in
/// an interface envelope. These are bugs in how the executor was wired
/// up, not runtime conditions a caller can recover from, so the
/// bridge panics through this helper rather than returning a `Result`
/// a caller might be tempted to swallow.
pub fn configuration_error(message: impl Into<String>) -> ! {
    panic!("gql-exec configuration error: {}", message.into());
}
