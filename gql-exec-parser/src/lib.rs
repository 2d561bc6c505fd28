//! Query document AST and parser for the RPC-backed GraphQL execution
//! core.
//!
//! This crate is the "Parser" external collaborator of the execution
//! core (see the core crate's design notes): it turns query text into
//! a [`Document`](ast::Document) the executor walks. The SDL/schema
//! parser and the schema intermediate representation are out of
//! scope here; this crate only understands the query language.

pub mod ast;
mod pos;
mod query_parser;
mod value;

pub use pos::{Pos, Positioned};
pub use query_parser::{parse_query, parse_value, Error, Result};
pub use value::GqlValue;
