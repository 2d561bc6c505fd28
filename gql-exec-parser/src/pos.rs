use std::fmt;
use std::ops::{Deref, DerefMut};

/// A 1-indexed line/column position in the source query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Wraps an AST node with the source position it was parsed from.
///
/// Positions are carried through the AST but are not part of the
/// execution core's semantics; they exist so located errors raised
/// while walking the document can, in principle, point back at source
/// text. `Deref`/`DerefMut` let callers treat a `Positioned<T>` as a
/// `T` almost everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Positioned<T> {
    pos: Pos,
    node: T,
}

impl<T> Positioned<T> {
    pub fn new(node: T, pos: Pos) -> Self {
        Self { pos, node }
    }

    pub fn position(&self) -> Pos {
        self.pos
    }

    pub fn node(&self) -> &T {
        &self.node
    }

    pub fn into_inner(self) -> T {
        self.node
    }
}

impl<T> Deref for Positioned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.node
    }
}

impl<T> DerefMut for Positioned<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.node
    }
}
