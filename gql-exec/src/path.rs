use std::fmt;

/// One step in a response path: a field's response name, or an index
/// into a list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Name(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Name(name) => write!(f, "{}", name),
            PathSegment::Index(idx) => write!(f, "{}", idx),
        }
    }
}

/// An ordered sequence of path elements from the root of the response
/// to one field or list element. The top-level element is always a
/// name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ResponsePath(Vec<PathSegment>);

impl ResponsePath {
    pub fn root() -> Self {
        ResponsePath(Vec::new())
    }

    pub fn with_name(&self, name: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Name(name.into()));
        ResponsePath(segments)
    }

    pub fn with_index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        ResponsePath(segments)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    /// The path one level up, dropping the last segment. `None` at the
    /// root — a violation that reaches the top of data nulls the whole
    /// payload instead of a response-tree slot.
    pub fn parent(&self) -> Option<ResponsePath> {
        if self.0.is_empty() {
            None
        } else {
            Some(ResponsePath(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// True if `self` is `other`, or nested under it.
    pub fn starts_with(&self, other: &ResponsePath) -> bool {
        self.0.len() >= other.0.len() && self.0[..other.0.len()] == other.0[..]
    }

    /// The tombstone ancestor for a Non-Null violation detected at
    /// `self`: walk the path backwards to the first response-name
    /// element, skipping over list indices; that element's path is the
    /// tombstone. `self` is the violating field's own path, which always
    /// ends in a `Name`
    /// segment, so the walk starts at the parent and skips back over
    /// any `Index` segments — a non-null list element failing nulls
    /// the whole list, not just one slot. `None` means the violation
    /// reaches the top of data. Callers apply this once per violation;
    /// the ancestor it returns is where propagation stops.
    pub fn nearest_nullable_ancestor(&self) -> Option<ResponsePath> {
        let mut segments = self.0.clone();
        segments.pop();
        while matches!(segments.last(), Some(PathSegment::Index(_))) {
            segments.pop();
        }
        if segments.is_empty() {
            None
        } else {
            Some(ResponsePath(segments))
        }
    }

    /// A stable, string-encoded form of the path, used as the
    /// tombstone set's key: a set of response-path prefixes,
    /// string-encoded.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for segment in &self.0 {
            out.push('/');
            match segment {
                PathSegment::Name(name) => out.push_str(name),
                PathSegment::Index(idx) => {
                    out.push('#');
                    out.push_str(&idx.to_string());
                }
            }
        }
        out
    }
}

impl fmt::Display for ResponsePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl serde::Serialize for ResponsePath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for segment in &self.0 {
            match segment {
                PathSegment::Name(name) => seq.serialize_element(name)?,
                PathSegment::Index(idx) => seq.serialize_element(idx)?,
            }
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_and_checks_prefixes() {
        let root = ResponsePath::root();
        let obj = root.with_name("obj");
        let obj_list = obj.with_name("items").with_index(2).with_name("a");

        assert!(obj_list.starts_with(&obj));
        assert!(!obj.starts_with(&obj_list));
        assert_eq!(obj.parent(), Some(root.clone()));
        assert_eq!(root.parent(), None);
        assert_eq!(obj_list.encode(), "/obj/items#2/a");
    }

    #[test]
    fn nearest_nullable_ancestor_skips_list_indices() {
        let p = ResponsePath::root()
            .with_name("items")
            .with_index(2)
            .with_name("a");
        assert_eq!(
            p.nearest_nullable_ancestor(),
            Some(ResponsePath::root().with_name("items"))
        );

        let top_level = ResponsePath::root().with_name("obj");
        assert_eq!(top_level.nearest_nullable_ancestor(), None);
    }
}
