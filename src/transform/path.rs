//! Table naming along a document path.
//!
//! Objects flatten into their parent's table and arrays start a new one. A
//! table is named by every segment up to its last array, joined by `__`:
//!
//! ```text
//! users__t                     {"id": .., "name": ..}
//! users__t__loans              {"loans": [..]}
//! users__t__personal__addresses {"personal": {"addresses": [..]}}
//! ```

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Object,
    Array,
}

/// The chain of decoded field names from the root table to a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePath {
    segments: Vec<(Kind, String)>,
}

impl TablePath {
    /// A path at the root table, e.g. `users__t`.
    pub fn root(table: impl Into<String>) -> Self {
        Self {
            segments: vec![(Kind::Array, table.into())],
        }
    }

    /// Descend into a nested object field.
    pub fn object(&self, name: impl Into<String>) -> Self {
        self.push(Kind::Object, name.into())
    }

    /// Descend into an array field.
    pub fn array(&self, name: impl Into<String>) -> Self {
        self.push(Kind::Array, name.into())
    }

    fn push(&self, kind: Kind, name: String) -> Self {
        let mut segments = self.segments.clone();
        segments.push((kind, name));
        Self { segments }
    }

    /// The table that values at this path are stored in.
    pub fn table_name(&self) -> String {
        let end = self
            .segments
            .iter()
            .rposition(|(kind, _)| *kind == Kind::Array)
            .map_or(0, |i| i + 1);
        self.segments[..end]
            .iter()
            .map(|(_, name)| name.as_str())
            .collect::<Vec<_>>()
            .join("__")
    }
}
