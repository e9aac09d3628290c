//! Native entry point descriptors

use serde::{Deserialize, Serialize};

use crate::kind::{CallSpace, PrimitiveKind, ReturnKind};

/// Dispatch key: a call space plus the index within that space.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryKey {
    /// Which of the four index spaces
    pub space: CallSpace,
    /// Zero-based index within the space
    pub index: u32,
}

impl EntryKey {
    /// Create a key from space and index.
    pub fn new(space: CallSpace, index: u32) -> Self {
        EntryKey { space, index }
    }
}

impl std::fmt::Display for EntryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.space, self.index)
    }
}

/// One concrete, non-generic native function reachable by an index.
///
/// Produced by the monomorphizer and numbered by the dispatch table
/// builder. `flat_name` is the flattened exported name (overload base
/// plus kind suffixes); `target` is the native symbol the entry is
/// bound to and must exist in the native symbol set at build time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeEntryPoint {
    /// Index within `space`, unique there
    pub index: u32,
    /// The call space this entry lives in
    pub space: CallSpace,
    /// Owning native type, empty for free functions
    pub owner: String,
    /// Flattened exported name
    pub flat_name: String,
    /// Parameter kinds in declaration order (fixed arity)
    pub params: Vec<PrimitiveKind>,
    /// Return shape
    pub ret: ReturnKind,
    /// Native symbol this entry dispatches to
    pub target: String,
}

impl NativeEntryPoint {
    /// Dispatch key for this entry.
    pub fn key(&self) -> EntryKey {
        EntryKey::new(self.space, self.index)
    }

    /// Fully qualified display name (`Owner::flat_name` or bare).
    pub fn qualified_name(&self) -> String {
        if self.owner.is_empty() {
            self.flat_name.clone()
        } else {
            format!("{}::{}", self.owner, self.flat_name)
        }
    }

    /// Canonical one-line encoding fed into the build stamp.
    ///
    /// Every field that generated callers depend on participates, so
    /// any change to the pass produces a different stamp.
    pub fn stamp_line(&self) -> String {
        let params: Vec<&str> = self.params.iter().map(|k| k.suffix()).collect();
        let ret = match self.ret {
            ReturnKind::Void => "void".to_string(),
            ReturnKind::Value(kind) => kind.suffix().to_string(),
        };
        format!(
            "{}:{}:{}:{}:({})->{}:{}",
            self.space,
            self.index,
            self.owner,
            self.flat_name,
            params.join(","),
            ret,
            self.target
        )
    }
}
