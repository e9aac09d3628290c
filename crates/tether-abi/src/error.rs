//! Error taxonomy for generation and call time

use crate::kind::{CallSpace, PrimitiveKind};

/// Result type for generation-time operations
pub type GenResult<T> = Result<T, GenError>;

/// Result type for call-time operations
pub type CallResult<T> = Result<T, CallError>;

/// Generation-time errors. All are fatal to the build: no partial
/// proxy/table pair is ever emitted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenError {
    /// Two overload variants share one parameter signature (the host
    /// cannot select by return type)
    #[error("ambiguous overload '{base}' in {owner}: duplicate signature ({signature})")]
    AmbiguousOverload {
        /// Owning type, empty for free functions
        owner: String,
        /// Overload-group base name
        base: String,
        /// The colliding flattened parameter signature
        signature: String,
    },

    /// Two entries collide on one index within one call space
    #[error("duplicate index {index} in {space}: '{first}' and '{second}'")]
    DuplicateIndex {
        /// The call space of the collision
        space: CallSpace,
        /// The colliding index
        index: u32,
        /// Qualified name of the first entry
        first: String,
        /// Qualified name of the second entry
        second: String,
    },

    /// An entry references a native symbol absent at build time
    #[error("entry '{entry}' targets unknown native symbol '{target}'")]
    UnknownEntryPointTarget {
        /// Qualified name of the offending entry
        entry: String,
        /// The missing symbol
        target: String,
    },

    /// Variadic or default-valued parameter: every exported variant
    /// must have fixed arity
    #[error("unsupported signature for '{name}': {reason}")]
    UnsupportedSignature {
        /// Qualified declaration name
        name: String,
        /// What made the signature unexportable
        reason: String,
    },

    /// Regeneration moved an entry consumed by already-compiled
    /// callers without a declared version boundary
    #[error("entry '{entry}' renumbered in {space}: {old} -> {new} without a version boundary")]
    IndexRenumbered {
        /// The call space of the drifting entry
        space: CallSpace,
        /// Qualified name of the entry
        entry: String,
        /// Index in the baseline table
        old: u32,
        /// Index the rebuild would assign
        new: u32,
    },
}

/// Call-time errors.
///
/// All variants except `Native` are host-local and detected before
/// any native invocation; `Native` carries a failure reported by the
/// wrapped library.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    /// A call was made through a handle already released
    #[error("use after release: {type_name} handle was already released")]
    UseAfterRelease {
        /// Host-visible owning type name
        type_name: String,
    },

    /// A released handle was released a second time
    #[error("already released: {type_name} handle was disposed twice")]
    AlreadyReleased {
        /// Host-visible owning type name
        type_name: String,
    },

    /// An argument did not match the entry's parameter signature
    #[error("argument type mismatch at position {position}: expected {expected}, got {got}")]
    ArgumentTypeMismatch {
        /// Zero-based argument position (the arity for count errors)
        position: usize,
        /// What the signature requires at that position
        expected: String,
        /// What was actually passed
        got: String,
    },

    /// Generated proxy and dispatch table come from different builds
    #[error("stale binding: {detail}")]
    StaleBinding {
        /// What disagreed (missing index or stamp mismatch)
        detail: String,
    },

    /// Failure reported by the native side
    #[error("native error: {0}")]
    Native(String),
}

impl CallError {
    /// Whether this error was produced without touching the native side.
    pub fn is_host_local(&self) -> bool {
        !matches!(self, CallError::Native(_))
    }
}
