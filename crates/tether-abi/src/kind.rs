//! Primitive wire kinds and call-index spaces

use serde::{Deserialize, Serialize};

/// The closed set of primitive kinds a value can have on the wire.
///
/// Structured native values passed by value are encoded as `Bin`
/// buffers by the marshaling layer; struct/enum parameters passed by
/// reference degrade to `Obj`, an opaque handle. The internal shape
/// of either never participates in signature naming.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    /// Boolean
    Bool,
    /// Unsigned integer (up to 64 bits)
    Uint,
    /// Signed integer (up to 64 bits)
    Int,
    /// Floating point (f64)
    Float,
    /// Text string
    Str,
    /// Binary buffer
    Bin,
    /// Opaque handle to a native resource
    Obj,
}

impl PrimitiveKind {
    /// Stable lower-case suffix used when flattening overloaded names.
    ///
    /// A flattened variant is named `<base>_<suffix>_<suffix>...` over
    /// its parameter kinds in declaration order, so these strings are
    /// part of the generated ABI and must never change.
    pub fn suffix(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Uint => "uint",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Str => "str",
            PrimitiveKind::Bin => "bin",
            PrimitiveKind::Obj => "obj",
        }
    }

    /// All kinds, in canonical order.
    pub fn all() -> &'static [PrimitiveKind] {
        &[
            PrimitiveKind::Bool,
            PrimitiveKind::Uint,
            PrimitiveKind::Int,
            PrimitiveKind::Float,
            PrimitiveKind::Str,
            PrimitiveKind::Bin,
            PrimitiveKind::Obj,
        ]
    }
}

impl std::fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Return shape of an entry point.
///
/// The host cannot select an overload by return type, so `ReturnKind`
/// never participates in flattened naming.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReturnKind {
    /// No value (the host sees `undefined`)
    Void,
    /// A value of the given primitive kind
    Value(PrimitiveKind),
}

/// One of the four independent call-index namespaces.
///
/// Indices are zero-based and assigned per space in first-seen
/// declaration order; the same index legitimately means different
/// things in different spaces.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallSpace {
    /// Static (free or associated) synchronous calls
    StaticSync,
    /// Static asynchronous calls
    StaticAsync,
    /// Instance synchronous calls (receiver handle required)
    InstanceSync,
    /// Instance asynchronous calls (receiver handle required)
    InstanceAsync,
}

impl CallSpace {
    /// Whether entries in this space take a receiver handle.
    pub fn is_instance(self) -> bool {
        matches!(self, CallSpace::InstanceSync | CallSpace::InstanceAsync)
    }

    /// Whether entries in this space settle asynchronously.
    pub fn is_async(self) -> bool {
        matches!(self, CallSpace::StaticAsync | CallSpace::InstanceAsync)
    }

    /// All four spaces, in canonical order.
    pub fn all() -> &'static [CallSpace] {
        &[
            CallSpace::StaticSync,
            CallSpace::StaticAsync,
            CallSpace::InstanceSync,
            CallSpace::InstanceAsync,
        ]
    }

    /// Stable name used in stamps and artifact serialization.
    pub fn as_str(self) -> &'static str {
        match self {
            CallSpace::StaticSync => "static_sync",
            CallSpace::StaticAsync => "static_async",
            CallSpace::InstanceSync => "instance_sync",
            CallSpace::InstanceAsync => "instance_async",
        }
    }
}

impl std::fmt::Display for CallSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
