//! Wire values and opaque native references

use serde::{Deserialize, Serialize};

use crate::kind::PrimitiveKind;

/// Opaque token identifying one native-owned resource.
///
/// Minted by the native side; the bridge never interprets the value,
/// it only compares tokens. Reclamation bookkeeping is keyed by
/// `NativeRef`, never by the host wrapper, since the wrapper may
/// already have been collected when a finalizer fires.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NativeRef(u64);

impl NativeRef {
    /// Wrap a raw token value.
    pub fn from_raw(raw: u64) -> Self {
        NativeRef(raw)
    }

    /// Get the raw token value.
    pub fn as_raw(self) -> u64 {
        self.0
    }
}

/// Tagged value crossing the call boundary.
///
/// One variant per [`PrimitiveKind`], plus `Undefined` for "no value"
/// (void returns and the unset sentinel returned by `set_*`-family
/// calls on first invocation). A well-formed call result carries
/// exactly one of a `WireValue` or an error, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireValue {
    /// No value
    Undefined,
    /// Boolean
    Bool(bool),
    /// Unsigned integer
    Uint(u64),
    /// Signed integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// Text string
    Str(String),
    /// Binary buffer
    Bin(Vec<u8>),
    /// Opaque handle to a native resource
    Handle(NativeRef),
}

impl WireValue {
    /// The primitive kind of this value, or `None` for `Undefined`.
    pub fn kind(&self) -> Option<PrimitiveKind> {
        match self {
            WireValue::Undefined => None,
            WireValue::Bool(_) => Some(PrimitiveKind::Bool),
            WireValue::Uint(_) => Some(PrimitiveKind::Uint),
            WireValue::Int(_) => Some(PrimitiveKind::Int),
            WireValue::Float(_) => Some(PrimitiveKind::Float),
            WireValue::Str(_) => Some(PrimitiveKind::Str),
            WireValue::Bin(_) => Some(PrimitiveKind::Bin),
            WireValue::Handle(_) => Some(PrimitiveKind::Obj),
        }
    }

    /// Human-readable type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self.kind() {
            None => "undefined",
            Some(kind) => kind.suffix(),
        }
    }

    /// Check if this is the unset sentinel.
    pub fn is_undefined(&self) -> bool {
        matches!(self, WireValue::Undefined)
    }

    /// Get as boolean if this is a bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            WireValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as unsigned integer if this is a uint
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            WireValue::Uint(u) => Some(*u),
            _ => None,
        }
    }

    /// Get as signed integer if this is an int
    pub fn as_int(&self) -> Option<i64> {
        match self {
            WireValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as float if this is a float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            WireValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get as string slice if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            WireValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get as byte slice if this is a buffer
    pub fn as_bin(&self) -> Option<&[u8]> {
        match self {
            WireValue::Bin(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    /// Get the native reference if this is a handle
    pub fn as_handle(&self) -> Option<NativeRef> {
        match self {
            WireValue::Handle(r) => Some(*r),
            _ => None,
        }
    }
}

impl From<bool> for WireValue {
    fn from(b: bool) -> Self {
        WireValue::Bool(b)
    }
}

impl From<u64> for WireValue {
    fn from(u: u64) -> Self {
        WireValue::Uint(u)
    }
}

impl From<i64> for WireValue {
    fn from(i: i64) -> Self {
        WireValue::Int(i)
    }
}

impl From<f64> for WireValue {
    fn from(f: f64) -> Self {
        WireValue::Float(f)
    }
}

impl From<&str> for WireValue {
    fn from(s: &str) -> Self {
        WireValue::Str(s.to_string())
    }
}

impl From<String> for WireValue {
    fn from(s: String) -> Self {
        WireValue::Str(s)
    }
}

impl From<Vec<u8>> for WireValue {
    fn from(b: Vec<u8>) -> Self {
        WireValue::Bin(b)
    }
}

impl From<NativeRef> for WireValue {
    fn from(r: NativeRef) -> Self {
        WireValue::Handle(r)
    }
}
