//! Tether ABI — shared data model for the native/host proxy bridge
//!
//! This crate defines the types both sides of the bridge agree on:
//! the closed set of primitive wire kinds, the tagged value that
//! crosses the call boundary, the four call-index spaces, the entry
//! point descriptors consulted by every generated call site, the
//! error taxonomy, and the build stamp that ties a dispatch table to
//! the proxy units emitted in the same generation pass.
//!
//! Generation-side code lives in `tether-gen`; runtime dispatch and
//! object lifetime live in `tether-bridge`. Both depend on this crate
//! and nothing else shared.

#![warn(missing_docs)]

mod entry;
mod error;
mod kind;
mod stamp;
mod value;

pub use entry::{EntryKey, NativeEntryPoint};
pub use error::{CallError, CallResult, GenError, GenResult};
pub use kind::{CallSpace, PrimitiveKind, ReturnKind};
pub use stamp::BuildStamp;
pub use value::{NativeRef, WireValue};
