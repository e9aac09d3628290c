//! Tether runtime bridge
//!
//! The behavior behind every generated proxy call: handle lifetime
//! (creation, explicit release, best-effort finalization), indexed
//! dispatch through the stamped table, positional argument checks,
//! and the sync/async calling convention.
//!
//! The native library plugs in through [`NativeInvoker`]; the host's
//! single execution context drains the [`CompletionQueue`] to apply
//! async settlements. All host-local failures are detected before
//! the native side is touched.

#![warn(missing_docs)]

mod awaitable;
mod executor;
mod finalize;
mod handle;
mod invoker;

pub use awaitable::{Awaitable, Completer, CompletionQueue};
pub use executor::CallExecutor;
pub use finalize::{FinalizerRegistry, RegistryStats};
pub use handle::{HandleState, ObjectHandle};
pub use invoker::NativeInvoker;

pub use tether_abi::{
    BuildStamp, CallError, CallResult, CallSpace, EntryKey, NativeEntryPoint, NativeRef,
    PrimitiveKind, ReturnKind, WireValue,
};
