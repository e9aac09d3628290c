//! Calling convention executor
//!
//! One executor per linked proxy/table pair. The call surface
//! mirrors the four index spaces: `static_call`, `async_static_call`
//! (no receiver) and `call`, `async_call` (receiver handle), plus
//! `construct` which wraps a constructor entry's result into a fresh
//! [`ObjectHandle`].
//!
//! Per call, strictly in order: handle-state check (instance calls),
//! `(space, index)` lookup, positional argument check, native
//! invocation. The first three never touch the native side; an
//! async entry that fails any of them errors synchronously instead
//! of producing a pending awaitable.

use std::sync::Arc;

use tether_abi::{
    BuildStamp, CallError, CallResult, CallSpace, EntryKey, NativeEntryPoint, WireValue,
};
use tether_gen::DispatchTable;

use crate::awaitable::{Awaitable, CompletionQueue};
use crate::finalize::FinalizerRegistry;
use crate::handle::ObjectHandle;
use crate::invoker::NativeInvoker;

/// Runtime dispatcher for one generation pass.
pub struct CallExecutor {
    table: Arc<DispatchTable>,
    invoker: Arc<dyn NativeInvoker>,
    registry: Arc<FinalizerRegistry>,
    queue: CompletionQueue,
}

impl std::fmt::Debug for CallExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallExecutor")
            .field("stamp", self.table.stamp())
            .finish_non_exhaustive()
    }
}


impl CallExecutor {
    /// Link a proxy unit against a dispatch table.
    ///
    /// Both artifacts must come from the same generation pass;
    /// `proxy_stamp` is the stamp embedded in the proxy unit and a
    /// mismatch fails with `StaleBinding` before any call is made.
    pub fn link(
        table: Arc<DispatchTable>,
        proxy_stamp: &BuildStamp,
        invoker: Arc<dyn NativeInvoker>,
    ) -> CallResult<Self> {
        if table.stamp() != proxy_stamp {
            return Err(CallError::StaleBinding {
                detail: format!(
                    "proxy stamped {} but dispatch table stamped {}",
                    proxy_stamp,
                    table.stamp()
                ),
            });
        }
        Ok(CallExecutor {
            table,
            invoker,
            registry: FinalizerRegistry::new(),
            queue: CompletionQueue::new(),
        })
    }

    /// The finalization registry for handles created through this
    /// executor. The host's collector notifications go here.
    pub fn registry(&self) -> &Arc<FinalizerRegistry> {
        &self.registry
    }

    /// The completion queue the host context drains for async
    /// settlements.
    pub fn queue(&self) -> &CompletionQueue {
        &self.queue
    }

    /// Static synchronous call. Blocks the calling context.
    pub fn static_call(&self, index: u32, args: &[WireValue]) -> CallResult<WireValue> {
        let entry = self.lookup(CallSpace::StaticSync, index)?;
        check_args(entry, args)?;
        self.invoker
            .invoke(entry, None, args)
            .map_err(CallError::Native)
    }

    /// Static asynchronous call. Host-local failures are returned
    /// synchronously; otherwise the awaitable settles exactly once.
    pub fn async_static_call(&self, index: u32, args: &[WireValue]) -> CallResult<Awaitable> {
        let entry = self.lookup(CallSpace::StaticAsync, index)?;
        check_args(entry, args)?;
        let (awaitable, completer) = self.queue.pending(None);
        self.invoker
            .invoke_async(entry, None, args.to_vec(), completer);
        Ok(awaitable)
    }

    /// Instance synchronous call through a handle.
    pub fn call(
        &self,
        handle: &ObjectHandle,
        index: u32,
        args: &[WireValue],
    ) -> CallResult<WireValue> {
        let receiver = handle.native_ref()?;
        let entry = self.lookup(CallSpace::InstanceSync, index)?;
        check_args(entry, args)?;
        self.invoker
            .invoke(entry, Some(receiver), args)
            .map_err(CallError::Native)
    }

    /// Instance asynchronous call through a handle.
    ///
    /// The handle's in-flight count covers the call until it
    /// settles, so releasing the handle mid-flight defers native
    /// reclamation instead of pulling the resource out from under
    /// the call.
    pub fn async_call(
        &self,
        handle: &ObjectHandle,
        index: u32,
        args: &[WireValue],
    ) -> CallResult<Awaitable> {
        let (receiver, hook) = handle.begin_async_call()?;
        let entry = match self.lookup(CallSpace::InstanceAsync, index) {
            Ok(entry) => entry,
            Err(e) => {
                hook();
                return Err(e);
            }
        };
        if let Err(e) = check_args(entry, args) {
            hook();
            return Err(e);
        }
        let (awaitable, completer) = self.queue.pending(Some(hook));
        self.invoker
            .invoke_async(entry, Some(receiver), args.to_vec(), completer);
        Ok(awaitable)
    }

    /// Invoke a constructor entry (static-sync space) and wrap the
    /// resulting resource in a fresh, finalization-registered
    /// handle. On failure no handle exists.
    pub fn construct(
        &self,
        index: u32,
        args: &[WireValue],
        type_id: u32,
        type_name: &str,
    ) -> CallResult<ObjectHandle> {
        let result = self.static_call(index, args)?;
        let native = result.as_handle().ok_or_else(|| {
            CallError::Native(format!(
                "constructor for {type_name} returned {} instead of a resource",
                result.type_name()
            ))
        })?;
        Ok(ObjectHandle::adopt(
            native,
            type_id,
            type_name,
            self.registry.clone(),
            self.invoker.clone(),
        ))
    }

    fn lookup(&self, space: CallSpace, index: u32) -> CallResult<&NativeEntryPoint> {
        self.table
            .lookup(EntryKey::new(space, index))
            .ok_or_else(|| CallError::StaleBinding {
                detail: format!("no entry at {}[{index}]", space),
            })
    }
}

/// Positional argument check against an entry's signature. Fails
/// without reaching the native side.
fn check_args(entry: &NativeEntryPoint, args: &[WireValue]) -> CallResult<()> {
    if args.len() < entry.params.len() {
        return Err(CallError::ArgumentTypeMismatch {
            position: args.len(),
            expected: entry.params[args.len()].suffix().to_string(),
            got: "missing argument".to_string(),
        });
    }
    if args.len() > entry.params.len() {
        return Err(CallError::ArgumentTypeMismatch {
            position: entry.params.len(),
            expected: "end of arguments".to_string(),
            got: args[entry.params.len()].type_name().to_string(),
        });
    }
    for (position, (arg, &expected)) in args.iter().zip(&entry.params).enumerate() {
        if arg.kind() != Some(expected) {
            return Err(CallError::ArgumentTypeMismatch {
                position,
                expected: expected.suffix().to_string(),
                got: arg.type_name().to_string(),
            });
        }
    }
    Ok(())
}
