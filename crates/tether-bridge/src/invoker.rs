//! The trait seam to the wrapped native library

use tether_abi::{NativeEntryPoint, NativeRef, WireValue};

use crate::awaitable::Completer;

/// Implemented by the wrapped native library (or a binding shim over
/// it). The executor performs every host-local check before any of
/// these methods is reached, so implementations may assume arguments
/// already match the entry's signature positionally.
pub trait NativeInvoker: Send + Sync {
    /// Execute a synchronous entry. Blocks the calling context.
    ///
    /// `receiver` is `Some` exactly for instance-space entries and
    /// refers to a resource the bridge has verified as live.
    /// Constructor entries return `WireValue::Handle` with a fresh
    /// resource token.
    fn invoke(
        &self,
        entry: &NativeEntryPoint,
        receiver: Option<NativeRef>,
        args: &[WireValue],
    ) -> Result<WireValue, String>;

    /// Start an asynchronous entry.
    ///
    /// The work may run on the native side's own threads; the
    /// `completer` must be consumed exactly once, from any thread.
    /// Settlement is applied in the host's execution context when
    /// the completion queue is drained. Dropping the completer
    /// unsettled rejects the call, so a settlement always occurs.
    fn invoke_async(
        &self,
        entry: &NativeEntryPoint,
        receiver: Option<NativeRef>,
        args: Vec<WireValue>,
        completer: Completer,
    );

    /// Allocate an independent copy of a live resource.
    ///
    /// Backs the generated `clone()`: the returned token must refer
    /// to a new resource, never alias `resource`.
    fn duplicate(&self, resource: NativeRef) -> Result<NativeRef, String>;

    /// Reclaim a resource.
    ///
    /// Called at most once per token, guaranteed by the bridge's
    /// reclamation guard; reached from explicit release, deferred
    /// release, or finalization.
    fn reclaim(&self, resource: NativeRef);
}
