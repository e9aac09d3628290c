//! Finalization registry and reclamation guard
//!
//! Explicit release is the primary cleanup discipline; finalization
//! is the leak backstop fired by the host collector with no ordering
//! or timing guarantee. Both paths funnel into one guard keyed by
//! the opaque native reference — never the host wrapper, which may
//! already be gone when a finalizer runs — so a resource is
//! reclaimed at most once no matter how the two paths interleave.

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::sync::Arc;

use tether_abi::NativeRef;

use crate::invoker::NativeInvoker;

/// Registry bookkeeping counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Handles currently registered for finalization
    pub registered: usize,
    /// Resources reclaimed so far
    pub reclaimed: usize,
}

struct RegistryInner {
    /// Registered at handle creation, removed at explicit release.
    live: FxHashSet<NativeRef>,
    /// The idempotent guard: a token lands here exactly when its
    /// reclamation is decided.
    reclaimed: FxHashSet<NativeRef>,
}

/// Shared finalization registry.
///
/// The only bridge structure mutated concurrently by both explicit
/// release and collector notifications; one mutex covers both sets
/// so the decide-to-reclaim step is atomic.
pub struct FinalizerRegistry {
    inner: Mutex<RegistryInner>,
}

impl FinalizerRegistry {
    /// Create an empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(FinalizerRegistry {
            inner: Mutex::new(RegistryInner {
                live: FxHashSet::default(),
                reclaimed: FxHashSet::default(),
            }),
        })
    }

    /// Register a freshly created handle's resource. Runs before the
    /// handle is handed to the host.
    pub fn register(&self, resource: NativeRef) {
        self.inner.lock().live.insert(resource);
    }

    /// Deregister at explicit release. Returns whether the resource
    /// was still registered.
    pub fn deregister(&self, resource: NativeRef) -> bool {
        self.inner.lock().live.remove(&resource)
    }

    /// Reclaim a resource through the guard.
    ///
    /// The winning caller invokes the native side outside the lock;
    /// every later call for the same token is a no-op. Returns
    /// whether this call performed the reclamation.
    pub fn reclaim(&self, resource: NativeRef, invoker: &dyn NativeInvoker) -> bool {
        let won = self.inner.lock().reclaimed.insert(resource);
        if won {
            invoker.reclaim(resource);
        }
        won
    }

    /// Collector notification: a proxy whose handle was never
    /// explicitly released has been collected.
    ///
    /// Reclaims only if the resource is still registered, so a
    /// finalizer racing an explicit release never double-frees.
    /// Returns whether this notification performed the reclamation.
    pub fn finalize(&self, resource: NativeRef, invoker: &dyn NativeInvoker) -> bool {
        let won = {
            let mut inner = self.inner.lock();
            inner.live.remove(&resource) && inner.reclaimed.insert(resource)
        };
        if won {
            invoker.reclaim(resource);
        }
        won
    }

    /// Current bookkeeping counters.
    pub fn stats(&self) -> RegistryStats {
        let inner = self.inner.lock();
        RegistryStats {
            registered: inner.live.len(),
            reclaimed: inner.reclaimed.len(),
        }
    }
}
