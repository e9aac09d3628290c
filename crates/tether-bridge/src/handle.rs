//! Object handles and the lifetime protocol
//!
//! A handle is the exclusive owner of one native resource on the
//! host side. It is created around a fresh constructor result, lives
//! until explicit release (terminal), and is registered with the
//! finalization registry for the whole Live span so the collector
//! backstop can reclaim leaked resources. The host-side reference is
//! nulled at release: every later call is rejected locally, before
//! the native side could be reached.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use tether_abi::{CallError, CallResult, NativeRef};

use crate::finalize::FinalizerRegistry;
use crate::invoker::NativeInvoker;

/// Observable lifetime state of a handle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HandleState {
    /// Valid for calls
    Live,
    /// Released; all calls fail deterministically, forever
    Released,
}

/// Shared core: the nullable host-side reference plus in-flight call
/// accounting for deferred reclamation.
struct HandleCore {
    /// `Some` while Live; `None` after release
    native: Mutex<Option<NativeRef>>,
    /// Outstanding asynchronous calls issued through this handle
    inflight: AtomicUsize,
}

/// Exclusive host-side owner of one native resource.
///
/// Never value-copied into two independently releasable owners:
/// [`ObjectHandle::duplicate`] (backing the generated `clone()`)
/// allocates a new native resource instead of aliasing.
pub struct ObjectHandle {
    core: Arc<HandleCore>,
    /// The token this handle was created around; kept for guard
    /// keying after the host-side reference is nulled.
    token: NativeRef,
    type_id: u32,
    type_name: String,
    registry: Arc<FinalizerRegistry>,
    invoker: Arc<dyn NativeInvoker>,
}

impl ObjectHandle {
    /// Wrap a fresh constructor result and register it for
    /// finalization. The handle is Live when this returns; a failed
    /// construction never reaches this point.
    pub(crate) fn adopt(
        native: NativeRef,
        type_id: u32,
        type_name: &str,
        registry: Arc<FinalizerRegistry>,
        invoker: Arc<dyn NativeInvoker>,
    ) -> Self {
        registry.register(native);
        ObjectHandle {
            core: Arc::new(HandleCore {
                native: Mutex::new(Some(native)),
                inflight: AtomicUsize::new(0),
            }),
            token: native,
            type_id,
            type_name: type_name.to_string(),
            registry,
            invoker,
        }
    }

    /// Current lifetime state.
    pub fn state(&self) -> HandleState {
        if self.core.native.lock().is_some() {
            HandleState::Live
        } else {
            HandleState::Released
        }
    }

    /// Stable id of the owning native type.
    pub fn type_id(&self) -> u32 {
        self.type_id
    }

    /// Host-visible name of the owning native type.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The native reference, failing with `UseAfterRelease` once the
    /// handle is released.
    pub fn native_ref(&self) -> CallResult<NativeRef> {
        let native = *self.core.native.lock();
        native.ok_or_else(|| CallError::UseAfterRelease {
            type_name: self.type_name.clone(),
        })
    }

    /// Explicitly release the handle.
    ///
    /// Marks the handle Released, deregisters it from the
    /// finalization registry, nulls the host-side reference, and
    /// reclaims the native resource. A second release fails with
    /// `AlreadyReleased` without any native call.
    ///
    /// If asynchronous calls issued through this handle are still in
    /// flight, the handle is Released immediately (new calls are
    /// rejected) but native reclamation is deferred until the last
    /// outstanding call settles; in-flight calls settle normally.
    pub fn release(&self) -> CallResult<()> {
        let taken = self.core.native.lock().take();
        if taken.is_none() {
            return Err(CallError::AlreadyReleased {
                type_name: self.type_name.clone(),
            });
        }
        self.registry.deregister(self.token);
        if self.core.inflight.load(Ordering::SeqCst) == 0 {
            self.registry.reclaim(self.token, self.invoker.as_ref());
        }
        Ok(())
    }

    /// Allocate an independent copy of the resource and wrap it in a
    /// new, independently owned handle. Fails with `UseAfterRelease`
    /// on a released handle; a native-side failure surfaces as
    /// `Native` and creates nothing.
    pub fn duplicate(&self) -> CallResult<ObjectHandle> {
        let source = self.native_ref()?;
        let copy = self
            .invoker
            .duplicate(source)
            .map_err(CallError::Native)?;
        Ok(ObjectHandle::adopt(
            copy,
            self.type_id,
            &self.type_name,
            self.registry.clone(),
            self.invoker.clone(),
        ))
    }

    /// Start an asynchronous call through this handle: verifies the
    /// handle is Live, bumps the in-flight count, and returns the
    /// receiver token plus the settlement hook that undoes the
    /// accounting (and performs any deferred reclamation) once the
    /// call settles.
    pub(crate) fn begin_async_call(
        &self,
    ) -> CallResult<(NativeRef, Box<dyn FnOnce() + Send>)> {
        let guard = self.core.native.lock();
        let native = (*guard).ok_or_else(|| CallError::UseAfterRelease {
            type_name: self.type_name.clone(),
        })?;
        self.core.inflight.fetch_add(1, Ordering::SeqCst);
        drop(guard);

        let core = self.core.clone();
        let token = self.token;
        let registry = self.registry.clone();
        let invoker = self.invoker.clone();
        let hook = Box::new(move || {
            let remaining = core.inflight.fetch_sub(1, Ordering::SeqCst) - 1;
            if remaining == 0 && core.native.lock().is_none() {
                registry.reclaim(token, invoker.as_ref());
            }
        });
        Ok((native, hook))
    }
}

impl std::fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectHandle")
            .field("type_name", &self.type_name)
            .field("token", &self.token)
            .field("state", &self.state())
            .finish()
    }
}
