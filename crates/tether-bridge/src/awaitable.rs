//! Settle-once awaitables and the completion queue
//!
//! An asynchronous entry returns an [`Awaitable`] that settles
//! exactly once: fulfilled with the success value or rejected with
//! the error value, never both, never twice. The native side settles
//! through a [`Completer`] it consumes by value; the settlement is
//! applied when the host's single execution context drains the
//! [`CompletionQueue`], so native worker threads never mutate
//! host-visible state directly.

use std::sync::Arc;

use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};

use tether_abi::{CallError, CallResult, WireValue};

enum CellState {
    Pending,
    Settled(CallResult<WireValue>),
}

struct SettleCell {
    state: Mutex<CellState>,
    cond: Condvar,
}

impl SettleCell {
    fn new() -> Arc<Self> {
        Arc::new(SettleCell {
            state: Mutex::new(CellState::Pending),
            cond: Condvar::new(),
        })
    }

    /// Apply a settlement. Returns false if the cell was already
    /// settled; the second settlement is discarded.
    fn settle(&self, result: CallResult<WireValue>) -> bool {
        let mut state = self.state.lock();
        if matches!(*state, CellState::Settled(_)) {
            return false;
        }
        *state = CellState::Settled(result);
        self.cond.notify_all();
        true
    }
}

/// Host-side view of one asynchronous call.
pub struct Awaitable {
    cell: Arc<SettleCell>,
}

impl std::fmt::Debug for Awaitable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Awaitable")
            .field("settled", &self.is_settled())
            .finish()
    }
}

impl Awaitable {
    /// Whether the call has settled.
    pub fn is_settled(&self) -> bool {
        matches!(*self.cell.state.lock(), CellState::Settled(_))
    }

    /// The settlement, if the call has settled.
    pub fn try_result(&self) -> Option<CallResult<WireValue>> {
        match &*self.cell.state.lock() {
            CellState::Pending => None,
            CellState::Settled(result) => Some(result.clone()),
        }
    }

    /// Block until the call settles and return the settlement.
    ///
    /// Requires another thread to drain the completion queue;
    /// single-threaded callers use
    /// [`CompletionQueue::run_until_settled`] instead.
    pub fn wait(&self) -> CallResult<WireValue> {
        let mut state = self.cell.state.lock();
        loop {
            if let CellState::Settled(result) = &*state {
                return result.clone();
            }
            self.cell.cond.wait(&mut state);
        }
    }
}

struct Settlement {
    cell: Arc<SettleCell>,
    result: CallResult<WireValue>,
    hook: Option<Box<dyn FnOnce() + Send>>,
}

/// Settle-once token handed to the native side.
///
/// Consumed by value on settlement; dropping it unsettled posts a
/// rejection, so an issued call can never settle zero times.
pub struct Completer {
    cell: Option<Arc<SettleCell>>,
    tx: Sender<Settlement>,
    hook: Option<Box<dyn FnOnce() + Send>>,
}

impl Completer {
    /// Fulfill the call with a success value.
    pub fn fulfill(mut self, value: WireValue) {
        self.post(Ok(value));
    }

    /// Reject the call with a native-reported failure.
    pub fn reject(mut self, message: impl Into<String>) {
        self.post(Err(CallError::Native(message.into())));
    }

    fn post(&mut self, result: CallResult<WireValue>) {
        if let Some(cell) = self.cell.take() {
            // Receiver gone means the queue was dropped mid-call;
            // nothing left to notify.
            let _ = self.tx.send(Settlement {
                cell,
                result,
                hook: self.hook.take(),
            });
        }
    }
}

impl Drop for Completer {
    fn drop(&mut self) {
        self.post(Err(CallError::Native(
            "asynchronous call dropped without settling".to_string(),
        )));
    }
}

/// Queue of pending settlements, drained by the host's single
/// execution context.
pub struct CompletionQueue {
    tx: Sender<Settlement>,
    rx: Receiver<Settlement>,
}

impl CompletionQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        CompletionQueue { tx, rx }
    }

    /// Create a pending awaitable and its completer.
    ///
    /// `hook` runs in the host context when the settlement is
    /// applied (the executor uses it for in-flight call accounting).
    pub(crate) fn pending(
        &self,
        hook: Option<Box<dyn FnOnce() + Send>>,
    ) -> (Awaitable, Completer) {
        let cell = SettleCell::new();
        let awaitable = Awaitable { cell: cell.clone() };
        let completer = Completer {
            cell: Some(cell),
            tx: self.tx.clone(),
            hook,
        };
        (awaitable, completer)
    }

    /// Apply all settlements currently queued. Returns how many were
    /// applied.
    pub fn drain(&self) -> usize {
        let mut applied = 0;
        while let Ok(settlement) = self.rx.try_recv() {
            settlement.cell.settle(settlement.result);
            if let Some(hook) = settlement.hook {
                hook();
            }
            applied += 1;
        }
        applied
    }

    /// Drain until the given awaitable settles, then return its
    /// settlement.
    pub fn run_until_settled(&self, awaitable: &Awaitable) -> CallResult<WireValue> {
        loop {
            if let Some(result) = awaitable.try_result() {
                return result;
            }
            if self.drain() == 0 {
                std::thread::yield_now();
            }
        }
    }
}

impl Default for CompletionQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fulfill_settles_once() {
        let queue = CompletionQueue::new();
        let (awaitable, completer) = queue.pending(None);
        assert!(!awaitable.is_settled());

        completer.fulfill(WireValue::Uint(7));
        assert!(!awaitable.is_settled()); // not applied until drained
        assert_eq!(queue.drain(), 1);
        assert_eq!(awaitable.try_result(), Some(Ok(WireValue::Uint(7))));
        assert_eq!(queue.drain(), 0);
    }

    #[test]
    fn test_reject_carries_native_error() {
        let queue = CompletionQueue::new();
        let (awaitable, completer) = queue.pending(None);
        completer.reject("disk on fire");
        queue.drain();
        assert_eq!(
            awaitable.try_result(),
            Some(Err(CallError::Native("disk on fire".to_string())))
        );
    }

    #[test]
    fn test_dropped_completer_rejects() {
        let queue = CompletionQueue::new();
        let (awaitable, completer) = queue.pending(None);
        drop(completer);
        queue.drain();
        assert!(matches!(
            awaitable.try_result(),
            Some(Err(CallError::Native(_)))
        ));
    }

    #[test]
    fn test_hook_runs_on_application() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let counter = Arc::new(AtomicUsize::new(0));
        let queue = CompletionQueue::new();
        let hooked = counter.clone();
        let (awaitable, completer) =
            queue.pending(Some(Box::new(move || {
                hooked.fetch_add(1, Ordering::SeqCst);
            })));

        completer.fulfill(WireValue::Undefined);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        queue.drain();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(awaitable.is_settled());
    }

    #[test]
    fn test_cross_thread_settlement() {
        let queue = CompletionQueue::new();
        let (awaitable, completer) = queue.pending(None);
        let worker = std::thread::spawn(move || {
            completer.fulfill(WireValue::Bool(true));
        });
        let result = queue.run_until_settled(&awaitable);
        worker.join().unwrap();
        assert_eq!(result, Ok(WireValue::Bool(true)));
    }
}
