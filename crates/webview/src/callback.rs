//! Lifetime management for state handed to native code as `void *arg`.
//!
//! Two kinds of entries exist:
//!
//! - [`CallbackHandle`]: persistent state behind a binding. The native side
//!   may invoke it any number of times until the binding is removed.
//!   [`CallbackHandle::close`] consumes the handle, so a second close does
//!   not compile.
//! - [`OneShot`]: a task scheduled through `webview_dispatch`. It is moved
//!   out of its allocation on the single native invocation. Anything still
//!   queued when the session is destroyed is cancelled: its body is dropped,
//!   and the trampoline frees the empty allocation if it is ever delivered.

use std::collections::HashSet;
use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Persistent state registered with the native engine.
///
/// Native code holds one strong reference through the `arg` pointer. It is
/// released when the handle is closed or dropped, which must only happen
/// after the native side has been told to stop invoking it.
pub struct CallbackHandle<T> {
    ptr: NonNull<T>,
}

// SAFETY: the handle is an owned `Arc<T>` in raw form.
#[allow(unsafe_code)]
unsafe impl<T: Send + Sync> Send for CallbackHandle<T> {}
// SAFETY: as above.
#[allow(unsafe_code)]
unsafe impl<T: Send + Sync> Sync for CallbackHandle<T> {}

impl<T> CallbackHandle<T> {
    /// Move `state` behind a pointer suitable for a native `arg` parameter.
    #[allow(unsafe_code)]
    #[must_use]
    pub fn register(state: T) -> Self {
        let raw = Arc::into_raw(Arc::new(state)).cast_mut();
        // SAFETY: Arc::into_raw points into a live allocation.
        let ptr = unsafe { NonNull::new_unchecked(raw) };
        Self { ptr }
    }

    /// The pointer to pass to the native engine.
    #[must_use]
    pub fn as_arg(&self) -> *mut c_void {
        self.ptr.as_ptr().cast()
    }

    /// Get a reference-counted pointer to the state behind a native `arg`.
    ///
    /// The returned `Arc` keeps the state alive even if the handle is closed
    /// while the callback is still running.
    ///
    /// # Safety
    /// `arg` must come from [`CallbackHandle::as_arg`] on a handle that has
    /// not been closed.
    #[allow(unsafe_code)]
    #[must_use]
    pub unsafe fn acquire(arg: *mut c_void) -> Arc<T> {
        let ptr = arg.cast::<T>().cast_const();
        // SAFETY: ptr came from Arc::into_raw and the handle still owns one
        // strong reference.
        unsafe {
            Arc::increment_strong_count(ptr);
            Arc::from_raw(ptr)
        }
    }

    /// Release the native reference.
    pub fn close(self) {
        drop(self);
    }
}

impl<T> Drop for CallbackHandle<T> {
    #[allow(unsafe_code)]
    fn drop(&mut self) {
        // SAFETY: ptr came from Arc::into_raw in register() and this is the
        // only place that gives that reference back.
        unsafe { drop(Arc::from_raw(self.ptr.as_ptr().cast_const())) };
    }
}

impl<T> std::fmt::Debug for CallbackHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CallbackHandle").field(&self.ptr).finish()
    }
}

type Task = Box<dyn FnOnce() + Send>;

/// A single-use task queued with the native engine.
///
/// The allocation belongs to the native queue until the trampoline claims
/// it. Cancelling only empties the task slot; the box itself is freed by
/// [`OneShot::claim`], or leaked if the engine never delivers it.
pub struct OneShot {
    registry: Arc<OneShotRegistry>,
    task: Mutex<Option<Task>>,
}

impl OneShot {
    /// Take back ownership of a task from the native `arg` pointer.
    ///
    /// # Safety
    /// `arg` must come from [`OneShotRegistry::register`] and must not have
    /// been claimed before.
    #[allow(unsafe_code)]
    #[must_use]
    pub unsafe fn claim(arg: *mut c_void) -> Box<Self> {
        // SAFETY: arg came from Box::into_raw in register() and is claimed
        // once. cancel_all() never frees it.
        let shot = unsafe { Box::from_raw(arg.cast::<Self>()) };
        shot.registry.outstanding().remove(&(arg as usize));
        shot
    }

    /// Run the task unless it was cancelled. The allocation is freed when
    /// this returns. Returns whether the task ran.
    pub fn run(self: Box<Self>) -> bool {
        let task = self.task.into_inner().unwrap_or_else(PoisonError::into_inner);
        match task {
            Some(task) => {
                task();
                true
            }
            None => {
                tracing::debug!("Skipping dispatch task cancelled by destroy");
                false
            }
        }
    }

    fn take(&self) -> Option<Task> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Tracks one-shot tasks that the native engine has not run yet.
#[derive(Debug, Default)]
pub struct OneShotRegistry {
    outstanding: Mutex<HashSet<usize>>,
}

impl OneShotRegistry {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn outstanding(&self) -> MutexGuard<'_, HashSet<usize>> {
        self.outstanding.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Box `task` and return the pointer to hand to the native engine.
    pub fn register(self: &Arc<Self>, task: impl FnOnce() + Send + 'static) -> *mut c_void {
        let shot = Box::new(OneShot {
            registry: Arc::clone(self),
            task: Mutex::new(Some(Box::new(task))),
        });
        let arg = Box::into_raw(shot).cast::<c_void>();
        self.outstanding().insert(arg as usize);
        arg
    }

    /// Number of tasks registered but not yet run or cancelled.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outstanding().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the body of every outstanding task without running it.
    ///
    /// The native queue may still deliver the pointers later, so the
    /// allocations stay alive and [`OneShot::run`] skips the empty slots.
    #[allow(unsafe_code)]
    pub fn cancel_all(&self) -> usize {
        let mut outstanding = self.outstanding();
        let cancelled: Vec<Task> = outstanding
            .drain()
            .filter_map(|addr| {
                // SAFETY: addresses leave the set before claim() frees them,
                // and the set is locked here.
                let shot = unsafe { &*(addr as *const OneShot) };
                shot.take()
            })
            .collect();
        drop(outstanding);
        // Task captures may schedule more work, so they drop unlocked.
        let count = cancelled.len();
        drop(cancelled);
        if count > 0 {
            tracing::debug!("Cancelled {} undelivered dispatch task(s)", count);
        }
        count
    }
}
