//! Scheduling work on the web view's thread.
//!
//! Every dispatched closure becomes a one-shot task passed to
//! `webview_dispatch`. The native run loop invokes it exactly once on the
//! session thread; the task is freed as soon as the closure returns.

use std::any::Any;
use std::ffi::c_void;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use webview_sys::webview_t;

use crate::callback::OneShot;
use crate::webview::{Shared, Webview};
use crate::Result;

/// A thread-safe reference to a web view session.
///
/// Handles outlive the session; once it is destroyed every call returns
/// [`Error::Destroyed`](crate::Error::Destroyed).
#[derive(Clone)]
pub struct Handle {
    shared: Arc<Shared>,
}

impl Handle {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Run `f` on the web view's thread during the next loop iteration.
    ///
    /// # Errors
    /// Returns [`Error::Destroyed`](crate::Error::Destroyed) if the session is gone.
    pub fn dispatch<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&Webview) + Send + 'static,
    {
        dispatch(&self.shared, f)
    }

    /// Stop the run loop from any thread.
    ///
    /// # Errors
    /// Returns [`Error::Destroyed`](crate::Error::Destroyed) if the session is gone.
    pub fn terminate(&self) -> Result<()> {
        self.dispatch(|w| {
            if let Err(e) = w.stop() {
                tracing::warn!("Failed to terminate run loop: {}", e);
            }
        })
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle").finish_non_exhaustive()
    }
}

impl Webview {
    /// Run `f` on this web view's thread during the next loop iteration.
    ///
    /// Panics inside `f` stop the run loop and are resumed from
    /// [`WebviewSession::run`](crate::WebviewSession::run).
    ///
    /// # Errors
    /// Returns [`Error::Destroyed`](crate::Error::Destroyed) if the session is gone.
    pub fn dispatch<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&Webview) + Send + 'static,
    {
        dispatch(&self.shared, f)
    }
}

fn dispatch<F>(shared: &Arc<Shared>, f: F) -> Result<()>
where
    F: FnOnce(&Webview) + Send + 'static,
{
    let target = Arc::clone(shared);
    schedule(shared, move || {
        let view = Webview::from_shared(Arc::clone(&target));
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| f(&view))) {
            target.record_panic(payload);
        }
    })
}

/// Queue `task` with the native engine.
#[allow(unsafe_code)]
pub(crate) fn schedule(shared: &Arc<Shared>, task: impl FnOnce() + Send + 'static) -> Result<()> {
    shared.with_handle(|w| {
        let arg = shared.one_shots.register(task);
        // SAFETY: the handle is live while the lock is held, and arg stays
        // valid until the trampoline claims it, even after a destroy.
        unsafe { shared.engine.dispatch(w, dispatch_trampoline, arg) };
        tracing::trace!("Dispatched task ({} outstanding)", shared.one_shots.len());
    })
}

#[allow(unsafe_code)]
unsafe extern "C" fn dispatch_trampoline(_w: webview_t, arg: *mut c_void) {
    if arg.is_null() {
        tracing::warn!("dispatch_trampoline: null pointer");
        return;
    }
    // SAFETY: arg was registered in schedule() and the engine invokes each
    // dispatch once. Cancelled tasks keep their allocation until this point.
    let shot = unsafe { OneShot::claim(arg) };
    // Tasks built here never unwind; the guard keeps foreign ones from
    // crossing the C boundary.
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| shot.run())) {
        tracing::error!("Dispatch task panicked: {}", panic_message(payload.as_ref()));
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::{Call, MockEngine};
    use crate::{WebviewSession, WebviewSettings};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn session(engine: &Arc<MockEngine>) -> WebviewSession {
        WebviewSession::with_engine(engine.clone(), WebviewSettings::new()).unwrap()
    }

    #[test]
    fn test_dispatch_runs_exactly_once() {
        let engine = Arc::new(MockEngine::default());
        let view = session(&engine);
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = (2, 3);
        let seen = calls.clone();
        view.dispatch(move |_| {
            assert_eq!(a + b, 5);
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(view.shared.one_shots.len(), 1);
        assert_eq!(engine.run_pending(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(view.shared.one_shots.is_empty());
        assert_eq!(engine.run_pending(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispatch_frees_captures_after_run() {
        let engine = Arc::new(MockEngine::default());
        let view = session(&engine);
        let token = Arc::new(());
        let captured = token.clone();
        view.dispatch(move |_| drop(captured)).unwrap();
        assert_eq!(Arc::strong_count(&token), 2);
        engine.run_pending();
        assert_eq!(Arc::strong_count(&token), 1);
    }

    #[test]
    fn test_dispatch_from_other_thread() {
        let engine = Arc::new(MockEngine::default());
        let view = session(&engine);
        let handle = view.handle();

        std::thread::spawn(move || {
            handle.dispatch(|w| w.set_title("threaded").unwrap()).unwrap();
        })
        .join()
        .unwrap();

        engine.run_pending();
        assert!(engine.calls().contains(&Call::SetTitle("threaded".into())));
    }

    #[test]
    fn test_handle_terminate() {
        let engine = Arc::new(MockEngine::default());
        let view = session(&engine);
        view.handle().terminate().unwrap();
        engine.run_pending();
        assert_eq!(engine.count(|c| *c == Call::Terminate), 1);
        assert!(!engine.is_destroyed());
    }

    #[test]
    fn test_undelivered_dispatch_cancelled_on_destroy() {
        let engine = Arc::new(MockEngine::default());
        let view = session(&engine);
        let token = Arc::new(());
        let captured = token.clone();
        let ran = Arc::new(AtomicUsize::new(0));
        let seen = ran.clone();
        view.dispatch(move |_| {
            let _keep = &captured;
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        let registry = Arc::clone(&view.shared.one_shots);

        view.destroy();

        assert!(registry.is_empty());
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(Arc::strong_count(&token), 1);
    }

    #[test]
    fn test_stale_dispatch_delivered_after_destroy_is_skipped() {
        let engine = Arc::new(MockEngine::retaining());
        let view = session(&engine);
        let token = Arc::new(());
        let captured = token.clone();
        let ran = Arc::new(AtomicUsize::new(0));
        let seen = ran.clone();
        view.dispatch(move |w| {
            let _keep = &captured;
            seen.fetch_add(1, Ordering::SeqCst);
            w.set_title("stale").unwrap();
        })
        .unwrap();

        view.destroy();
        assert_eq!(engine.pending(), 1);
        assert_eq!(Arc::strong_count(&token), 1);

        assert_eq!(engine.run_pending(), 1);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert!(!engine.calls().contains(&Call::SetTitle("stale".into())));
    }

    #[test]
    fn test_dispatch_panic_resumes_from_run() {
        let engine = Arc::new(MockEngine::default());
        let view = session(&engine);
        view.dispatch(|_| panic!("dispatch boom")).unwrap();

        let result = catch_unwind(AssertUnwindSafe(|| view.run()));

        let payload = result.unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "dispatch boom");
        assert_eq!(engine.count(|c| *c == Call::Terminate), 1);
        assert!(view.shared.one_shots.is_empty());
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic payload");
    }
}
