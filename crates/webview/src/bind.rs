//! Host functions callable from script code.
//!
//! A binding is a persistent [`CallbackHandle`] registered with
//! `webview_bind`. Each call from script code turns into a [`Request`] and
//! is answered through a [`Responder`], exactly once per request id. The
//! responder can be moved to another thread or into a future; answers sent
//! off the session thread are dispatched back onto it before they reach
//! `webview_return`.

use std::ffi::{c_char, c_void};
use std::fmt::Display;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::thread;

use serde::Serialize;
use serde_json::Value;

use crate::callback::CallbackHandle;
use crate::dispatch::{panic_message, schedule};
use crate::protocol::{self, Outcome, Request, Response, Status};
use crate::webview::{Shared, Webview};
use crate::{marshal, Result};

type BindFn = dyn Fn(Request, Responder) + Send + Sync;

/// State behind a bound name.
pub(crate) struct Binding {
    name: String,
    shared: Weak<Shared>,
    bound_args: Vec<Value>,
    handler: Box<BindFn>,
}

impl Binding {
    fn invoke(&self, shared: &Arc<Shared>, id: String, args_json: &str) {
        let responder = Responder::new(Arc::clone(shared), id.clone(), self.name.clone());
        match Request::parse(id, self.name.clone(), args_json) {
            Ok(request) => (self.handler)(request.with_bound_args(&self.bound_args), responder),
            Err(e) => responder.reject(e),
        }
    }
}

#[allow(unsafe_code)]
unsafe extern "C" fn bind_trampoline(id: *const c_char, req: *const c_char, arg: *mut c_void) {
    if arg.is_null() {
        tracing::warn!("bind_trampoline: null pointer");
        return;
    }
    // SAFETY: arg was registered by Webview::register_binding and the engine
    // only invokes it until webview_unbind, which happens before close.
    let binding = unsafe { CallbackHandle::<Binding>::acquire(arg) };
    // SAFETY: the engine passes NUL-terminated strings valid for this call.
    let (Some(id), Some(req)) = (unsafe { marshal::decode(id) }, unsafe { marshal::decode(req) })
    else {
        tracing::warn!("Binding {:?} called with a null id or request", binding.name);
        return;
    };
    let Some(shared) = binding.shared.upgrade() else {
        tracing::debug!("Binding {:?} called after its web view was dropped", binding.name);
        return;
    };

    tracing::trace!("Call to {:?} (request {}): {}", binding.name, id, req);
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| binding.invoke(&shared, id, &req))) {
        tracing::error!(
            "Binding {:?} panicked: {}",
            binding.name,
            panic_message(payload.as_ref())
        );
    }
}

/// Answers one binding request.
///
/// Consumed by [`resolve`](Self::resolve), [`reject`](Self::reject) or
/// [`respond`](Self::respond). Dropping it unanswered rejects the request so
/// the promise on the script side always settles.
pub struct Responder {
    shared: Arc<Shared>,
    id: Option<String>,
    name: String,
}

impl Responder {
    fn new(shared: Arc<Shared>, id: String, name: String) -> Self {
        Self {
            shared,
            id: Some(id),
            name,
        }
    }

    /// Id of the request being answered.
    #[must_use]
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    /// Name of the binding that was called.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve the script-side promise with `value` encoded as JSON.
    pub fn resolve<R: Serialize>(self, value: R) {
        self.respond(Ok::<R, std::convert::Infallible>(value));
    }

    /// Reject the script-side promise with `message` as plain text.
    pub fn reject(self, message: impl Display) {
        self.finish(Err(message.to_string()));
    }

    /// Resolve or reject depending on `result`.
    pub fn respond<R: Serialize, E: Display>(self, result: std::result::Result<R, E>) {
        self.finish(protocol::outcome(result));
    }

    fn finish(mut self, outcome: Outcome) {
        if let Some(id) = self.id.take() {
            send(&self.shared, &self.name, Response::from_outcome(id, outcome));
        }
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            let message = if thread::panicking() {
                "binding handler panicked"
            } else {
                "binding handler dropped the request without responding"
            };
            send(&self.shared, &self.name, Response::error(id, message));
        }
    }
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn send(shared: &Arc<Shared>, name: &str, response: Response) {
    if response.status == Status::Error {
        if shared.debug {
            tracing::warn!("Binding {:?} failed: {}", name, response.payload);
        } else {
            tracing::debug!("Binding {:?} failed: {}", name, response.payload);
        }
    }

    if shared.on_session_thread() {
        deliver(shared, &response);
        return;
    }

    let id = response.id.clone();
    let target = Arc::clone(shared);
    if schedule(shared, move || deliver(&target, &response)).is_err() {
        tracing::debug!("Dropping response to request {} for {:?}: web view destroyed", id, name);
    }
}

#[allow(unsafe_code)]
fn deliver(shared: &Shared, response: &Response) {
    let id = marshal::encode_lossy(&response.id);
    let payload = marshal::encode_lossy(&response.payload);
    let status = response.status.code();
    // SAFETY: the handle is live while the lock is held; id and payload are
    // NUL-terminated and outlive the call.
    let sent = shared.with_handle(|w| unsafe {
        shared.engine.ret(w, id.as_ptr(), status, payload.as_ptr());
    });
    match sent {
        Ok(()) => tracing::trace!("Returned {:?} for request {}", response.status, response.id),
        Err(_) => tracing::debug!(
            "Dropping response to request {}: web view destroyed",
            response.id
        ),
    }
}

impl Webview {
    /// Expose `handler` to script code as `window[name]`.
    ///
    /// Script code receives a promise. It resolves with the JSON encoding of
    /// the handler's `Ok` value (`null` for `()` or `None`) and rejects with
    /// the `Display` text of its `Err` value. Binding a name that is already
    /// bound replaces the previous handler.
    ///
    /// # Errors
    /// Returns an error if `name` contains a NUL byte or the session is gone.
    pub fn bind<F, R, E>(&self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(Request) -> std::result::Result<R, E> + Send + Sync + 'static,
        R: Serialize,
        E: Display,
    {
        self.bind_with(name, Vec::new(), handler)
    }

    /// Like [`bind`](Self::bind), appending `bound_args` after the arguments
    /// passed by script code on every call.
    ///
    /// # Errors
    /// Returns an error if `name` contains a NUL byte or the session is gone.
    pub fn bind_with<F, R, E>(&self, name: &str, bound_args: Vec<Value>, handler: F) -> Result<()>
    where
        F: Fn(Request) -> std::result::Result<R, E> + Send + Sync + 'static,
        R: Serialize,
        E: Display,
    {
        self.register_binding(
            name,
            bound_args,
            Box::new(move |request, responder| responder.respond(handler(request))),
        )
    }

    /// Bind a handler that answers later through its [`Responder`].
    ///
    /// The responder may be sent to another thread. Requests can be answered
    /// in any order.
    ///
    /// # Errors
    /// Returns an error if `name` contains a NUL byte or the session is gone.
    pub fn bind_deferred<F>(&self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(Request, Responder) + Send + Sync + 'static,
    {
        self.register_binding(name, Vec::new(), Box::new(handler))
    }

    /// Bind an async handler. Each call is spawned on the runtime from
    /// [`WebviewSettings::with_runtime`](crate::WebviewSettings::with_runtime),
    /// or the runtime current at bind time.
    ///
    /// # Errors
    /// Returns [`Error::NoRuntime`](crate::Error::NoRuntime) if no runtime is
    /// available, or an error if `name` contains a NUL byte or the session
    /// is gone.
    #[cfg(feature = "tokio")]
    pub fn bind_async<F, Fut, R, E>(&self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = std::result::Result<R, E>> + Send + 'static,
        R: Serialize + 'static,
        E: Display + 'static,
    {
        let runtime = match &self.shared.runtime {
            Some(runtime) => runtime.clone(),
            None => tokio::runtime::Handle::try_current().map_err(|_| crate::Error::NoRuntime)?,
        };
        self.bind_deferred(name, move |request, responder| {
            let future = handler(request);
            drop(runtime.spawn(async move { responder.respond(future.await) }));
        })
    }

    /// Remove the binding for `name`.
    ///
    /// The native unbind is always issued, even for names this session never
    /// bound; unknown names are otherwise a no-op.
    ///
    /// # Errors
    /// Returns an error if `name` contains a NUL byte or the session is gone.
    #[allow(unsafe_code)]
    pub fn unbind(&self, name: &str) -> Result<()> {
        let c_name = marshal::encode(name)?;
        let removed = {
            let mut state = self.shared.state();
            let w = state.raw()?;
            // SAFETY: live handle and a NUL-terminated name valid for the call.
            unsafe { self.shared.engine.unbind(w, c_name.as_ptr()) };
            state.binds.remove(name)
        };
        // Closed only after the engine stopped routing calls to it.
        match removed {
            Some(handle) => {
                handle.close();
                tracing::debug!("Unbound {:?}", name);
            }
            None => tracing::trace!("Unbound {:?} (was not bound)", name),
        }
        Ok(())
    }

    /// Names currently bound, sorted.
    #[must_use]
    pub fn bindings(&self) -> Vec<String> {
        let mut names: Vec<String> = self.shared.state().binds.keys().cloned().collect();
        names.sort();
        names
    }

    #[allow(unsafe_code)]
    fn register_binding(&self, name: &str, bound_args: Vec<Value>, handler: Box<BindFn>) -> Result<()> {
        let c_name = marshal::encode(name)?;
        let rebinding = self.shared.state().binds.contains_key(name);
        if rebinding {
            self.unbind(name)?;
        }

        let handle = CallbackHandle::register(Binding {
            name: name.to_string(),
            shared: Arc::downgrade(&self.shared),
            bound_args,
            handler,
        });

        let mut state = self.shared.state();
        let w = state.raw()?;
        // SAFETY: live handle, a NUL-terminated name valid for the call, and
        // an arg that stays valid until unbind closes the handle.
        unsafe {
            self.shared
                .engine
                .bind(w, c_name.as_ptr(), bind_trampoline, handle.as_arg());
        }
        state.binds.insert(name.to_string(), handle);
        drop(state);

        tracing::debug!("Bound {:?}{}", name, if rebinding { " (replaced)" } else { "" });
        Ok(())
    }
}
