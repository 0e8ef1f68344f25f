//! Webview sessions on top of the native C API.

use std::any::Any;
use std::collections::HashMap;
use std::ffi::{c_char, c_int, c_void};
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::{self, NonNull};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use webview_sys::webview_t;

use crate::bind::Binding;
use crate::callback::{CallbackHandle, OneShotRegistry};
use crate::dispatch::{panic_message, Handle};
use crate::engine::{Engine, NativeLibrary};
use crate::{marshal, Error, Result};

/// How [`Webview::set_size`] constrains the window.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SizeHint {
    /// Width and height are the default size.
    #[default]
    None,
    /// Width and height are the minimum bounds.
    Min,
    /// Width and height are the maximum bounds.
    Max,
    /// The window cannot be resized.
    Fixed,
}

impl SizeHint {
    #[must_use]
    pub fn as_raw(self) -> c_int {
        match self {
            Self::None => webview_sys::WEBVIEW_HINT_NONE,
            Self::Min => webview_sys::WEBVIEW_HINT_MIN,
            Self::Max => webview_sys::WEBVIEW_HINT_MAX,
            Self::Fixed => webview_sys::WEBVIEW_HINT_FIXED,
        }
    }
}

impl FromStr for SizeHint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Self::None),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "fixed" => Ok(Self::Fixed),
            other => Err(Error::InvalidSizeHint(other.to_string())),
        }
    }
}

/// Which native object [`Webview::native_handle`] returns.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum NativeHandleKind {
    /// Top-level window: `GtkWindow`, `NSWindow` or `HWND`.
    #[default]
    UiWindow,
    /// Browser widget: `GtkWidget`, `NSView` or `HWND`.
    UiWidget,
    /// Browser controller: `WebKitWebView`, `WKWebView` or `ICoreWebView2Controller`.
    BrowserController,
}

impl NativeHandleKind {
    #[must_use]
    pub fn as_raw(self) -> c_int {
        match self {
            Self::UiWindow => webview_sys::WEBVIEW_NATIVE_HANDLE_KIND_UI_WINDOW,
            Self::UiWidget => webview_sys::WEBVIEW_NATIVE_HANDLE_KIND_UI_WIDGET,
            Self::BrowserController => webview_sys::WEBVIEW_NATIVE_HANDLE_KIND_BROWSER_CONTROLLER,
        }
    }
}

/// Settings for creating a [`WebviewSession`].
#[derive(Debug, Clone)]
pub struct WebviewSettings {
    /// Enable developer tools where the platform supports them
    pub debug: bool,
    /// Native window to embed into, or null for a new top-level window
    pub parent_window: *mut c_void,
    /// Initial window title
    pub title: Option<String>,
    /// Initial window size
    pub size: Option<(i32, i32, SizeHint)>,
    /// Initial URL to load
    pub url: Option<String>,
    /// Initial HTML content, used when no URL is set
    pub html: Option<String>,
    /// Scripts injected before `window.onload` on every page
    pub init_scripts: Vec<String>,
    /// Runtime that async bindings are spawned on
    #[cfg(feature = "tokio")]
    pub runtime: Option<tokio::runtime::Handle>,
}

impl Default for WebviewSettings {
    fn default() -> Self {
        Self {
            debug: false,
            parent_window: ptr::null_mut(),
            title: None,
            size: None,
            url: None,
            html: None,
            init_scripts: Vec::new(),
            #[cfg(feature = "tokio")]
            runtime: None,
        }
    }
}

impl WebviewSettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Embed the web view into an existing native window.
    ///
    /// # Safety
    /// `window` must be a valid `GtkWindow`, `NSWindow` or `HWND` that
    /// outlives the session.
    #[allow(unsafe_code)]
    #[must_use]
    pub unsafe fn with_parent_window(mut self, window: NonNull<c_void>) -> Self {
        self.parent_window = window.as_ptr();
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_size(mut self, width: i32, height: i32, hint: SizeHint) -> Self {
        self.size = Some((width, height, hint));
        self
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    #[must_use]
    pub fn with_init_script(mut self, js: impl Into<String>) -> Self {
        self.init_scripts.push(js.into());
        self
    }

    #[cfg(feature = "tokio")]
    #[must_use]
    pub fn with_runtime(mut self, runtime: tokio::runtime::Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }
}

/// Owned native instance pointer. Never dereferenced on the Rust side.
pub(crate) struct RawHandle(NonNull<c_void>);

// SAFETY: the pointer is only passed back to the native engine, and only on
// the session thread except for webview_dispatch, which the library allows
// from any thread.
#[allow(unsafe_code)]
unsafe impl Send for RawHandle {}
// SAFETY: as above.
#[allow(unsafe_code)]
unsafe impl Sync for RawHandle {}

impl RawHandle {
    fn as_ptr(&self) -> webview_t {
        self.0.as_ptr()
    }
}

pub(crate) struct State {
    /// `None` once the session is destroyed.
    handle: Option<RawHandle>,
    pub(crate) binds: HashMap<String, CallbackHandle<Binding>>,
}

impl State {
    /// The live native handle.
    ///
    /// # Errors
    /// Returns [`Error::Destroyed`] after the session has been destroyed.
    pub(crate) fn raw(&self) -> Result<webview_t> {
        self.handle.as_ref().map(RawHandle::as_ptr).ok_or(Error::Destroyed)
    }
}

/// State shared between a session, its [`Handle`]s and in-flight callbacks.
pub(crate) struct Shared {
    pub(crate) engine: Arc<dyn Engine>,
    state: Mutex<State>,
    pub(crate) one_shots: Arc<OneShotRegistry>,
    pub(crate) debug: bool,
    thread: ThreadId,
    panic: Mutex<Option<Box<dyn Any + Send>>>,
    #[cfg(feature = "tokio")]
    pub(crate) runtime: Option<tokio::runtime::Handle>,
}

impl Shared {
    pub(crate) fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn on_session_thread(&self) -> bool {
        thread::current().id() == self.thread
    }

    /// Run `f` with the live native handle, holding the state lock so the
    /// session cannot be destroyed concurrently.
    ///
    /// # Errors
    /// Returns [`Error::Destroyed`] after the session has been destroyed.
    pub(crate) fn with_handle<T>(&self, f: impl FnOnce(webview_t) -> T) -> Result<T> {
        let state = self.state();
        Ok(f(state.raw()?))
    }

    /// Keep the first panic from a dispatched task and stop the run loop so
    /// [`WebviewSession::run`] can resume it.
    #[allow(unsafe_code)]
    pub(crate) fn record_panic(&self, payload: Box<dyn Any + Send>) {
        tracing::error!("Dispatched task panicked: {}", panic_message(payload.as_ref()));
        {
            let mut slot = self.panic.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                *slot = Some(payload);
            }
        }
        // SAFETY: the handle is live while the lock is held.
        if self.with_handle(|w| unsafe { self.engine.terminate(w) }).is_err() {
            tracing::debug!("Panic recorded after the web view was destroyed");
        }
    }

    fn take_panic(&self) -> Option<Box<dyn Any + Send>> {
        self.panic.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// A view of a live web view.
///
/// Owned by a [`WebviewSession`] and passed by reference to dispatched
/// tasks. Not `Send`: the native API has to be driven from the thread the
/// session was created on. Use [`Webview::handle`] to reach it from other
/// threads.
pub struct Webview {
    pub(crate) shared: Arc<Shared>,
    _not_send: PhantomData<*const ()>,
}

impl Webview {
    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            _not_send: PhantomData,
        }
    }

    /// Whether the session was created with developer tools enabled.
    #[must_use]
    pub fn is_debug(&self) -> bool {
        self.shared.debug
    }

    /// A thread-safe handle for scheduling work on this web view.
    #[must_use]
    pub fn handle(&self) -> Handle {
        Handle::new(Arc::clone(&self.shared))
    }

    /// Ask the native run loop to exit. The session stays alive.
    ///
    /// # Errors
    /// Returns [`Error::Destroyed`] if the session is gone.
    #[allow(unsafe_code)]
    pub fn stop(&self) -> Result<()> {
        // SAFETY: the handle is live while the lock is held.
        self.shared.with_handle(|w| unsafe { self.shared.engine.terminate(w) })?;
        tracing::debug!("Requested run loop termination");
        Ok(())
    }

    /// The native top-level window (`GtkWindow`, `NSWindow` or `HWND`).
    ///
    /// # Errors
    /// Returns [`Error::Destroyed`] if the session is gone.
    #[allow(unsafe_code)]
    pub fn window(&self) -> Result<*mut c_void> {
        // SAFETY: the handle is live while the lock is held.
        self.shared.with_handle(|w| unsafe { self.shared.engine.get_window(w) })
    }

    /// A native object backing this web view.
    ///
    /// # Errors
    /// Returns [`Error::Destroyed`] if the session is gone.
    #[allow(unsafe_code)]
    pub fn native_handle(&self, kind: NativeHandleKind) -> Result<*mut c_void> {
        let kind = kind.as_raw();
        // SAFETY: the handle is live while the lock is held.
        self.shared.with_handle(|w| unsafe { self.shared.engine.get_native_handle(w, kind) })
    }

    /// Encode `text` and pass it to a native setter.
    fn forward_str(
        &self,
        text: &str,
        f: impl FnOnce(&dyn Engine, webview_t, *const c_char),
    ) -> Result<()> {
        marshal::with_c_str(text, |s| {
            self.shared.with_handle(|w| f(self.shared.engine.as_ref(), w, s))
        })?
    }

    /// # Errors
    /// Returns an error if `title` contains a NUL byte or the session is gone.
    #[allow(unsafe_code)]
    pub fn set_title(&self, title: &str) -> Result<()> {
        // SAFETY: live handle and a NUL-terminated buffer valid for the call.
        self.forward_str(title, |engine, w, s| unsafe { engine.set_title(w, s) })?;
        tracing::debug!("Set title: {}", title);
        Ok(())
    }

    /// # Errors
    /// Returns [`Error::Destroyed`] if the session is gone.
    #[allow(unsafe_code)]
    pub fn set_size(&self, width: i32, height: i32, hint: SizeHint) -> Result<()> {
        self.shared.with_handle(|w| {
            // SAFETY: the handle is live while the lock is held.
            unsafe { self.shared.engine.set_size(w, width, height, hint.as_raw()) }
        })?;
        tracing::debug!("Resized to {}x{} ({:?})", width, height, hint);
        Ok(())
    }

    /// Navigate to `url`. Data URIs are accepted.
    ///
    /// # Errors
    /// Returns an error if `url` contains a NUL byte or the session is gone.
    #[allow(unsafe_code)]
    pub fn navigate(&self, url: &str) -> Result<()> {
        // SAFETY: live handle and a NUL-terminated buffer valid for the call.
        self.forward_str(url, |engine, w, s| unsafe { engine.navigate(w, s) })?;
        tracing::debug!("Navigating to {}", url);
        Ok(())
    }

    /// Replace the page content with `html`.
    ///
    /// # Errors
    /// Returns an error if `html` contains a NUL byte or the session is gone.
    #[allow(unsafe_code)]
    pub fn set_html(&self, html: &str) -> Result<()> {
        // SAFETY: live handle and a NUL-terminated buffer valid for the call.
        self.forward_str(html, |engine, w, s| unsafe { engine.set_html(w, s) })?;
        tracing::debug!("Loading HTML content ({} bytes)", html.len());
        Ok(())
    }

    /// Inject `js` into every page before `window.onload`.
    ///
    /// # Errors
    /// Returns an error if `js` contains a NUL byte or the session is gone.
    #[allow(unsafe_code)]
    pub fn init(&self, js: &str) -> Result<()> {
        // SAFETY: live handle and a NUL-terminated buffer valid for the call.
        self.forward_str(js, |engine, w, s| unsafe { engine.init(w, s) })?;
        tracing::trace!("Added init script ({} bytes)", js.len());
        Ok(())
    }

    /// Evaluate `js` in the current page. The result is ignored.
    ///
    /// # Errors
    /// Returns an error if `js` contains a NUL byte or the session is gone.
    #[allow(unsafe_code)]
    pub fn eval(&self, js: &str) -> Result<()> {
        // SAFETY: live handle and a NUL-terminated buffer valid for the call.
        self.forward_str(js, |engine, w, s| unsafe { engine.eval(w, s) })?;
        tracing::trace!("Evaluating script ({} bytes)", js.len());
        Ok(())
    }

    /// Unbind everything, destroy the native instance and cancel queued
    /// dispatch tasks.
    #[allow(unsafe_code)]
    fn teardown(&self) {
        let names: Vec<String> = self.shared.state().binds.keys().cloned().collect();
        for name in &names {
            if let Err(e) = self.unbind(name) {
                tracing::warn!("Failed to unbind {:?} during teardown: {}", name, e);
            }
        }

        {
            let mut state = self.shared.state();
            match state.handle.take() {
                // SAFETY: the handle came from webview_create and is dropped
                // from the state, so nothing can use it afterwards.
                Some(handle) => unsafe { self.shared.engine.destroy(handle.as_ptr()) },
                None => return,
            }
        }

        self.shared.one_shots.cancel_all();
        tracing::debug!("Destroyed web view ({} binding(s) removed)", names.len());
    }
}

/// Owner of a native web view instance.
///
/// Dropping the session unbinds every function and destroys the native
/// instance. Everything on [`Webview`] is available through `Deref`.
pub struct WebviewSession {
    view: Webview,
}

impl WebviewSession {
    /// Create a web view with `settings` using the process-wide library.
    ///
    /// # Errors
    /// Returns an error if the library cannot be loaded, the native
    /// constructor fails, or an initial setting cannot be applied.
    pub fn new(settings: WebviewSettings) -> Result<Self> {
        Self::with_engine(NativeLibrary::global()?, settings)
    }

    /// Create a top-level web view window.
    ///
    /// # Errors
    /// See [`WebviewSession::new`].
    pub fn create(debug: bool) -> Result<Self> {
        Self::new(WebviewSettings::new().with_debug(debug))
    }

    /// Create a web view on a specific engine.
    ///
    /// # Errors
    /// Returns [`Error::CreationFailed`] if the engine returns a null handle,
    /// or an error from applying the initial settings.
    #[allow(unsafe_code)]
    pub fn with_engine(engine: Arc<dyn Engine>, settings: WebviewSettings) -> Result<Self> {
        // SAFETY: parent_window is null or a window the caller vouched for in
        // WebviewSettings::with_parent_window.
        let raw = unsafe { engine.create(c_int::from(settings.debug), settings.parent_window) };
        let Some(handle) = NonNull::new(raw) else {
            tracing::error!("webview_create returned a null handle");
            return Err(Error::CreationFailed);
        };

        let shared = Arc::new(Shared {
            engine,
            state: Mutex::new(State {
                handle: Some(RawHandle(handle)),
                binds: HashMap::new(),
            }),
            one_shots: OneShotRegistry::new(),
            debug: settings.debug,
            thread: thread::current().id(),
            panic: Mutex::new(None),
            #[cfg(feature = "tokio")]
            runtime: settings.runtime.clone(),
        });

        let session = Self {
            view: Webview::from_shared(shared),
        };
        session.apply(&settings)?;

        tracing::debug!("Created web view (debug: {})", settings.debug);
        Ok(session)
    }

    fn apply(&self, settings: &WebviewSettings) -> Result<()> {
        if let Some(title) = &settings.title {
            self.set_title(title)?;
        }
        if let Some((width, height, hint)) = settings.size {
            self.set_size(width, height, hint)?;
        }
        for js in &settings.init_scripts {
            self.init(js)?;
        }
        if let Some(url) = &settings.url {
            self.navigate(url)?;
        } else if let Some(html) = &settings.html {
            self.set_html(html)?;
        }
        Ok(())
    }

    /// Run the native event loop on this thread until it is terminated or
    /// the window is closed.
    ///
    /// If a dispatched task panicked, the loop is stopped and the panic is
    /// resumed here.
    ///
    /// # Errors
    /// Returns [`Error::Destroyed`] if the session is gone.
    #[allow(unsafe_code)]
    pub fn run(&self) -> Result<()> {
        // The lock must not be held while the loop runs: callbacks need it.
        let w = self.shared.with_handle(|w| w)?;
        tracing::debug!("Entering native run loop");
        // SAFETY: the session owns the handle and cannot be destroyed while
        // borrowed here.
        unsafe { self.shared.engine.run(w) };
        tracing::debug!("Native run loop exited");

        if let Some(payload) = self.shared.take_panic() {
            std::panic::resume_unwind(payload);
        }
        Ok(())
    }

    /// Unbind everything and destroy the native instance.
    pub fn destroy(self) {
        drop(self);
    }

    /// Stop the run loop, then destroy the session.
    pub fn terminate(self) {
        if let Err(e) = self.view.stop() {
            tracing::warn!("Failed to terminate run loop: {}", e);
        }
        drop(self);
    }
}

impl Deref for WebviewSession {
    type Target = Webview;

    fn deref(&self) -> &Webview {
        &self.view
    }
}

impl Drop for WebviewSession {
    fn drop(&mut self) {
        self.view.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::{Call, MockEngine, WINDOW};

    fn session(engine: &Arc<MockEngine>, settings: WebviewSettings) -> WebviewSession {
        WebviewSession::with_engine(engine.clone(), settings).unwrap()
    }

    #[test]
    fn test_create_encodes_debug_flag() {
        let engine = Arc::new(MockEngine::default());
        let view = session(&engine, WebviewSettings::new().with_debug(true));
        assert!(view.is_debug());
        assert_eq!(engine.calls()[0], Call::Create { debug: 1 });

        let engine = Arc::new(MockEngine::default());
        let _view = session(&engine, WebviewSettings::new());
        assert_eq!(engine.calls()[0], Call::Create { debug: 0 });
    }

    #[test]
    fn test_null_handle_is_creation_failure() {
        let engine = Arc::new(MockEngine::failing());
        let result = WebviewSession::with_engine(engine.clone(), WebviewSettings::new());
        assert!(matches!(result, Err(Error::CreationFailed)));
        assert!(!engine.is_destroyed());
    }

    #[test]
    fn test_settings_applied_in_order() {
        let engine = Arc::new(MockEngine::default());
        let _view = session(
            &engine,
            WebviewSettings::new()
                .with_title("Demo")
                .with_size(800, 600, SizeHint::Fixed)
                .with_init_script("window.a = 1")
                .with_url("https://example.com")
                .with_html("<p>ignored</p>"),
        );
        assert_eq!(
            engine.calls()[1..],
            [
                Call::SetTitle("Demo".into()),
                Call::SetSize(800, 600, 3),
                Call::Init("window.a = 1".into()),
                Call::Navigate("https://example.com".into()),
            ]
        );
    }

    #[test]
    fn test_settings_html_without_url() {
        let engine = Arc::new(MockEngine::default());
        let _view = session(&engine, WebviewSettings::new().with_html("<h1>Hi</h1>"));
        assert_eq!(engine.calls()[1], Call::SetHtml("<h1>Hi</h1>".into()));
    }

    #[test]
    fn test_invalid_setting_destroys_instance() {
        let engine = Arc::new(MockEngine::default());
        let result =
            WebviewSession::with_engine(engine.clone(), WebviewSettings::new().with_title("a\0b"));
        assert!(matches!(result, Err(Error::InteriorNul(1))));
        assert!(engine.is_destroyed());
    }

    #[test]
    fn test_setters_forward_strings() {
        let engine = Arc::new(MockEngine::default());
        let view = session(&engine, WebviewSettings::new());
        view.set_title("Title").unwrap();
        view.navigate("https://rust-lang.org").unwrap();
        view.set_html("<p>x</p>").unwrap();
        view.init("console.log(1)").unwrap();
        view.eval("document.title").unwrap();
        assert_eq!(
            engine.calls()[1..],
            [
                Call::SetTitle("Title".into()),
                Call::Navigate("https://rust-lang.org".into()),
                Call::SetHtml("<p>x</p>".into()),
                Call::Init("console.log(1)".into()),
                Call::Eval("document.title".into()),
            ]
        );
    }

    #[test]
    fn test_setter_with_nul_makes_no_native_call() {
        let engine = Arc::new(MockEngine::default());
        let view = session(&engine, WebviewSettings::new());
        assert!(view.eval("a\0").is_err());
        assert_eq!(engine.calls().len(), 1);
    }

    #[test]
    fn test_size_hints() {
        let engine = Arc::new(MockEngine::default());
        let view = session(&engine, WebviewSettings::new());
        view.set_size(1, 2, SizeHint::None).unwrap();
        view.set_size(1, 2, SizeHint::Min).unwrap();
        view.set_size(1, 2, SizeHint::Max).unwrap();
        view.set_size(1, 2, SizeHint::Fixed).unwrap();
        assert_eq!(
            engine.calls()[1..],
            [
                Call::SetSize(1, 2, 0),
                Call::SetSize(1, 2, 1),
                Call::SetSize(1, 2, 2),
                Call::SetSize(1, 2, 3),
            ]
        );
    }

    #[test]
    fn test_size_hint_from_str() {
        assert_eq!("none".parse::<SizeHint>().unwrap(), SizeHint::None);
        assert_eq!("min".parse::<SizeHint>().unwrap(), SizeHint::Min);
        assert_eq!("max".parse::<SizeHint>().unwrap(), SizeHint::Max);
        assert_eq!("fixed".parse::<SizeHint>().unwrap(), SizeHint::Fixed);
        assert!(matches!("huge".parse::<SizeHint>(), Err(Error::InvalidSizeHint(h)) if h == "huge"));
        assert_eq!(SizeHint::default(), SizeHint::None);
    }

    #[test]
    fn test_window_and_native_handle() {
        let engine = Arc::new(MockEngine::default());
        let view = session(&engine, WebviewSettings::new());
        assert_eq!(view.window().unwrap() as usize, WINDOW);
        assert_eq!(
            view.native_handle(NativeHandleKind::BrowserController).unwrap() as usize,
            WINDOW + 2
        );
        assert_eq!(
            engine.calls()[1..],
            [Call::GetWindow, Call::GetNativeHandle(2)]
        );
    }

    #[test]
    fn test_destroy_with_no_bindings() {
        let engine = Arc::new(MockEngine::default());
        let view = session(&engine, WebviewSettings::new());
        view.destroy();
        assert!(engine.is_destroyed());
        assert_eq!(engine.calls()[1..], [Call::Destroy]);
    }

    #[test]
    fn test_destroy_unbinds_everything_first() {
        for count in [1, 5] {
            let engine = Arc::new(MockEngine::default());
            let view = session(&engine, WebviewSettings::new());
            for i in 0..count {
                view.bind(&format!("f{i}"), |_| Ok::<_, String>(())).unwrap();
            }
            let shared = Arc::clone(&view.shared);
            view.destroy();

            assert!(shared.state().binds.is_empty());
            assert_eq!(engine.count(|c| matches!(c, Call::Unbind(_))), count);
            assert_eq!(engine.calls().last(), Some(&Call::Destroy));
            for i in 0..count {
                assert!(!engine.is_bound(&format!("f{i}")));
            }
        }
    }

    #[test]
    fn test_terminate_stops_then_destroys() {
        let engine = Arc::new(MockEngine::default());
        let view = session(&engine, WebviewSettings::new());
        view.terminate();
        assert_eq!(engine.calls()[1..], [Call::Terminate, Call::Destroy]);
    }

    #[test]
    fn test_drop_destroys() {
        let engine = Arc::new(MockEngine::default());
        {
            let _view = session(&engine, WebviewSettings::new());
        }
        assert!(engine.is_destroyed());
    }

    #[test]
    fn test_handle_after_destroy() {
        let engine = Arc::new(MockEngine::default());
        let view = session(&engine, WebviewSettings::new());
        let handle = view.handle();
        view.destroy();
        assert!(matches!(handle.dispatch(|_| {}), Err(Error::Destroyed)));
        assert!(matches!(handle.terminate(), Err(Error::Destroyed)));
    }

    #[test]
    fn test_run_delivers_dispatches() {
        let engine = Arc::new(MockEngine::default());
        let view = session(&engine, WebviewSettings::new());
        view.dispatch(|w| w.set_title("from loop").unwrap()).unwrap();
        view.run().unwrap();
        assert!(engine.calls().contains(&Call::SetTitle("from loop".into())));
    }
}
