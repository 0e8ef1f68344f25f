//! The native engine seam.
//!
//! [`Engine`] mirrors the C ABI one function per entry point. The production
//! implementation is [`NativeLibrary`], a process-wide table loaded once on
//! first use and kept until the process exits.

use std::ffi::{c_char, c_int, c_void, OsString};
use std::sync::{Arc, OnceLock};

use webview_sys::{webview_bind_fn, webview_dispatch_fn, webview_t, WebviewApi};

use crate::{Error, Result};

/// Environment variable overriding the path of the native library.
pub const LIBRARY_PATH_ENV: &str = "WEBVIEW_LIBRARY_PATH";

/// The flat C API of a webview engine.
///
/// # Safety
/// Every method forwards raw pointers to native code. Callers must pass a
/// handle obtained from [`Engine::create`] that has not been destroyed, and
/// string pointers that are NUL-terminated and valid for the call.
#[allow(unsafe_code, clippy::missing_safety_doc)]
pub trait Engine: Send + Sync {
    unsafe fn create(&self, debug: c_int, window: *mut c_void) -> webview_t;
    unsafe fn destroy(&self, w: webview_t);
    unsafe fn run(&self, w: webview_t);
    unsafe fn terminate(&self, w: webview_t);
    unsafe fn dispatch(&self, w: webview_t, f: webview_dispatch_fn, arg: *mut c_void);
    unsafe fn get_window(&self, w: webview_t) -> *mut c_void;
    unsafe fn get_native_handle(&self, w: webview_t, kind: c_int) -> *mut c_void;
    unsafe fn set_title(&self, w: webview_t, title: *const c_char);
    unsafe fn set_size(&self, w: webview_t, width: c_int, height: c_int, hints: c_int);
    unsafe fn navigate(&self, w: webview_t, url: *const c_char);
    unsafe fn set_html(&self, w: webview_t, html: *const c_char);
    unsafe fn init(&self, w: webview_t, js: *const c_char);
    unsafe fn eval(&self, w: webview_t, js: *const c_char);
    unsafe fn bind(&self, w: webview_t, name: *const c_char, f: webview_bind_fn, arg: *mut c_void);
    unsafe fn unbind(&self, w: webview_t, name: *const c_char);
    unsafe fn ret(&self, w: webview_t, id: *const c_char, status: c_int, result: *const c_char);
}

static LIBRARY: OnceLock<std::result::Result<Arc<NativeLibrary>, String>> = OnceLock::new();

/// The dynamically loaded webview library.
#[derive(Debug)]
pub struct NativeLibrary {
    api: WebviewApi,
}

impl NativeLibrary {
    /// Get the process-wide library, loading it on first use.
    ///
    /// The path comes from `WEBVIEW_LIBRARY_PATH`, falling back to the
    /// platform file name (`libwebview.so`, `webview.dll`, ...). A failed
    /// load is cached and reported on every call.
    ///
    /// # Errors
    /// Returns [`Error::LibraryLoad`] if the library or one of its symbols
    /// could not be loaded.
    #[allow(unsafe_code)]
    pub fn global() -> Result<Arc<Self>> {
        LIBRARY
            .get_or_init(|| {
                let path = library_path();
                tracing::debug!("Loading webview library from {:?}", path);
                // SAFETY: the library is trusted to export the webview C API
                // with the signatures declared in webview-sys.
                let api = unsafe { WebviewApi::load(&path) }.map_err(|e| {
                    tracing::error!("Failed to load webview library {:?}: {}", path, e);
                    format!("{}: {e}", path.to_string_lossy())
                })?;
                tracing::info!("Webview library loaded");
                Ok(Arc::new(Self { api }))
            })
            .clone()
            .map_err(Error::LibraryLoad)
    }

    /// Version information reported by the library.
    #[must_use]
    #[allow(unsafe_code)]
    pub fn version(&self) -> Option<Version> {
        // SAFETY: webview_version takes no arguments and returns a pointer to
        // static data, or null.
        let info = unsafe { (self.api.webview_version)() };
        if info.is_null() {
            return None;
        }
        // SAFETY: non-null pointers from webview_version point to a static
        // webview_version_info_t.
        let info = unsafe { &*info };
        Some(Version {
            major: info.version.major,
            minor: info.version.minor,
            patch: info.version.patch,
            number: fixed_str(&info.version_number),
            pre_release: fixed_str(&info.pre_release),
            build_metadata: fixed_str(&info.build_metadata),
        })
    }
}

/// Version of the loaded native library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    /// `MAJOR.MINOR.PATCH`
    pub number: String,
    pub pre_release: String,
    pub build_metadata: String,
}

/// Version of the process-wide native library.
///
/// # Errors
/// Returns [`Error::LibraryLoad`] if the library could not be loaded or does
/// not report a version.
pub fn version() -> Result<Version> {
    NativeLibrary::global()?
        .version()
        .ok_or_else(|| Error::LibraryLoad("webview_version returned null".to_string()))
}

fn library_path() -> OsString {
    std::env::var_os(LIBRARY_PATH_ENV).unwrap_or_else(webview_sys::library_filename)
}

/// Read a fixed-size, NUL-padded C char array.
#[allow(clippy::cast_sign_loss)]
fn fixed_str(buf: &[c_char]) -> String {
    let bytes: Vec<u8> = buf.iter().take_while(|&&c| c != 0).map(|&c| c as u8).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[allow(unsafe_code)]
impl Engine for NativeLibrary {
    unsafe fn create(&self, debug: c_int, window: *mut c_void) -> webview_t {
        // SAFETY: forwarded contract.
        unsafe { (self.api.webview_create)(debug, window) }
    }

    unsafe fn destroy(&self, w: webview_t) {
        // SAFETY: forwarded contract.
        unsafe { (self.api.webview_destroy)(w) }
    }

    unsafe fn run(&self, w: webview_t) {
        // SAFETY: forwarded contract.
        unsafe { (self.api.webview_run)(w) }
    }

    unsafe fn terminate(&self, w: webview_t) {
        // SAFETY: forwarded contract.
        unsafe { (self.api.webview_terminate)(w) }
    }

    unsafe fn dispatch(&self, w: webview_t, f: webview_dispatch_fn, arg: *mut c_void) {
        // SAFETY: forwarded contract.
        unsafe { (self.api.webview_dispatch)(w, f, arg) }
    }

    unsafe fn get_window(&self, w: webview_t) -> *mut c_void {
        // SAFETY: forwarded contract.
        unsafe { (self.api.webview_get_window)(w) }
    }

    unsafe fn get_native_handle(&self, w: webview_t, kind: c_int) -> *mut c_void {
        // SAFETY: forwarded contract.
        unsafe { (self.api.webview_get_native_handle)(w, kind) }
    }

    unsafe fn set_title(&self, w: webview_t, title: *const c_char) {
        // SAFETY: forwarded contract.
        unsafe { (self.api.webview_set_title)(w, title) }
    }

    unsafe fn set_size(&self, w: webview_t, width: c_int, height: c_int, hints: c_int) {
        // SAFETY: forwarded contract.
        unsafe { (self.api.webview_set_size)(w, width, height, hints) }
    }

    unsafe fn navigate(&self, w: webview_t, url: *const c_char) {
        // SAFETY: forwarded contract.
        unsafe { (self.api.webview_navigate)(w, url) }
    }

    unsafe fn set_html(&self, w: webview_t, html: *const c_char) {
        // SAFETY: forwarded contract.
        unsafe { (self.api.webview_set_html)(w, html) }
    }

    unsafe fn init(&self, w: webview_t, js: *const c_char) {
        // SAFETY: forwarded contract.
        unsafe { (self.api.webview_init)(w, js) }
    }

    unsafe fn eval(&self, w: webview_t, js: *const c_char) {
        // SAFETY: forwarded contract.
        unsafe { (self.api.webview_eval)(w, js) }
    }

    unsafe fn bind(&self, w: webview_t, name: *const c_char, f: webview_bind_fn, arg: *mut c_void) {
        // SAFETY: forwarded contract.
        unsafe { (self.api.webview_bind)(w, name, f, arg) }
    }

    unsafe fn unbind(&self, w: webview_t, name: *const c_char) {
        // SAFETY: forwarded contract.
        unsafe { (self.api.webview_unbind)(w, name) }
    }

    unsafe fn ret(&self, w: webview_t, id: *const c_char, status: c_int, result: *const c_char) {
        // SAFETY: forwarded contract.
        unsafe { (self.api.webview_return)(w, id, status, result) }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_str_stops_at_nul() {
        let mut buf: [c_char; 8] = [0; 8];
        for (slot, byte) in buf.iter_mut().zip(b"0.12.0") {
            *slot = *byte as c_char;
        }
        assert_eq!(fixed_str(&buf), "0.12.0");
    }

    #[test]
    fn test_fixed_str_empty() {
        let buf: [c_char; 4] = [0; 4];
        assert_eq!(fixed_str(&buf), "");
    }

    #[test]
    fn test_fixed_str_unterminated() {
        let buf: [c_char; 3] = [b'a' as c_char, b'b' as c_char, b'c' as c_char];
        assert_eq!(fixed_str(&buf), "abc");
    }
}
