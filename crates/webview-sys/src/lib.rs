//! Raw FFI declarations for the [webview](https://github.com/webview/webview) C library.
//!
//! The library is not linked at build time. [`WebviewApi::load`] opens it with
//! `libloading` and copies every entry point into a plain table of function
//! pointers that stays valid for as long as the table is alive.

#![allow(non_camel_case_types)]
#![allow(unsafe_code)]

use std::ffi::{c_char, c_int, c_uint, c_void, OsStr};

use libloading::Library;

/// Opaque pointer to a native webview instance.
pub type webview_t = *mut c_void;

/// Callback scheduled with `webview_dispatch`.
pub type webview_dispatch_fn = unsafe extern "C" fn(w: webview_t, arg: *mut c_void);

/// Callback registered with `webview_bind`. `id` and `req` are only valid
/// for the duration of the call.
pub type webview_bind_fn =
    unsafe extern "C" fn(id: *const c_char, req: *const c_char, arg: *mut c_void);

pub const WEBVIEW_HINT_NONE: c_int = 0;
pub const WEBVIEW_HINT_MIN: c_int = 1;
pub const WEBVIEW_HINT_MAX: c_int = 2;
pub const WEBVIEW_HINT_FIXED: c_int = 3;

pub const WEBVIEW_NATIVE_HANDLE_KIND_UI_WINDOW: c_int = 0;
pub const WEBVIEW_NATIVE_HANDLE_KIND_UI_WIDGET: c_int = 1;
pub const WEBVIEW_NATIVE_HANDLE_KIND_BROWSER_CONTROLLER: c_int = 2;

/// Status passed to `webview_return` for a resolved binding call.
pub const WEBVIEW_RETURN_OK: c_int = 0;
/// Status passed to `webview_return` for a rejected binding call.
pub const WEBVIEW_RETURN_ERROR: c_int = 1;

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct webview_version_t {
    pub major: c_uint,
    pub minor: c_uint,
    pub patch: c_uint,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct webview_version_info_t {
    pub version: webview_version_t,
    /// SemVer 2.0.0 version number in `MAJOR.MINOR.PATCH` form.
    pub version_number: [c_char; 32],
    /// SemVer 2.0.0 pre-release label, or an empty string.
    pub pre_release: [c_char; 48],
    /// SemVer 2.0.0 build metadata, or an empty string.
    pub build_metadata: [c_char; 48],
}

/// Function table for a loaded webview library.
pub struct WebviewApi {
    pub webview_create: unsafe extern "C" fn(debug: c_int, window: *mut c_void) -> webview_t,
    pub webview_destroy: unsafe extern "C" fn(w: webview_t),
    pub webview_run: unsafe extern "C" fn(w: webview_t),
    pub webview_terminate: unsafe extern "C" fn(w: webview_t),
    pub webview_dispatch:
        unsafe extern "C" fn(w: webview_t, f: webview_dispatch_fn, arg: *mut c_void),
    pub webview_get_window: unsafe extern "C" fn(w: webview_t) -> *mut c_void,
    pub webview_get_native_handle: unsafe extern "C" fn(w: webview_t, kind: c_int) -> *mut c_void,
    pub webview_set_title: unsafe extern "C" fn(w: webview_t, title: *const c_char),
    pub webview_set_size:
        unsafe extern "C" fn(w: webview_t, width: c_int, height: c_int, hints: c_int),
    pub webview_navigate: unsafe extern "C" fn(w: webview_t, url: *const c_char),
    pub webview_set_html: unsafe extern "C" fn(w: webview_t, html: *const c_char),
    pub webview_init: unsafe extern "C" fn(w: webview_t, js: *const c_char),
    pub webview_eval: unsafe extern "C" fn(w: webview_t, js: *const c_char),
    pub webview_bind: unsafe extern "C" fn(
        w: webview_t,
        name: *const c_char,
        f: webview_bind_fn,
        arg: *mut c_void,
    ),
    pub webview_unbind: unsafe extern "C" fn(w: webview_t, name: *const c_char),
    pub webview_return: unsafe extern "C" fn(
        w: webview_t,
        id: *const c_char,
        status: c_int,
        result: *const c_char,
    ),
    pub webview_version: unsafe extern "C" fn() -> *const webview_version_info_t,
    // Keeps the symbols above mapped.
    _library: Library,
}

impl WebviewApi {
    /// Open the library at `path` and resolve every entry point.
    ///
    /// # Safety
    /// Loading a library runs its initialization routines, and the resolved
    /// symbols are trusted to have the signatures declared above.
    ///
    /// # Errors
    /// Returns an error if the library cannot be opened or a symbol is missing.
    pub unsafe fn load<P: AsRef<OsStr>>(path: P) -> Result<Self, libloading::Error> {
        let library = Library::new(path)?;
        Ok(Self {
            webview_create: symbol(&library, b"webview_create\0")?,
            webview_destroy: symbol(&library, b"webview_destroy\0")?,
            webview_run: symbol(&library, b"webview_run\0")?,
            webview_terminate: symbol(&library, b"webview_terminate\0")?,
            webview_dispatch: symbol(&library, b"webview_dispatch\0")?,
            webview_get_window: symbol(&library, b"webview_get_window\0")?,
            webview_get_native_handle: symbol(&library, b"webview_get_native_handle\0")?,
            webview_set_title: symbol(&library, b"webview_set_title\0")?,
            webview_set_size: symbol(&library, b"webview_set_size\0")?,
            webview_navigate: symbol(&library, b"webview_navigate\0")?,
            webview_set_html: symbol(&library, b"webview_set_html\0")?,
            webview_init: symbol(&library, b"webview_init\0")?,
            webview_eval: symbol(&library, b"webview_eval\0")?,
            webview_bind: symbol(&library, b"webview_bind\0")?,
            webview_unbind: symbol(&library, b"webview_unbind\0")?,
            webview_return: symbol(&library, b"webview_return\0")?,
            webview_version: symbol(&library, b"webview_version\0")?,
            _library: library,
        })
    }
}

/// Copy a function pointer out of `library`.
///
/// # Safety
/// `T` must match the C signature of the exported symbol.
unsafe fn symbol<T: Copy>(library: &Library, name: &[u8]) -> Result<T, libloading::Error> {
    // SAFETY: upheld by the caller.
    unsafe { library.get::<T>(name) }.map(|symbol| *symbol)
}

impl std::fmt::Debug for WebviewApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebviewApi").finish_non_exhaustive()
    }
}

/// Platform file name of the shared library, e.g. `libwebview.so`.
#[must_use]
pub fn library_filename() -> std::ffi::OsString {
    libloading::library_filename("webview")
}
