//! Safe Rust bindings for the [webview](https://github.com/webview/webview) C library.
//!
//! This crate drives a native window with an embedded browser through the
//! library's flat C API and lets script code running in the page call Rust
//! functions. The library is loaded at runtime the first time a session is
//! created.
//!
//! ## Features
//!
//! - `tokio` (default): async bindings via [`Webview::bind_async`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use webview::{SizeHint, WebviewSession, WebviewSettings};
//!
//! fn main() -> webview::Result<()> {
//!     let settings = WebviewSettings::new()
//!         .with_title("Hello")
//!         .with_size(480, 320, SizeHint::None)
//!         .with_html(r#"<button onclick="add(1, 2).then(alert)">Add</button>"#);
//!
//!     let session = WebviewSession::new(settings)?;
//!     session.bind("add", |req| {
//!         let (a, b): (i64, i64) = req.decode()?;
//!         Ok::<_, webview::Error>(a + b)
//!     })?;
//!     session.run()
//! }
//! ```
//!
//! ## System Requirements
//!
//! A shared build of the webview library (`libwebview.so`, `libwebview.dylib`
//! or `webview.dll`) must be on the loader path, or its full path set in
//! `WEBVIEW_LIBRARY_PATH`. On Linux it additionally needs GTK and WebKitGTK:
//!
//! ### Arch Linux / Artix
//! ```sh
//! pacman -S gtk3 webkit2gtk-4.1
//! ```
//!
//! ### Debian / Ubuntu
//! ```sh
//! apt install libgtk-3-dev libwebkit2gtk-4.1-dev
//! ```

pub mod bind;
pub mod callback;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod marshal;
pub mod protocol;
pub mod webview;

pub use bind::Responder;
pub use dispatch::Handle;
pub use engine::{version, Engine, NativeLibrary, Version, LIBRARY_PATH_ENV};
pub use error::{Error, Result};
pub use protocol::{Request, Response, Status};
pub use webview::{NativeHandleKind, SizeHint, Webview, WebviewSession, WebviewSettings};
