//! String marshaling at the C ABI edge.
//!
//! Host strings are handed to the native library as NUL-terminated buffers
//! that only live for the duration of a single call. Strings coming back are
//! copied out immediately and never aliased.

use std::ffi::{c_char, CStr, CString};

use crate::{Error, Result};

/// Encode `text` as a NUL-terminated UTF-8 buffer.
///
/// # Errors
/// Returns [`Error::InteriorNul`] if `text` contains a NUL byte.
pub fn encode(text: &str) -> Result<CString> {
    CString::new(text).map_err(|e| Error::InteriorNul(e.nul_position()))
}

/// Encode `text`, dropping any NUL bytes instead of failing.
///
/// Used for text that has to reach the native side no matter what, such as
/// error messages in binding responses.
#[must_use]
pub fn encode_lossy(text: &str) -> CString {
    encode(text).unwrap_or_else(|_| {
        tracing::warn!("String contains interior NUL bytes, sanitizing ({} bytes)", text.len());
        let sanitized: String = text.chars().filter(|&c| c != '\0').collect();
        CString::new(sanitized).unwrap_or_default()
    })
}

/// Encode `text` and lend the buffer to `f` for one native call.
///
/// The pointer must not be retained past the call.
///
/// # Errors
/// Returns [`Error::InteriorNul`] if `text` contains a NUL byte.
pub fn with_c_str<T>(text: &str, f: impl FnOnce(*const c_char) -> T) -> Result<T> {
    let buffer = encode(text)?;
    Ok(f(buffer.as_ptr()))
}

/// Copy a NUL-terminated native buffer into an owned string.
///
/// Returns `None` for a null pointer. Invalid UTF-8 is replaced.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated buffer that stays valid
/// for the duration of this call.
#[allow(unsafe_code)]
#[must_use]
pub unsafe fn decode(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: non-null and NUL-terminated per the caller's contract.
    let c_str = unsafe { CStr::from_ptr(ptr) };
    Some(c_str.to_string_lossy().into_owned())
}
