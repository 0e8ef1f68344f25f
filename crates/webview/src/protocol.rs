//! The JSON contract between bound host functions and script code.
//!
//! When script code calls a bound function the native engine hands over a
//! request id and the call arguments as a JSON array. The host answers with
//! `webview_return`: status `0` and a JSON payload on success, status `1` and
//! a plain-text message on failure. Error messages are not
//! JSON-encoded; the native side passes them to the promise rejection as-is.

use std::ffi::c_int;
use std::fmt::Display;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::{Error, Result};

/// The result of handling a request: a JSON value or an error message.
pub type Outcome = std::result::Result<Value, String>;

/// A call from script code to a bound function.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    id: String,
    name: String,
    args: Vec<Value>,
}

impl Request {
    /// Parse the raw arguments the native engine passed for `name`.
    ///
    /// # Errors
    /// Returns [`Error::Decode`] if `args_json` is not a JSON array.
    pub fn parse(id: impl Into<String>, name: impl Into<String>, args_json: &str) -> Result<Self> {
        let args: Vec<Value> = serde_json::from_str(args_json)?;
        Ok(Self {
            id: id.into(),
            name: name.into(),
            args,
        })
    }

    /// Append arguments fixed at bind time after the ones from script code.
    #[must_use]
    pub fn with_bound_args(mut self, bound: &[Value]) -> Self {
        self.args.extend_from_slice(bound);
        self
    }

    /// Opaque id the response has to be sent back with.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Name the function was bound under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    #[must_use]
    pub fn into_args(self) -> Vec<Value> {
        self.args
    }

    /// Deserialize the argument array into `T`, typically a tuple.
    ///
    /// ```rust,ignore
    /// let (a, b): (i64, i64) = request.decode()?;
    /// ```
    ///
    /// # Errors
    /// Returns [`Error::Decode`] if the arguments do not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Array(self.args.clone()))?)
    }
}

/// Status code of a [`Response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
}

impl Status {
    /// The integer passed to `webview_return`.
    #[must_use]
    pub fn code(self) -> c_int {
        match self {
            Self::Ok => webview_sys::WEBVIEW_RETURN_OK,
            Self::Error => webview_sys::WEBVIEW_RETURN_ERROR,
        }
    }
}

/// The answer to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub id: String,
    pub status: Status,
    /// JSON for [`Status::Ok`], plain text for [`Status::Error`].
    pub payload: String,
}

impl Response {
    /// A success response carrying `value` as JSON.
    #[must_use]
    pub fn ok(id: impl Into<String>, value: &Value) -> Self {
        Self {
            id: id.into(),
            status: Status::Ok,
            payload: value.to_string(),
        }
    }

    /// A failure response carrying `message` verbatim.
    #[must_use]
    pub fn error(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: Status::Error,
            payload: message.into(),
        }
    }

    #[must_use]
    pub fn from_outcome(id: impl Into<String>, outcome: Outcome) -> Self {
        match outcome {
            Ok(value) => Self::ok(id, &value),
            Err(message) => Self::error(id, message),
        }
    }
}

/// Encode a handler result as JSON. `()` and `None` become `null`.
///
/// # Errors
/// Returns [`Error::Encode`] if `value` cannot be represented as JSON.
pub fn encode_result<R: Serialize>(value: &R) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::Encode(e.to_string()))
}

/// Convert a handler's return value into an [`Outcome`].
pub fn outcome<R: Serialize, E: Display>(result: std::result::Result<R, E>) -> Outcome {
    match result {
        Ok(value) => encode_result(&value).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_request_parse() {
        let req = Request::parse("1", "add", r#"[1, "x", {"k": true}]"#).unwrap();
        assert_eq!(req.id(), "1");
        assert_eq!(req.name(), "add");
        assert_eq!(req.args(), &[json!(1), json!("x"), json!({"k": true})]);
    }

    #[test]
    fn test_request_parse_empty_array() {
        let req = Request::parse("1", "noop", "[]").unwrap();
        assert!(req.args().is_empty());
    }

    #[test]
    fn test_request_parse_malformed() {
        let err = Request::parse("1", "f", "[1,").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_request_parse_rejects_non_array() {
        let err = Request::parse("1", "f", r#"{"a":1}"#).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_request_bound_args_come_last() {
        let req = Request::parse("1", "f", r#"["a"]"#)
            .unwrap()
            .with_bound_args(&[json!("b"), json!(2)]);
        assert_eq!(req.into_args(), vec![json!("a"), json!("b"), json!(2)]);
    }

    #[test]
    fn test_request_decode_tuple() {
        let req = Request::parse("1", "f", r#"[3, "four"]"#).unwrap();
        let (n, s): (i64, String) = req.decode().unwrap();
        assert_eq!(n, 3);
        assert_eq!(s, "four");
    }

    #[test]
    fn test_request_decode_mismatch() {
        let req = Request::parse("1", "f", r#"["not a number"]"#).unwrap();
        assert!(req.decode::<(i64,)>().is_err());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Status::Ok.code(), 0);
        assert_eq!(Status::Error.code(), 1);
    }

    #[test]
    fn test_result_round_trip_is_byte_identical() {
        let req = Request::parse("7", "f", r#"[1,"x",{"k":true}]"#).unwrap();
        assert_eq!(req.args().len(), 3);
        let value = encode_result(&json!({"ok": 1})).unwrap();
        let response = Response::ok(req.id(), &value);
        assert_eq!(response.payload, r#"{"ok":1}"#);
    }

    #[test]
    fn test_unit_result_is_null() {
        let response = Response::from_outcome("1", outcome::<(), String>(Ok(())));
        assert_eq!(response.status, Status::Ok);
        assert_eq!(response.payload, "null");
    }

    #[test]
    fn test_none_result_is_null() {
        let response = Response::from_outcome("1", outcome::<Option<i32>, String>(Ok(None)));
        assert_eq!(response.payload, "null");
    }

    #[test]
    fn test_error_payload_is_plain_text() {
        let response = Response::from_outcome("1", outcome::<(), _>(Err("boom")));
        assert_eq!(response.status, Status::Error);
        assert_eq!(response.payload, "boom");
    }

    #[test]
    fn test_string_result_is_json_encoded() {
        let response = Response::from_outcome("1", outcome::<_, String>(Ok("hi")));
        assert_eq!(response.payload, r#""hi""#);
    }

    #[test]
    fn test_unencodable_result_is_error() {
        let mut map = HashMap::new();
        map.insert((1, 2), "tuple keys are not valid JSON object keys");
        let response = Response::from_outcome("1", outcome::<_, String>(Ok(map)));
        assert_eq!(response.status, Status::Error);
        assert!(response.payload.starts_with("Failed to encode binding result"));
    }
}
