//! Procedure Error Codes
//!
//! Named error codes a procedure can fail with. Each code maps to a JSON-RPC
//! error code (used in the response envelope) and to an HTTP status (used for
//! the response carrying it).
//!
//! | Code                    | JSON-RPC | HTTP |
//! |-------------------------|----------|------|
//! | `PARSE_ERROR`           | -32700   | 400  |
//! | `BAD_REQUEST`           | -32600   | 400  |
//! | `INTERNAL_SERVER_ERROR` | -32603   | 500  |
//! | `UNAUTHORIZED`          | -32001   | 401  |
//! | `FORBIDDEN`             | -32003   | 403  |
//! | `NOT_FOUND`             | -32004   | 404  |
//! | `METHOD_NOT_SUPPORTED`  | -32005   | 405  |
//! | `TIMEOUT`               | -32008   | 408  |
//! | `CONFLICT`              | -32009   | 409  |
//! | `PRECONDITION_FAILED`   | -32012   | 412  |
//! | `PAYLOAD_TOO_LARGE`     | -32013   | 413  |
//! | `TOO_MANY_REQUESTS`     | -32029   | 429  |
//! | `CLIENT_CLOSED_REQUEST` | -32099   | 499  |

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use thiserror::Error;

use super::jsonrpc::JsonRpcError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ParseError,
    BadRequest,
    InternalServerError,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotSupported,
    Timeout,
    Conflict,
    PreconditionFailed,
    PayloadTooLarge,
    TooManyRequests,
    ClientClosedRequest,
}

impl ErrorCode {
    pub fn json_rpc_code(self) -> i32 {
        match self {
            ErrorCode::ParseError => -32700,
            ErrorCode::BadRequest => -32600,
            ErrorCode::InternalServerError => -32603,
            ErrorCode::Unauthorized => -32001,
            ErrorCode::Forbidden => -32003,
            ErrorCode::NotFound => -32004,
            ErrorCode::MethodNotSupported => -32005,
            ErrorCode::Timeout => -32008,
            ErrorCode::Conflict => -32009,
            ErrorCode::PreconditionFailed => -32012,
            ErrorCode::PayloadTooLarge => -32013,
            ErrorCode::TooManyRequests => -32029,
            ErrorCode::ClientClosedRequest => -32099,
        }
    }

    pub fn http_status(self) -> u16 {
        match self {
            ErrorCode::ParseError | ErrorCode::BadRequest => 400,
            ErrorCode::InternalServerError => 500,
            ErrorCode::Unauthorized => 401,
            ErrorCode::Forbidden => 403,
            ErrorCode::NotFound => 404,
            ErrorCode::MethodNotSupported => 405,
            ErrorCode::Timeout => 408,
            ErrorCode::Conflict => 409,
            ErrorCode::PreconditionFailed => 412,
            ErrorCode::PayloadTooLarge => 413,
            ErrorCode::TooManyRequests => 429,
            ErrorCode::ClientClosedRequest => 499,
        }
    }

    /// The wire name, e.g. `"BAD_REQUEST"`.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ParseError => "PARSE_ERROR",
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::InternalServerError => "INTERNAL_SERVER_ERROR",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::MethodNotSupported => "METHOD_NOT_SUPPORTED",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::PreconditionFailed => "PRECONDITION_FAILED",
            ErrorCode::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ErrorCode::TooManyRequests => "TOO_MANY_REQUESTS",
            ErrorCode::ClientClosedRequest => "CLIENT_CLOSED_REQUEST",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error raised by a server-side procedure.
///
/// Procedures return this from their handlers; the server adapter turns it
/// into a JSON-RPC error object whose `data` carries the code name, the HTTP
/// status and the procedure path.
///
/// # Example
///
/// ```
/// use storerpc_common::protocol::{ErrorCode, ProcedureError};
///
/// let err = ProcedureError::new(ErrorCode::NotFound, "no such user");
/// let wire = err.to_json_rpc("user.get");
/// assert_eq!(wire.code, -32004);
/// assert_eq!(wire.data.unwrap()["httpStatus"], 404);
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ProcedureError {
    pub code: ErrorCode,
    pub message: String,
}

impl ProcedureError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalServerError, message)
    }

    /// Converts into a JSON-RPC error object for the given procedure path.
    pub fn to_json_rpc(&self, path: &str) -> JsonRpcError {
        JsonRpcError {
            code: self.code.json_rpc_code(),
            message: self.message.clone(),
            data: None,
        }
        .with_data(json!({
            "code": self.code.as_str(),
            "httpStatus": self.code.http_status(),
            "path": path,
        }))
    }
}
