//! HTTP Transport Utilities
//!
//! Conversion between HTTP messages and the JSON-RPC envelope, shared by the
//! server adapter and the client's HTTP link.
//!
//! # Components
//!
//! - **[`HttpTransport`]**: Utility functions for HTTP/JSON-RPC conversion
//! - **[`HyperRequest`]**: Type alias for Hyper incoming requests
//! - **[`HyperResponse`]**: Type alias for Hyper responses
//!
//! # Example
//!
//! ```
//! use storerpc_common::transport::http::HttpTransport;
//! use storerpc_common::protocol::JsonRpcResponse;
//! use hyper::StatusCode;
//! use serde_json::json;
//!
//! let jsonrpc_response = JsonRpcResponse::success(json!(1), json!({"id": 42}));
//! let http_response = HttpTransport::to_http_response(&jsonrpc_response, StatusCode::OK);
//! assert_eq!(http_response.status(), StatusCode::OK);
//! ```

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode};
use serde::Serialize;

use crate::protocol::error::StoreRpcError;
use crate::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};

/// Type alias for Hyper incoming requests
pub type HyperRequest = Request<Incoming>;

/// Type alias for Hyper responses with full body
pub type HyperResponse = Response<Full<Bytes>>;

pub const APPLICATION_JSON: &str = "application/json";

/// HTTP transport utility functions
pub struct HttpTransport;

impl HttpTransport {
    /// Parse a JSON-RPC request from an HTTP body
    ///
    /// # Example
    ///
    /// ```
    /// use storerpc_common::transport::http::HttpTransport;
    ///
    /// let body = br#"{"jsonrpc":"2.0","method":"user.get","params":[42],"id":1}"#;
    /// let request = HttpTransport::parse_jsonrpc(body).unwrap();
    /// assert_eq!(request.method, "user.get");
    /// ```
    pub fn parse_jsonrpc(body: &[u8]) -> Result<JsonRpcRequest, StoreRpcError> {
        serde_json::from_slice(body).map_err(StoreRpcError::JsonSerialization)
    }

    /// Parse a JSON-RPC response from an HTTP body
    pub fn parse_jsonrpc_response(body: &[u8]) -> Result<JsonRpcResponse, StoreRpcError> {
        serde_json::from_slice(body).map_err(|e| {
            StoreRpcError::InvalidResponse(format!("malformed JSON-RPC response: {}", e))
        })
    }

    /// Serialize any value into a JSON HTTP response with the given status
    pub fn json_response<T: Serialize>(value: &T, status: StatusCode) -> HyperResponse {
        let body = serde_json::to_vec(value).unwrap_or_default();

        let mut response = Response::new(Full::new(Bytes::from(body)));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        response
    }

    /// Create an HTTP response from a JSON-RPC response
    pub fn to_http_response(jsonrpc: &JsonRpcResponse, status: StatusCode) -> HyperResponse {
        Self::json_response(jsonrpc, status)
    }

    /// Create an HTTP error response from a JSON-RPC error
    pub fn to_http_error(
        id: serde_json::Value,
        error: JsonRpcError,
        status: StatusCode,
    ) -> HyperResponse {
        Self::to_http_response(&JsonRpcResponse::error(id, error), status)
    }

    /// Build the JSON body for a request to `method` with positional `args`
    pub fn build_request_body(
        method: &str,
        args: Vec<serde_json::Value>,
    ) -> Result<(JsonRpcRequest, Bytes), StoreRpcError> {
        let request = JsonRpcRequest::new(method, args);
        let body = serde_json::to_vec(&request)?;
        Ok((request, Bytes::from(body)))
    }
}
