//! JSON-RPC over HTTP link.
//!
//! Every call is a `POST <url>/<dotted.path>` whose body is a JSON-RPC 2.0
//! request with positional params. Transport failures and JSON-RPC error
//! objects both become the operation's error value, shaped like a JSON-RPC
//! error object so consumers can match on `code`.

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::{Method, Request, StatusCode};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::Deserialize;
use serde_json::Value;

use storerpc_common::protocol::{JsonRpcError, ProcedurePath, Result, StoreRpcError};
use storerpc_common::transport::http::{HttpTransport, APPLICATION_JSON};

use crate::dispatcher::{Link, OperationFuture};

/// A [`Link`] that forwards procedures to a storerpc HTTP endpoint.
///
/// Creates no connection until the first call; the underlying client pools
/// connections across calls and clones.
#[derive(Clone, Debug)]
pub struct HttpLink {
    base_url: String,
    headers: HeaderMap,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HttpLink {
    /// Creates a link targeting `url` (e.g. `http://127.0.0.1:8080/rpc`).
    ///
    /// # Errors
    ///
    /// `Configuration` when the URL is not an `http://` URL.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        if !url.starts_with("http://") {
            return Err(StoreRpcError::Configuration(format!(
                "unsupported link URL `{}`: only http:// is supported",
                url
            )));
        }
        // Reject URLs hyper cannot parse now rather than on every call.
        url.parse::<hyper::Uri>()?;

        Ok(Self {
            base_url: url.trim_end_matches('/').to_string(),
            headers: HeaderMap::new(),
            client: Client::builder(TokioExecutor::new()).build_http(),
        })
    }

    /// Adds a header sent with every request.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| {
                StoreRpcError::Configuration(format!("invalid header name `{}`: {}", name, e))
            })?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| StoreRpcError::Configuration(format!("invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The URL a procedure is posted to.
    pub fn url_for(&self, path: &ProcedurePath) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Calls `path` with positional `args`.
    ///
    /// The error value is a serialized [`JsonRpcError`].
    pub async fn send(
        &self,
        path: &ProcedurePath,
        args: Vec<Value>,
    ) -> std::result::Result<Value, Value> {
        match self.round_trip(path, args).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(error)) => Err(error_value(error)),
            Err(e) => {
                tracing::debug!(path = %path, "link call failed: {}", e);
                Err(error_value(JsonRpcError::internal_error(&e.to_string())))
            }
        }
    }

    async fn round_trip(
        &self,
        path: &ProcedurePath,
        args: Vec<Value>,
    ) -> Result<std::result::Result<Value, JsonRpcError>> {
        let (_request, body) = HttpTransport::build_request_body(&path.to_string(), args)?;

        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(self.url_for(path))
            .header(CONTENT_TYPE, APPLICATION_JSON);
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        let request = builder.body(Full::new(body))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| StoreRpcError::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| StoreRpcError::Transport(format!("Failed to read response: {}", e)))?
            .to_bytes();

        match HttpTransport::parse_jsonrpc_response(&bytes) {
            Ok(response) => Ok(response.into_result()),
            Err(e) => {
                // Requests rejected before resolution carry `[{"error": ..}]`.
                if let Ok(rejections) = serde_json::from_slice::<Vec<Rejection>>(&bytes) {
                    if let Some(rejection) = rejections.into_iter().next() {
                        return Ok(Err(rejection.error));
                    }
                }
                if status != StatusCode::OK {
                    return Err(StoreRpcError::Transport(format!(
                        "HTTP {} from {}",
                        status,
                        self.url_for(path)
                    )));
                }
                Err(e)
            }
        }
    }
}

#[derive(Deserialize)]
struct Rejection {
    error: JsonRpcError,
}

impl Link for HttpLink {
    fn call(&self, path: ProcedurePath, args: Vec<Value>) -> OperationFuture {
        let link = self.clone();
        Box::pin(async move { link.send(&path, args).await })
    }
}

fn error_value(error: JsonRpcError) -> Value {
    serde_json::to_value(&error).unwrap_or_else(|_| Value::String(error.message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_non_http_urls() {
        assert!(matches!(
            HttpLink::new("https://example.com"),
            Err(StoreRpcError::Configuration(_))
        ));
        assert!(matches!(
            HttpLink::new("127.0.0.1:8080"),
            Err(StoreRpcError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_url_for_joins_dotted_path() {
        let link = HttpLink::new("http://127.0.0.1:8080/rpc/").unwrap();
        assert_eq!(link.base_url(), "http://127.0.0.1:8080/rpc");
        assert_eq!(
            link.url_for(&ProcedurePath::parse("user.get")),
            "http://127.0.0.1:8080/rpc/user.get"
        );
    }

    #[tokio::test]
    async fn test_with_header_validates() {
        let link = HttpLink::new("http://127.0.0.1:8080").unwrap();
        assert!(link.clone().with_header("x-token", "abc").is_ok());
        assert!(link.with_header("bad header", "abc").is_err());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_error_value() {
        // Port 1 on loopback refuses connections.
        let link = HttpLink::new("http://127.0.0.1:1").unwrap();
        let error = link
            .send(&ProcedurePath::parse("user.get"), vec![])
            .await
            .unwrap_err();
        assert_eq!(
            error["code"],
            serde_json::json!(storerpc_common::protocol::jsonrpc::INTERNAL_ERROR)
        );
    }
}
