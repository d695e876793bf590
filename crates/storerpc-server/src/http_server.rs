//! HTTP Server for storerpc
//!
//! A minimal hyper HTTP/1.1 server that drives a [`Hook`]. Requests the hook
//! does not handle get a JSON 404.
//!
//! # Architecture
//!
//! The server:
//! - Listens on a TCP socket for incoming HTTP connections
//! - Spawns a tokio task for each connection
//! - Reads each request body (bounded by the hook's `max_body_bytes`)
//! - Hands the request to the hook and sends back its response
//!
//! # Example
//!
//! ```no_run
//! use storerpc_server::{HandlerOptions, HttpServer, Router, RpcHandler};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let router = Router::<()>::new()
//!         .procedure("system.ping", |_ctx, _args| async move { Ok(json!("pong")) });
//!     let hook = RpcHandler::new(HandlerOptions::new("/rpc")).hook(router);
//!     let server = HttpServer::new(hook);
//!     server.run("127.0.0.1:8080".parse().unwrap()).await.unwrap();
//! }
//! ```

use http_body_util::{BodyExt, Limited};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::StatusCode;
use hyper_util::rt::TokioIo;
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpListener;

use storerpc_common::protocol::error::StoreRpcError;
use storerpc_common::protocol::JsonRpcError;
use storerpc_common::transport::{HttpTransport, HyperRequest, HyperResponse};

use crate::event::{RequestEvent, RequestInfo};
use crate::handler::Hook;

/// HTTP server serving a single [`Hook`].
pub struct HttpServer<C> {
    hook: Hook<C>,
}

impl<C: Clone + Send + Sync + 'static> HttpServer<C> {
    pub fn new(hook: Hook<C>) -> Self {
        Self { hook }
    }

    /// Binds `addr` and serves forever.
    pub async fn run(self, addr: SocketAddr) -> Result<(), StoreRpcError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| StoreRpcError::Transport(format!("Failed to bind to {}: {}", addr, e)))?;
        self.serve(listener).await
    }

    /// Serves connections accepted from an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), StoreRpcError> {
        tracing::info!(
            prefix = %self.hook.prefix(),
            "HTTP server listening on {}",
            listener
                .local_addr()
                .map_err(|e| {
                    StoreRpcError::Transport(format!("Failed to get local address: {}", e))
                })?
        );

        loop {
            let (stream, peer) = listener
                .accept()
                .await
                .map_err(|e| {
                    StoreRpcError::Transport(format!("Failed to accept connection: {}", e))
                })?;
            tracing::debug!(%peer, "accepted connection");

            let io = TokioIo::new(stream);
            let hook = self.hook.clone();

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let hook = hook.clone();
                    async move { Ok::<_, Infallible>(handle_request(&hook, req).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    tracing::error!("Error serving connection: {}", err);
                }
            });
        }
    }
}

/// Runs one request through `hook`.
pub async fn handle_request<C: Clone + Send + Sync + 'static>(
    hook: &Hook<C>,
    req: HyperRequest,
) -> HyperResponse {
    let (parts, body) = req.into_parts();
    let info = RequestInfo::new(parts.method, parts.uri, parts.headers);

    let limit = hook.max_body_bytes();
    let body = match Limited::new(body, limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            tracing::warn!(path = %info.path(), "rejecting request body: {}", e);
            return HttpTransport::to_http_error(
                json!(null),
                JsonRpcError::request_too_large(limit),
                StatusCode::PAYLOAD_TOO_LARGE,
            );
        }
    };

    let path = info.path().to_string();
    let mut event = RequestEvent::new(info, body);
    match hook.handle(&mut event).await {
        Some(response) => response,
        None => not_found(&path),
    }
}

fn not_found(path: &str) -> HyperResponse {
    HttpTransport::json_response(
        &json!({"error": "Not Found", "path": path}),
        StatusCode::NOT_FOUND,
    )
}
