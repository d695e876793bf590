//! Request-lifecycle adapter.
//!
//! [`RpcHandler`] binds a [`Router`] into an HTTP server's request handling.
//! Its [`Hook`] inspects every request:
//!
//! - requests under the configured path prefix are resolved as procedure
//!   calls and answered with a JSON-RPC response
//! - every other request passes through untouched, optionally with a
//!   [`Caller`] installed in its locals so later handlers can call
//!   procedures in-process
//!
//! # Example
//!
//! ```
//! use storerpc_server::{HandlerOptions, RequestEvent, Router, RpcHandler};
//! use hyper::Method;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let router = Router::<()>::new()
//!     .procedure("system.ping", |_ctx, _args| async move { Ok(json!("pong")) });
//! let handler = RpcHandler::new(HandlerOptions::new("/rpc"));
//! let hook = handler.hook(router);
//!
//! let body = r#"{"jsonrpc":"2.0","method":"system.ping","params":[],"id":1}"#;
//! let url = "http://localhost/rpc/system.ping";
//! let mut event = RequestEvent::from_parts(Method::POST, url, body).unwrap();
//! let response = hook.handle(&mut event).await.unwrap();
//! assert_eq!(response.status(), 200);
//! # }
//! ```

use futures_util::future::BoxFuture;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode, Uri};
use serde_json::{json, Value};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use storerpc_common::protocol::{
    ErrorCode, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ProcedureError, ProcedurePath, Result,
    StoreRpcError,
};
use storerpc_common::transport::http::{HttpTransport, HyperResponse, APPLICATION_JSON};

use crate::event::{Pipe, RequestEvent, RequestInfo};
use crate::router::{Caller, Router};

pub const DEFAULT_LOCALS_KEY: &str = "rpc";

pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

type ContextFactory<C> =
    Arc<dyn Fn(RequestInfo, Option<Pipe>) -> BoxFuture<'static, C> + Send + Sync>;
type PipeHook = Arc<dyn Fn(RequestInfo, Pipe) -> BoxFuture<'static, ()> + Send + Sync>;
type ResolveErrorHook =
    Arc<dyn Fn(RequestInfo, Pipe) -> BoxFuture<'static, Option<String>> + Send + Sync>;
type BeforeResponseHook = Arc<
    dyn Fn(RequestInfo, Pipe, HandlerResult) -> BoxFuture<'static, HandlerResult> + Send + Sync,
>;

/// What the adapter installs in the locals of requests outside its prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LocalsMode {
    /// A ready [`Caller`], built with a fresh context per request.
    Always,
    /// A [`LazyCaller`] that builds the context only when asked.
    Callable,
    /// Nothing.
    #[default]
    Never,
}

/// The response the adapter is about to send, as seen by `before_response`.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerResult {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HandlerResult {
    fn json(status: StatusCode, body: Vec<u8>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        Self {
            status,
            headers,
            body: Bytes::from(body),
        }
    }

    fn from_jsonrpc(status: StatusCode, response: &JsonRpcResponse) -> Self {
        Self::json(status, serde_json::to_vec(response).unwrap_or_default())
    }

    /// Parses the body as JSON.
    pub fn json_body(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }

    pub fn into_response(self) -> HyperResponse {
        let mut response = Response::new(Full::new(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Adapter configuration.
///
/// Hooks are async and receive the request info and the request's [`Pipe`].
pub struct HandlerOptions<C> {
    /// URL path prefix handled as procedure calls, e.g. `/rpc`.
    pub path: String,
    /// Public origin rewritten by [`RpcHandler::handle_fetch`].
    pub origin: Option<String>,
    /// Internal origin requests to `origin` are redirected to.
    pub bypass_origin: Option<String>,
    pub locals: LocalsMode,
    pub locals_key: String,
    pub max_body_bytes: usize,
    context: ContextFactory<C>,
    before_resolve: Option<PipeHook>,
    resolve_error: Option<ResolveErrorHook>,
    before_response: Option<BeforeResponseHook>,
}

impl<C: Default + Send + 'static> HandlerOptions<C> {
    /// Options for `path` with a `C::default()` context.
    pub fn new(path: impl Into<String>) -> Self {
        Self::with_context(path, |_info, _pipe| async { C::default() })
    }
}

impl<C: Send + 'static> HandlerOptions<C> {
    /// Options for `path` with a context factory.
    ///
    /// The factory receives `Some(pipe)` while resolving a call and `None`
    /// when building a caller for locals or for [`ServerCaller`].
    pub fn with_context<F, Fut>(path: impl Into<String>, context: F) -> Self
    where
        F: Fn(RequestInfo, Option<Pipe>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = C> + Send + 'static,
    {
        Self {
            path: path.into(),
            origin: None,
            bypass_origin: None,
            locals: LocalsMode::default(),
            locals_key: DEFAULT_LOCALS_KEY.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            context: Arc::new(
                move |info: RequestInfo, pipe: Option<Pipe>| -> BoxFuture<'static, C> {
                    Box::pin(context(info, pipe))
                },
            ),
            before_resolve: None,
            resolve_error: None,
            before_response: None,
        }
    }

    pub fn context<F, Fut>(mut self, context: F) -> Self
    where
        F: Fn(RequestInfo, Option<Pipe>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = C> + Send + 'static,
    {
        self.context = Arc::new(
            move |info: RequestInfo, pipe: Option<Pipe>| -> BoxFuture<'static, C> {
                Box::pin(context(info, pipe))
            },
        );
        self
    }

    pub fn origin(mut self, origin: impl Into<String>, bypass_origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self.bypass_origin = Some(bypass_origin.into());
        self
    }

    pub fn locals(mut self, mode: LocalsMode) -> Self {
        self.locals = mode;
        self
    }

    pub fn locals_key(mut self, key: impl Into<String>) -> Self {
        self.locals_key = key.into();
        self
    }

    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Runs before anything else for requests under the prefix.
    pub fn before_resolve<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(RequestInfo, Pipe) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.before_resolve = Some(Arc::new(
            move |info: RequestInfo, pipe: Pipe| -> BoxFuture<'static, ()> {
                Box::pin(hook(info, pipe))
            },
        ));
        self
    }

    /// Returning a message rejects the request with a `BAD_REQUEST` before
    /// any procedure runs.
    pub fn resolve_error<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(RequestInfo, Pipe) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<String>> + Send + 'static,
    {
        self.resolve_error = Some(Arc::new(
            move |info: RequestInfo, pipe: Pipe| -> BoxFuture<'static, Option<String>> {
                Box::pin(hook(info, pipe))
            },
        ));
        self
    }

    /// Sees the final result and returns the one actually sent.
    pub fn before_response<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(RequestInfo, Pipe, HandlerResult) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.before_response = Some(Arc::new(
            move |info: RequestInfo,
                  pipe: Pipe,
                  result: HandlerResult|
                  -> BoxFuture<'static, HandlerResult> { Box::pin(hook(info, pipe, result)) },
        ));
        self
    }
}

impl<C> fmt::Debug for HandlerOptions<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerOptions")
            .field("path", &self.path)
            .field("origin", &self.origin)
            .field("bypass_origin", &self.bypass_origin)
            .field("locals", &self.locals)
            .field("locals_key", &self.locals_key)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("before_resolve", &self.before_resolve.is_some())
            .field("resolve_error", &self.resolve_error.is_some())
            .field("before_response", &self.before_response.is_some())
            .finish()
    }
}

/// The server-side adapter.
pub struct RpcHandler<C> {
    options: Arc<HandlerOptions<C>>,
    routes: RwLock<Option<Router<C>>>,
}

impl<C: Clone + Send + Sync + 'static> RpcHandler<C> {
    pub fn new(options: HandlerOptions<C>) -> Self {
        Self {
            options: Arc::new(options),
            routes: RwLock::new(None),
        }
    }

    pub fn options(&self) -> &HandlerOptions<C> {
        &self.options
    }

    /// Registers `router` as the final routes and returns the request hook.
    pub fn hook(&self, router: Router<C>) -> Hook<C> {
        self.set_routes(router.clone());
        tracing::debug!(
            prefix = %self.options.path,
            procedures = router.len(),
            "created request hook"
        );
        Hook {
            options: Arc::clone(&self.options),
            router,
        }
    }

    /// Registers the final routes without creating a hook.
    pub fn set_routes(&self, router: Router<C>) {
        *self.routes.write().unwrap_or_else(PoisonError::into_inner) = Some(router);
    }

    /// A factory for in-process callers.
    ///
    /// # Errors
    ///
    /// `MissingRoutes` when neither [`hook`](Self::hook) nor
    /// [`set_routes`](Self::set_routes) has been called.
    pub fn server_caller(&self) -> Result<ServerCaller<C>> {
        let router = self
            .routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(StoreRpcError::MissingRoutes)?;
        Ok(ServerCaller {
            router,
            context: Arc::clone(&self.options.context),
        })
    }

    /// A request rewriter that sends calls to the public origin straight to
    /// the internal one.
    ///
    /// # Errors
    ///
    /// `Configuration` unless both `origin` and `bypass_origin` are set.
    pub fn handle_fetch(&self) -> Result<FetchRewriter> {
        match (&self.options.origin, &self.options.bypass_origin) {
            (Some(origin), Some(bypass_origin)) => Ok(FetchRewriter {
                origin: origin.clone(),
                bypass_origin: bypass_origin.clone(),
            }),
            _ => Err(StoreRpcError::Configuration(
                "handle_fetch() needs both `origin` and `bypass_origin`".to_string(),
            )),
        }
    }

    /// A procedure error; `code` defaults to `BAD_REQUEST`.
    pub fn error(message: impl Into<String>, code: Option<ErrorCode>) -> ProcedureError {
        ProcedureError::new(code.unwrap_or(ErrorCode::BadRequest), message)
    }
}

impl<C> fmt::Debug for RpcHandler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcHandler")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Per-request entry point produced by [`RpcHandler::hook`].
pub struct Hook<C> {
    options: Arc<HandlerOptions<C>>,
    router: Router<C>,
}

impl<C> Clone for Hook<C> {
    fn clone(&self) -> Self {
        Self {
            options: Arc::clone(&self.options),
            router: self.router.clone(),
        }
    }
}

impl<C> fmt::Debug for Hook<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("path", &self.options.path)
            .field("router", &self.router)
            .finish()
    }
}

impl<C: Clone + Send + Sync + 'static> Hook<C> {
    pub fn max_body_bytes(&self) -> usize {
        self.options.max_body_bytes
    }

    pub fn prefix(&self) -> &str {
        &self.options.path
    }

    /// Handles one request.
    ///
    /// Returns `None` for requests outside the prefix; the caller should
    /// continue with its own handling.
    pub async fn handle(&self, event: &mut RequestEvent) -> Option<HyperResponse> {
        let suffix = self.suffix(event.info.path()).map(str::to_string);
        let Some(suffix) = suffix else {
            self.install_locals(event).await;
            return None;
        };
        let pipe = Pipe::new();

        if let Some(before_resolve) = &self.options.before_resolve {
            before_resolve(event.info.clone(), pipe.clone()).await;
        }

        let mut result = None;
        if let Some(resolve_error) = &self.options.resolve_error {
            if let Some(message) = resolve_error(event.info.clone(), pipe.clone()).await {
                tracing::debug!(path = %event.info.path(), "request rejected by resolve_error");
                let path = ProcedurePath::from_url_suffix(&suffix).to_string();
                result = Some(rejection(&message, &path));
            }
        }

        let mut result = match result {
            Some(result) => result,
            None => self.resolve(event, &suffix, &pipe).await,
        };

        if let Some(before_response) = &self.options.before_response {
            result = before_response(event.info.clone(), pipe, result).await;
        }

        Some(result.into_response())
    }

    /// The part of `path` after the prefix, if `path` is under it.
    fn suffix<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.options.path.as_str())?;
        if rest.is_empty() || rest.starts_with('/') || self.options.path.ends_with('/') {
            Some(rest.trim_start_matches('/'))
        } else {
            None
        }
    }

    async fn install_locals(&self, event: &mut RequestEvent) {
        let key = self.options.locals_key.clone();
        match self.options.locals {
            LocalsMode::Always => {
                let ctx = (self.options.context)(event.info.clone(), None).await;
                event.locals.insert(key, self.router.create_caller(ctx));
            }
            LocalsMode::Callable => {
                let lazy = LazyCaller {
                    router: self.router.clone(),
                    context: Arc::clone(&self.options.context),
                    info: event.info.clone(),
                };
                event.locals.insert(key, lazy);
            }
            LocalsMode::Never => {}
        }
    }

    async fn resolve(&self, event: &RequestEvent, suffix: &str, pipe: &Pipe) -> HandlerResult {
        let url_path = ProcedurePath::from_url_suffix(suffix).to_string();

        if event.info.method != Method::POST {
            let error = ProcedureError::new(
                ErrorCode::MethodNotSupported,
                format!("Unsupported method {}; use POST", event.info.method),
            );
            return failure(Value::Null, &error, &url_path);
        }

        if event.body.len() > self.options.max_body_bytes {
            let status = StatusCode::PAYLOAD_TOO_LARGE;
            let error = JsonRpcError::request_too_large(self.options.max_body_bytes);
            return HandlerResult::from_jsonrpc(status, &JsonRpcResponse::error(Value::Null, error));
        }

        let request: JsonRpcRequest = match HttpTransport::parse_jsonrpc(&event.body) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(
                    path = %event.info.path(),
                    "failed to parse JSON-RPC request: {}",
                    e
                );
                let error = JsonRpcError::parse_error().with_data(json!({
                    "code": ErrorCode::ParseError.as_str(),
                    "httpStatus": ErrorCode::ParseError.http_status(),
                    "path": url_path,
                }));
                let response = JsonRpcResponse::error(Value::Null, error);
                return HandlerResult::from_jsonrpc(StatusCode::BAD_REQUEST, &response);
            }
        };

        let path = if url_path.is_empty() {
            ProcedurePath::parse(&request.method).to_string()
        } else {
            url_path
        };
        if path.is_empty() {
            let error = JsonRpcError::invalid_request().with_data(json!({
                "code": ErrorCode::BadRequest.as_str(),
                "httpStatus": ErrorCode::BadRequest.http_status(),
                "path": path,
            }));
            let response = JsonRpcResponse::error(request.id, error);
            return HandlerResult::from_jsonrpc(StatusCode::BAD_REQUEST, &response);
        }

        let ctx = (self.options.context)(event.info.clone(), Some(pipe.clone())).await;
        match self.router.call(ctx, &path, request.args()).await {
            Ok(result) => HandlerResult::from_jsonrpc(
                StatusCode::OK,
                &JsonRpcResponse::success(request.id, result),
            ),
            Err(error) => {
                tracing::debug!(
                    path = %path,
                    code = %error.code,
                    "procedure failed: {}",
                    error.message
                );
                failure(request.id, &error, &path)
            }
        }
    }
}

fn status_for(code: ErrorCode) -> StatusCode {
    StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn failure(id: Value, error: &ProcedureError, path: &str) -> HandlerResult {
    HandlerResult::from_jsonrpc(
        status_for(error.code),
        &JsonRpcResponse::error(id, error.to_json_rpc(path)),
    )
}

/// The 400 answer for a request rejected by `resolve_error`.
fn rejection(message: &str, path: &str) -> HandlerResult {
    let error = ProcedureError::bad_request(message).to_json_rpc(path);
    let body = json!([{ "error": error }]);
    HandlerResult::json(StatusCode::BAD_REQUEST, serde_json::to_vec(&body).unwrap_or_default())
}

/// Builds a [`Caller`] on demand from the request it was installed for.
pub struct LazyCaller<C> {
    router: Router<C>,
    context: ContextFactory<C>,
    info: RequestInfo,
}

impl<C: Send + 'static> LazyCaller<C> {
    pub async fn caller(&self) -> Caller<C> {
        let ctx = (self.context)(self.info.clone(), None).await;
        self.router.create_caller(ctx)
    }
}

impl<C> fmt::Debug for LazyCaller<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyCaller")
            .field("router", &self.router)
            .field("path", &self.info.path())
            .finish()
    }
}

/// Builds in-process callers for arbitrary requests.
pub struct ServerCaller<C> {
    router: Router<C>,
    context: ContextFactory<C>,
}

impl<C: Send + 'static> ServerCaller<C> {
    pub async fn caller(&self, event: &RequestEvent) -> Caller<C> {
        let ctx = (self.context)(event.info.clone(), None).await;
        self.router.create_caller(ctx)
    }
}

impl<C> Clone for ServerCaller<C> {
    fn clone(&self) -> Self {
        Self {
            router: self.router.clone(),
            context: Arc::clone(&self.context),
        }
    }
}

impl<C> fmt::Debug for ServerCaller<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerCaller").field("router", &self.router).finish()
    }
}

/// Redirects requests for the public origin to the internal one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRewriter {
    origin: String,
    bypass_origin: String,
}

impl FetchRewriter {
    pub fn rewrite_url(&self, url: &str) -> String {
        match url.strip_prefix(self.origin.as_str()) {
            Some(rest) => format!("{}{}", self.bypass_origin, rest),
            None => url.to_string(),
        }
    }

    /// Rewrites the request URI; method, headers and body are kept.
    pub fn rewrite<B>(&self, mut request: Request<B>) -> Request<B> {
        let original = request.uri().to_string();
        let rewritten = self.rewrite_url(&original);
        if rewritten != original {
            match rewritten.parse::<Uri>() {
                Ok(uri) => *request.uri_mut() = uri,
                Err(e) => tracing::warn!(url = %rewritten, "not rewriting request: {}", e),
            }
        }
        request
    }
}
