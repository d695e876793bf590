//! storerpc Server
//!
//! Binds a procedure [`Router`] into an HTTP server's request lifecycle.
//!
//! - [`Router`]: dotted paths to async procedures taking a request context
//! - [`RpcHandler`]: the adapter; its [`Hook`] answers requests under a path
//!   prefix and installs in-process callers on the rest
//! - [`HttpServer`]: a hyper server loop driving a hook
//!
//! Clients reach the procedures with `storerpc_client::StoreClient::http`.

pub mod event;
pub mod handler;
pub mod http_server;
pub mod router;

pub use event::{Locals, Pipe, RequestEvent, RequestInfo};
pub use handler::{
    FetchRewriter, HandlerOptions, HandlerResult, Hook, LazyCaller, LocalsMode, RpcHandler,
    ServerCaller,
};
pub use http_server::HttpServer;
pub use router::{Caller, Router};
