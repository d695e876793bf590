//! storerpc Transport Helpers
//!
//! HTTP is the only transport: the client's link posts a JSON-RPC envelope
//! to `<url>/<procedure.path>` and the server adapter answers with a JSON-RPC
//! envelope whose HTTP status reflects the error code.

pub mod http;

pub use http::{HttpTransport, HyperRequest, HyperResponse};
