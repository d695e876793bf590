//! storerpc Common Types
//!
//! Shared protocol definitions for the storerpc client and server crates.
//!
//! # Overview
//!
//! storerpc binds a request/response procedure router into an HTTP server's
//! request lifecycle and exposes remote procedures to clients as reactive
//! load-state stores. This crate holds what both sides agree on:
//!
//! - **Paths**: [`ProcedurePath`] and the [`Mode`] selector (`$now` / `$later`)
//! - **Errors**: [`StoreRpcError`], [`ResolutionError`], and the
//!   [`ErrorCode`] / [`ProcedureError`] pair procedures fail with
//! - **Envelope**: JSON-RPC 2.0 request/response types
//! - **Transport**: HTTP helpers for building and parsing envelopes
//!
//! # Example
//!
//! ```
//! use storerpc_common::{JsonRpcRequest, ProcedurePath};
//! use serde_json::json;
//!
//! let path = ProcedurePath::parse("user.get");
//! let request = JsonRpcRequest::new(path.to_string(), vec![json!(42)]);
//! assert_eq!(request.method, "user.get");
//! ```

pub mod protocol;
pub mod transport;

pub use protocol::*;
