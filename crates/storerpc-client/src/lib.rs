//! storerpc Store Client
//!
//! Exposes remote procedures as reactive load-state stores.
//!
//! A procedure is addressed by a path ending in a mode selector:
//!
//! - `user.get.$now` calls `user.get` immediately and returns a store that
//!   moves from `Loading` to `Success` or `Failure` exactly once
//! - `user.get.$later` returns a store holding a `call` trigger; each
//!   trigger starts a new call and overwrites the store when it settles
//!
//! Paths are resolved against a [`Dispatcher`] root: a tree of in-process
//! operations, or a [`Link`] such as [`HttpLink`] that forwards every path
//! to a storerpc server.
//!
//! # Example
//!
//! ```no_run
//! use storerpc_client::{ClientOptions, StoreClient};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> storerpc_common::Result<()> {
//! let client = StoreClient::http(ClientOptions::new().url("http://127.0.0.1:8080/rpc"))?;
//!
//! let store = client.path("user.get").now(vec![json!(42)])?;
//! let _sub = store.subscribe(|state| println!("{}", serde_json::to_string(state).unwrap()));
//! store.wait_for(|s| s.is_settled()).await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod container;
pub mod dispatcher;
pub mod interceptor;
pub mod link;
pub mod proxy;
pub mod state;
pub mod store;

pub use client::{ClientOptions, Procedure, StoreClient};
pub use container::RacePolicy;
pub use dispatcher::{Dispatcher, Link, Namespace, RemoteOperation};
pub use interceptor::Interceptors;
pub use link::HttpLink;
pub use proxy::{Invocation, PathProxy, PropertyKey};
pub use state::{CallResult, LaterState, LaterStore, NowStore, Trigger};
pub use store::{Store, Subscription};
