//! Dynamic path accumulation.
//!
//! A [`PathProxy`] records segments as they are accessed and only resolves
//! them against the dispatcher root when called. Building a path never fails;
//! calling one may.
//!
//! ```
//! use storerpc_client::{Namespace, StoreClient, ClientOptions};
//! use serde_json::{json, Value};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let users = Namespace::new().operation("get", |args: Vec<Value>| async move {
//!     Ok(json!({"id": args[0], "name": "x"}))
//! });
//! let root = Namespace::new().nest("user", users);
//! let client = StoreClient::new(root, ClientOptions::default());
//!
//! let invocation = client.root().at("user").at("get").at("$now").call(vec![json!(42)]).unwrap();
//! let store = invocation.into_now().unwrap();
//! let state = store.wait_for(|s| s.is_settled()).await;
//! assert_eq!(state.response(), Some(&json!({"id": 42, "name": "x"})));
//! # }
//! ```

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use storerpc_common::protocol::{Mode, ProcedurePath, ResolutionError};

use crate::client::ClientCore;
use crate::container::{self, Endpoint};
use crate::state::{LaterStore, NowStore};

/// A key used to access a proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyKey {
    /// An ordinary segment name.
    Name(String),
    /// An introspection key (for example `"then"` probing or a debugger's
    /// type tag). Never extends the path.
    Symbol(&'static str),
}

impl From<&str> for PropertyKey {
    fn from(name: &str) -> Self {
        PropertyKey::Name(name.to_string())
    }
}

impl From<String> for PropertyKey {
    fn from(name: String) -> Self {
        PropertyKey::Name(name)
    }
}

/// The store produced by calling a proxy, tagged by mode.
#[derive(Debug, Clone)]
pub enum Invocation {
    Now(NowStore),
    Later(LaterStore),
}

impl Invocation {
    pub fn mode(&self) -> Mode {
        match self {
            Invocation::Now(_) => Mode::Now,
            Invocation::Later(_) => Mode::Later,
        }
    }

    pub fn into_now(self) -> Option<NowStore> {
        match self {
            Invocation::Now(store) => Some(store),
            Invocation::Later(_) => None,
        }
    }

    pub fn into_later(self) -> Option<LaterStore> {
        match self {
            Invocation::Later(store) => Some(store),
            Invocation::Now(_) => None,
        }
    }
}

/// An endpoint path under construction.
///
/// Proxies are immutable: [`PathProxy::at`] returns a new proxy and leaves
/// the receiver untouched, so a prefix can be shared and extended freely.
#[derive(Clone)]
pub struct PathProxy {
    core: Arc<ClientCore>,
    path: ProcedurePath,
}

impl PathProxy {
    pub(crate) fn new(core: Arc<ClientCore>, path: ProcedurePath) -> Self {
        Self { core, path }
    }

    /// Returns a proxy with `segment` appended.
    pub fn at(&self, segment: impl Into<String>) -> PathProxy {
        Self::new(Arc::clone(&self.core), self.path.join(segment))
    }

    /// Property-style access; symbols yield `None`.
    pub fn get(&self, key: impl Into<PropertyKey>) -> Option<PathProxy> {
        match key.into() {
            PropertyKey::Name(name) => Some(self.at(name)),
            PropertyKey::Symbol(_) => None,
        }
    }

    /// Segments accumulated so far, mode selector included.
    pub fn path(&self) -> &ProcedurePath {
        &self.path
    }

    /// Resolves the accumulated path and invokes it.
    ///
    /// The last segment must be a mode selector. `$now` starts the call with
    /// `args` right away; `$later` ignores `args` and returns a store whose
    /// trigger takes the arguments of each call.
    pub fn call(&self, args: Vec<Value>) -> Result<Invocation, ResolutionError> {
        let (mode, procedure) = self.split_mode()?;
        let endpoint = self.core.endpoint(&procedure)?;
        tracing::debug!(path = %procedure, mode = %mode, "calling through proxy");

        Ok(match mode {
            Mode::Now => Invocation::Now(now_store(endpoint.as_ref(), args)),
            Mode::Later => Invocation::Later(later_store(endpoint.as_ref())),
        })
    }

    /// Shorthand for `self.at("$now").call(args)`.
    pub fn now(&self, args: Vec<Value>) -> Result<NowStore, ResolutionError> {
        let endpoint = self.core.endpoint(&self.path)?;
        Ok(now_store(endpoint.as_ref(), args))
    }

    /// Shorthand for `self.at("$later").call(vec![])`.
    pub fn later(&self) -> Result<LaterStore, ResolutionError> {
        let endpoint = self.core.endpoint(&self.path)?;
        Ok(later_store(endpoint.as_ref()))
    }

    fn split_mode(&self) -> Result<(Mode, ProcedurePath), ResolutionError> {
        let (last, procedure) = self
            .path
            .split_last()
            .ok_or_else(|| ResolutionError::UnknownMode(String::new()))?;
        Ok((last.parse()?, procedure))
    }
}

fn now_store(endpoint: Option<&Endpoint>, args: Vec<Value>) -> NowStore {
    match endpoint {
        Some(endpoint) => container::now(endpoint, &args),
        None => container::inert_now(),
    }
}

fn later_store(endpoint: Option<&Endpoint>) -> LaterStore {
    match endpoint {
        Some(endpoint) => container::later(endpoint),
        None => container::inert_later(),
    }
}

impl fmt::Debug for PathProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PathProxy").field(&self.path.to_string()).finish()
    }
}

impl fmt::Display for PathProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.path.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientOptions, StoreClient};
    use crate::dispatcher::Namespace;
    use crate::state::CallResult;
    use serde_json::json;

    fn client() -> StoreClient {
        let root = Namespace::new().nest(
            "user",
            Namespace::new()
                .operation("get", |args: Vec<Value>| async move {
                    Ok(json!({"id": args[0], "name": "x"}))
                })
                .operation("fail", |_args: Vec<Value>| async move { Err(json!("not found")) }),
        );
        StoreClient::new(root, ClientOptions::default())
    }

    #[test]
    fn test_at_does_not_mutate_receiver() {
        let client = client();
        let user = client.root().at("user");
        let get = user.at("get");
        assert_eq!(user.path().to_string(), "user");
        assert_eq!(get.path().to_string(), "user.get");
    }

    #[test]
    fn test_symbol_access_is_inert() {
        let client = client();
        let user = client.root().at("user");
        assert!(user.get(PropertyKey::Symbol("then")).is_none());
        assert_eq!(user.get("get").unwrap().path().to_string(), "user.get");
        assert_eq!(user.path().to_string(), "user");
    }

    #[tokio::test]
    async fn test_now_success() {
        let store = client()
            .path("user.get.$now")
            .call(vec![json!(42)])
            .unwrap()
            .into_now()
            .unwrap();
        assert_eq!(store.get(), CallResult::Loading);
        let state = store.wait_for(|s| s.is_settled()).await;
        assert_eq!(state, CallResult::Success(json!({"id": 42, "name": "x"})));
    }

    #[tokio::test]
    async fn test_now_failure() {
        let store = client().path("user.fail").now(vec![]).unwrap();
        let state = store.wait_for(|s| s.is_settled()).await;
        assert_eq!(state, CallResult::Failure(json!("not found")));
    }

    #[tokio::test]
    async fn test_same_path_twice_gives_independent_stores() {
        let proxy = client().path("user.get");
        let a = proxy.later().unwrap();
        let b = proxy.later().unwrap();
        assert!(!a.ptr_eq(&b));

        a.get().call(vec![json!(1)]);
        let state = a.wait_for(|s| s.is_settled()).await;
        assert_eq!(state.response(), Some(&json!({"id": 1, "name": "x"})));
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert!(b.get().is_loading());
        assert_eq!(b.writes(), 0);
    }

    #[test]
    fn test_too_short_path_fails_at_call_time() {
        let proxy = client().root().at("get").at("$now");
        assert_eq!(proxy.path().to_string(), "get.$now");
        assert_eq!(
            proxy.call(vec![]).unwrap_err(),
            ResolutionError::TooShort {
                path: "get".into(),
                segments: 1
            }
        );
    }

    #[test]
    fn test_unknown_mode() {
        let err = client().path("user.get").call(vec![]).unwrap_err();
        assert_eq!(err, ResolutionError::UnknownMode("get".into()));

        let err = client().root().call(vec![]).unwrap_err();
        assert_eq!(err, ResolutionError::UnknownMode(String::new()));
    }

    #[tokio::test]
    async fn test_later_mode_returns_untriggered_store() {
        let invocation = client().path("user.get.$later").call(vec![json!(1)]).unwrap();
        assert_eq!(invocation.mode(), Mode::Later);
        let store = invocation.into_later().unwrap();
        assert!(store.get().is_loading());
        assert_eq!(store.writes(), 0);

        store.get().call(vec![json!(5)]);
        let state = store.wait_for(|s| s.is_settled()).await;
        assert_eq!(state.response(), Some(&json!({"id": 5, "name": "x"})));
    }
}
