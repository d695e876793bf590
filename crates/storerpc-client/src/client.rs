//! The client entry point.
//!
//! A [`StoreClient`] owns the dispatcher root and its options, and turns
//! procedure paths into `$now` and `$later` stores.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use storerpc_common::protocol::{ProcedurePath, ResolutionError, Result, StoreRpcError};

use crate::container::{self, Endpoint, RacePolicy};
use crate::dispatcher::Dispatcher;
use crate::interceptor::Interceptors;
use crate::link::HttpLink;
use crate::proxy::PathProxy;
use crate::state::{LaterStore, NowStore};

/// Client configuration.
///
/// `url` and `headers` are only used by [`StoreClient::http`].
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub url: Option<String>,
    pub interceptors: Interceptors,
    pub race_policy: RacePolicy,
    pub headers: Vec<(String, String)>,
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn interceptors(mut self, interceptors: Interceptors) -> Self {
        self.interceptors = interceptors;
        self
    }

    pub fn race_policy(mut self, race_policy: RacePolicy) -> Self {
        self.race_policy = race_policy;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Shared state behind every proxy and procedure handle of one client.
pub(crate) struct ClientCore {
    /// `None` for the inert client.
    root: Option<Dispatcher>,
    interceptors: Interceptors,
    race_policy: RacePolicy,
}

impl ClientCore {
    /// Resolves `path` (mode already stripped).
    ///
    /// The inert client accepts any path long enough to name a method and
    /// returns `None`.
    pub(crate) fn endpoint(
        &self,
        path: &ProcedurePath,
    ) -> std::result::Result<Option<Endpoint>, ResolutionError> {
        match &self.root {
            Some(root) => {
                let operation = root.resolve(path)?;
                Ok(Some(Endpoint::new(
                    operation,
                    self.interceptors.clone(),
                    self.race_policy,
                )))
            }
            None if path.len() < 2 => Err(ResolutionError::TooShort {
                path: path.to_string(),
                segments: path.len(),
            }),
            None => Ok(None),
        }
    }
}

/// Entry point: exposes a dispatcher root as reactive stores.
///
/// # Example
///
/// ```
/// use storerpc_client::{ClientOptions, Namespace, StoreClient};
/// use serde::Deserialize;
/// use serde_json::{json, Value};
///
/// #[derive(Debug, Clone, PartialEq, Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let users = Namespace::new().operation("get", |args: Vec<Value>| async move {
///     Ok(json!({"id": args[0], "name": "x"}))
/// });
/// let root = Namespace::new().nest("user", users);
/// let client = StoreClient::new(root, ClientOptions::default());
///
/// let get_user = client.procedure::<(u64,), User>("user.get").unwrap();
/// let store = get_user.now((42,));
/// let state = store.wait_for(|s| s.is_settled()).await;
/// assert_eq!(state.response(), Some(&User { id: 42, name: "x".into() }));
/// # }
/// ```
#[derive(Clone)]
pub struct StoreClient {
    core: Arc<ClientCore>,
}

impl StoreClient {
    pub fn new(root: impl Into<Dispatcher>, options: ClientOptions) -> Self {
        Self {
            core: Arc::new(ClientCore {
                root: Some(root.into()),
                interceptors: options.interceptors,
                race_policy: options.race_policy,
            }),
        }
    }

    /// A client whose root is an [`HttpLink`] to `options.url`.
    ///
    /// # Errors
    ///
    /// `Configuration` when the URL is missing, not `http://`, or a header
    /// is invalid.
    pub fn http(options: ClientOptions) -> Result<Self> {
        let url = options
            .url
            .clone()
            .ok_or_else(|| StoreRpcError::Configuration("client URL is not set".to_string()))?;

        let mut link = HttpLink::new(url)?;
        for (name, value) in &options.headers {
            link = link.with_header(name, value)?;
        }

        tracing::debug!(url = %link.base_url(), "created HTTP store client");
        Ok(Self::new(Dispatcher::link(link), options))
    }

    /// A client that never sends anything.
    ///
    /// Every call yields a store stuck in `Loading`; deferred triggers do
    /// nothing. Useful where no transport exists, such as server rendering.
    pub fn inert() -> Self {
        Self {
            core: Arc::new(ClientCore {
                root: None,
                interceptors: Interceptors::default(),
                race_policy: RacePolicy::default(),
            }),
        }
    }

    pub fn is_inert(&self) -> bool {
        self.core.root.is_none()
    }

    /// An empty proxy at the dispatcher root.
    pub fn root(&self) -> PathProxy {
        PathProxy::new(Arc::clone(&self.core), ProcedurePath::default())
    }

    /// A proxy at a dotted path (`"user.get"` or `"user.get.$now"`).
    pub fn path(&self, dotted: &str) -> PathProxy {
        PathProxy::new(Arc::clone(&self.core), ProcedurePath::parse(dotted))
    }

    /// A typed handle to the procedure at `path` (no mode selector).
    ///
    /// `A` is the argument list, usually a tuple: `(u64,)`, `(String, bool)`
    /// or `()`. `R` is the decoded response.
    pub fn procedure<A, R>(
        &self,
        path: &str,
    ) -> std::result::Result<Procedure<A, R>, ResolutionError> {
        let path = ProcedurePath::parse(path);
        let endpoint = self.core.endpoint(&path)?;
        Ok(Procedure {
            path,
            endpoint,
            _marker: PhantomData,
        })
    }
}

impl fmt::Debug for StoreClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreClient")
            .field("root", &self.core.root)
            .field("interceptors", &self.core.interceptors)
            .field("race_policy", &self.core.race_policy)
            .finish()
    }
}

/// A resolved, typed procedure.
///
/// Resolution already happened, so creating stores cannot fail. Each
/// `now`/`later` creates a new, independent store.
pub struct Procedure<A, R> {
    path: ProcedurePath,
    endpoint: Option<Endpoint>,
    _marker: PhantomData<fn(A) -> R>,
}

impl<A, R> Procedure<A, R>
where
    A: Serialize + 'static,
    R: DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn path(&self) -> &ProcedurePath {
        &self.path
    }

    /// Starts the call and returns its store.
    pub fn now(&self, args: A) -> NowStore<R> {
        match &self.endpoint {
            Some(endpoint) => container::now(endpoint, &args),
            None => container::inert_now(),
        }
    }

    /// Returns a store whose trigger starts calls.
    pub fn later(&self) -> LaterStore<R, A> {
        match &self.endpoint {
            Some(endpoint) => container::later(endpoint),
            None => container::inert_later(),
        }
    }
}

impl<A, R> Clone for Procedure<A, R> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            endpoint: self.endpoint.clone(),
            _marker: PhantomData,
        }
    }
}

impl<A, R> fmt::Debug for Procedure<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Procedure")
            .field("path", &self.path.to_string())
            .field("inert", &self.endpoint.is_none())
            .finish()
    }
}
