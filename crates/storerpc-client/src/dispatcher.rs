//! The dispatcher root: a tree of remote operations addressed by name.
//!
//! A tree is built from three kinds of node:
//!
//! - [`Namespace`]: named children
//! - operation: an async callable ([`RemoteOperation`])
//! - link: a transport ([`Link`]) that accepts any procedure path below it
//!
//! Resolution of `parent.….method` walks the parent segments from the root
//! and then looks `method` up in the dispatch table of the node it reached.
//! Procedures therefore always live under at least one namespace.

use futures_util::future::BoxFuture;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use storerpc_common::protocol::{ProcedurePath, ResolutionError};

pub type OperationFuture = BoxFuture<'static, Result<Value, Value>>;

/// An async callable taking positional JSON arguments.
///
/// The error value is arbitrary JSON and is handed to the store verbatim
/// (or through the error hook).
pub trait RemoteOperation: Send + Sync {
    fn invoke(&self, args: Vec<Value>) -> OperationFuture;
}

impl<F, Fut> RemoteOperation for F
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, Value>> + Send + 'static,
{
    fn invoke(&self, args: Vec<Value>) -> OperationFuture {
        Box::pin(self(args))
    }
}

/// A transport that can call any procedure by path.
pub trait Link: Send + Sync {
    fn call(&self, path: ProcedurePath, args: Vec<Value>) -> OperationFuture;
}

#[derive(Clone)]
pub enum Dispatcher {
    Namespace(Namespace),
    Operation(Arc<dyn RemoteOperation>),
    Link(Arc<dyn Link>),
}

/// Named children of a dispatcher node.
///
/// # Example
///
/// ```
/// use storerpc_client::dispatcher::{Dispatcher, Namespace};
/// use storerpc_common::ProcedurePath;
/// use serde_json::{json, Value};
///
/// let root: Dispatcher = Namespace::new()
///     .nest("user", Namespace::new().operation("get", |args: Vec<Value>| async move {
///         Ok(json!({"id": args[0], "name": "x"}))
///     }))
///     .into();
///
/// assert!(root.resolve(&ProcedurePath::parse("user.get")).is_ok());
/// assert!(root.resolve(&ProcedurePath::parse("user.delete")).is_err());
/// ```
#[derive(Clone, Default)]
pub struct Namespace {
    children: BTreeMap<String, Dispatcher>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nest(self, name: impl Into<String>, namespace: Namespace) -> Self {
        self.insert(name, Dispatcher::Namespace(namespace))
    }

    pub fn operation<F, Fut>(self, name: impl Into<String>, operation: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Value>> + Send + 'static,
    {
        self.insert(name, Dispatcher::Operation(Arc::new(operation)))
    }

    pub fn link(self, name: impl Into<String>, link: impl Link + 'static) -> Self {
        self.insert(name, Dispatcher::Link(Arc::new(link)))
    }

    /// Adds or replaces a child.
    pub fn insert(mut self, name: impl Into<String>, child: Dispatcher) -> Self {
        self.children.insert(name.into(), child);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Dispatcher> {
        self.children.get(name)
    }
}

impl From<Namespace> for Dispatcher {
    fn from(namespace: Namespace) -> Self {
        Dispatcher::Namespace(namespace)
    }
}

impl Dispatcher {
    pub fn link(link: impl Link + 'static) -> Self {
        Dispatcher::Link(Arc::new(link))
    }

    /// Resolves a procedure path (without mode selector) to a callable.
    ///
    /// The last segment is the method name; everything before it is walked
    /// left to right from this node. A link reached on the way absorbs the
    /// remaining segments.
    pub fn resolve(&self, path: &ProcedurePath) -> Result<ResolvedOperation, ResolutionError> {
        let segments = path.segments();
        if segments.len() < 2 {
            return Err(ResolutionError::TooShort {
                path: path.to_string(),
                segments: segments.len(),
            });
        }

        let (method, parents) = segments.split_at(segments.len() - 1);
        let method = &method[0];

        let mut node = self;
        for (walked, segment) in parents.iter().enumerate() {
            node = match node {
                Dispatcher::Namespace(namespace) => {
                    namespace
                        .get(segment)
                        .ok_or_else(|| ResolutionError::MissingSegment {
                            segment: segment.clone(),
                            path: path.to_string(),
                        })?
                }
                Dispatcher::Operation(_) => {
                    return Err(not_a_namespace(segments, walked, path));
                }
                Dispatcher::Link(link) => {
                    let remote = ProcedurePath::new(segments[walked..].to_vec());
                    return Ok(ResolvedOperation::linked(path.clone(), Arc::clone(link), remote));
                }
            };
        }

        match node {
            Dispatcher::Namespace(namespace) => match namespace.get(method) {
                Some(Dispatcher::Operation(operation)) => Ok(ResolvedOperation {
                    path: path.clone(),
                    target: Target::Operation(Arc::clone(operation)),
                }),
                Some(Dispatcher::Namespace(_)) | Some(Dispatcher::Link(_)) => {
                    Err(ResolutionError::NotAnOperation {
                        path: path.to_string(),
                    })
                }
                None => Err(ResolutionError::MissingSegment {
                    segment: method.clone(),
                    path: path.to_string(),
                }),
            },
            Dispatcher::Operation(_) => Err(not_a_namespace(segments, parents.len(), path)),
            Dispatcher::Link(link) => Ok(ResolvedOperation::linked(
                path.clone(),
                Arc::clone(link),
                ProcedurePath::new(vec![method.clone()]),
            )),
        }
    }
}

/// The operation reached after walking `walked` segments was asked for a child.
fn not_a_namespace(segments: &[String], walked: usize, path: &ProcedurePath) -> ResolutionError {
    let segment = walked
        .checked_sub(1)
        .map(|i| segments[i].clone())
        .unwrap_or_default();
    ResolutionError::NotANamespace {
        segment,
        path: path.to_string(),
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dispatcher::Namespace(namespace) => namespace.fmt(f),
            Dispatcher::Operation(_) => f.write_str("Operation"),
            Dispatcher::Link(_) => f.write_str("Link"),
        }
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.children.iter()).finish()
    }
}

#[derive(Clone)]
enum Target {
    Operation(Arc<dyn RemoteOperation>),
    Link {
        link: Arc<dyn Link>,
        remote: ProcedurePath,
    },
}

/// A remote operation bound to the path it was resolved from.
#[derive(Clone)]
pub struct ResolvedOperation {
    path: ProcedurePath,
    target: Target,
}

impl ResolvedOperation {
    fn linked(path: ProcedurePath, link: Arc<dyn Link>, remote: ProcedurePath) -> Self {
        Self {
            path,
            target: Target::Link { link, remote },
        }
    }

    /// The dotted path the operation was resolved from (hooks see this).
    pub fn path(&self) -> &ProcedurePath {
        &self.path
    }

    pub fn invoke(&self, args: Vec<Value>) -> OperationFuture {
        match &self.target {
            Target::Operation(operation) => operation.invoke(args),
            Target::Link { link, remote } => link.call(remote.clone(), args),
        }
    }
}

impl fmt::Debug for ResolvedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = match &self.target {
            Target::Operation(_) => "operation".to_string(),
            Target::Link { remote, .. } => format!("link:{}", remote),
        };
        f.debug_struct("ResolvedOperation")
            .field("path", &self.path.to_string())
            .field("target", &target)
            .finish()
    }
}
