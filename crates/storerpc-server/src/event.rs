//! Per-request state handed to the adapter hook.

use hyper::body::Bytes;
use hyper::header::HeaderMap;
use hyper::{Method, Uri};
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// The parts of an HTTP request that hooks and context factories see.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

impl RequestInfo {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self { method, uri, headers }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

/// Scratch space shared by every hook and the context factory of one
/// request.
///
/// Clones share the same map.
#[derive(Clone, Default)]
pub struct Pipe {
    values: Arc<Mutex<Map<String, Value>>>,
}

impl Pipe {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Map<String, Value>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.lock().insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.lock().remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// A copy of everything written so far.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.lock().clone()
    }
}

impl fmt::Debug for Pipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pipe").field(&*self.lock()).finish()
    }
}

/// String-keyed, type-erased values attached to a request.
///
/// The adapter installs callers here for code that runs after it (page
/// loaders, other middleware).
#[derive(Default)]
pub struct Locals {
    values: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl Locals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Box::new(value));
    }

    /// The value under `key`, if present and of type `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|value| value.downcast_ref::<T>())
    }

    pub fn remove<T: Any>(&mut self, key: &str) -> Option<T> {
        match self.values.remove(key)?.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(_) => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Locals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

/// An incoming request with its body already read.
#[derive(Debug)]
pub struct RequestEvent {
    pub info: RequestInfo,
    pub body: Bytes,
    pub locals: Locals,
}

impl RequestEvent {
    pub fn new(info: RequestInfo, body: Bytes) -> Self {
        Self {
            info,
            body,
            locals: Locals::new(),
        }
    }

    /// Shorthand used mostly by tests.
    pub fn from_parts(
        method: Method,
        uri: &str,
        body: impl Into<Bytes>,
    ) -> Result<Self, http::uri::InvalidUri> {
        let info = RequestInfo::new(method, uri.parse()?, HeaderMap::new());
        Ok(Self::new(info, body.into()))
    }
}
