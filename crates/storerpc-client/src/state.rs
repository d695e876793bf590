//! Call states held by the reactive stores.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::Value;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::store::Store;

/// Outcome of a remote call as observed through a store.
///
/// Serializes to the flag object consumers expect:
///
/// | state        | `loading` | `success` | `error`  | `response` |
/// |--------------|-----------|-----------|----------|------------|
/// | `Loading`    | `true`    | `false`   | `false`  | `null`     |
/// | `Success(v)` | `false`   | `true`    | `false`  | `v`        |
/// | `Failure(e)` | `false`   | `false`   | `e`      | `null`     |
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CallResult<V = Value, E = Value> {
    #[default]
    Loading,
    Success(V),
    Failure(E),
}

impl<V, E> CallResult<V, E> {
    pub fn is_loading(&self) -> bool {
        matches!(self, CallResult::Loading)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CallResult::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, CallResult::Failure(_))
    }

    /// Whether the call reached a terminal state.
    pub fn is_settled(&self) -> bool {
        !self.is_loading()
    }

    /// The response; present iff the call succeeded.
    pub fn response(&self) -> Option<&V> {
        match self {
            CallResult::Success(response) => Some(response),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&E> {
        match self {
            CallResult::Failure(error) => Some(error),
            _ => None,
        }
    }

    /// `None` while loading, otherwise the terminal outcome.
    pub fn into_result(self) -> Option<Result<V, E>> {
        match self {
            CallResult::Loading => None,
            CallResult::Success(response) => Some(Ok(response)),
            CallResult::Failure(error) => Some(Err(error)),
        }
    }
}

impl<V: Serialize, E: Serialize> Serialize for CallResult<V, E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CallResult", 4)?;
        match self {
            CallResult::Loading => {
                state.serialize_field("loading", &true)?;
                state.serialize_field("success", &false)?;
                state.serialize_field("error", &false)?;
                state.serialize_field("response", &Option::<V>::None)?;
            }
            CallResult::Success(response) => {
                state.serialize_field("loading", &false)?;
                state.serialize_field("success", &true)?;
                state.serialize_field("error", &false)?;
                state.serialize_field("response", response)?;
            }
            CallResult::Failure(error) => {
                state.serialize_field("loading", &false)?;
                state.serialize_field("success", &false)?;
                state.serialize_field("error", error)?;
                state.serialize_field("response", &Option::<V>::None)?;
            }
        }
        state.end()
    }
}

/// Fire-and-forget function that (re)starts a deferred call.
///
/// Clones share the same underlying closure; see [`Trigger::ptr_eq`].
pub struct Trigger<A> {
    f: Arc<dyn Fn(A) + Send + Sync>,
}

impl<A> Trigger<A> {
    pub(crate) fn new(f: impl Fn(A) + Send + Sync + 'static) -> Self {
        Self { f: Arc::new(f) }
    }

    /// A trigger that does nothing.
    pub fn noop() -> Self
    where
        A: 'static,
    {
        Self::new(|_| {})
    }

    pub fn call(&self, args: A) {
        (self.f)(args)
    }

    /// Whether both triggers are the same function.
    pub fn ptr_eq(&self, other: &Trigger<A>) -> bool {
        Arc::ptr_eq(&self.f, &other.f)
    }
}

impl<A> Clone for Trigger<A> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

impl<A> fmt::Debug for Trigger<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Trigger(..)")
    }
}

/// State of a deferred (`$later`) store: the call outcome plus the trigger
/// that starts the next call.
///
/// Every state written to the store carries the same `call` trigger.
pub struct LaterState<V = Value, A = Vec<Value>> {
    pub result: CallResult<V>,
    pub call: Trigger<A>,
}

impl<V, A> LaterState<V, A> {
    /// Starts a new call with `args`; the store is updated when it settles.
    pub fn call(&self, args: A) {
        self.call.call(args)
    }
}

impl<V, A> Deref for LaterState<V, A> {
    type Target = CallResult<V>;

    fn deref(&self) -> &Self::Target {
        &self.result
    }
}

impl<V: Clone, A> Clone for LaterState<V, A> {
    fn clone(&self) -> Self {
        Self {
            result: self.result.clone(),
            call: self.call.clone(),
        }
    }
}

impl<V: fmt::Debug, A> fmt::Debug for LaterState<V, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaterState")
            .field("result", &self.result)
            .field("call", &self.call)
            .finish()
    }
}

impl<V: PartialEq, A> PartialEq for LaterState<V, A> {
    fn eq(&self, other: &Self) -> bool {
        self.result == other.result && self.call.ptr_eq(&other.call)
    }
}

impl<V: Serialize, A> Serialize for LaterState<V, A> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.result.serialize(serializer)
    }
}

/// Store produced by an immediate (`$now`) call.
pub type NowStore<V = Value> = Store<CallResult<V>>;

/// Store produced by a deferred (`$later`) call.
pub type LaterStore<V = Value, A = Vec<Value>> = Store<LaterState<V, A>>;
