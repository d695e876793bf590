//! Call-state containers: the machinery behind `$now` and `$later`.
//!
//! Both modes create a store holding [`CallResult::Loading`] and resolve the
//! remote operation on a Tokio task:
//!
//! 1. invoke the operation with the encoded arguments
//! 2. on success, run the response hook and decode the value
//! 3. on failure, run the error hook
//! 4. write the terminal state into the store
//!
//! Nothing here retries, times out, or cancels. Dropping every handle to a
//! store does not stop an in-flight resolution; its result is simply not
//! observed.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::dispatcher::ResolvedOperation;
use crate::interceptor::Interceptors;
use crate::state::{CallResult, LaterState, LaterStore, NowStore, Trigger};
use crate::store::{Store, WeakStore};

/// What happens when a deferred store is triggered again before the previous
/// call settled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RacePolicy {
    /// Every call writes when it settles; the last one to settle wins.
    #[default]
    LastWriteWins,
    /// Only the most recently started call may write; older results are
    /// dropped.
    DiscardStale,
}

/// A resolved operation plus the per-client settings that apply to it.
#[derive(Debug, Clone)]
pub struct Endpoint {
    operation: ResolvedOperation,
    interceptors: Interceptors,
    race_policy: RacePolicy,
}

impl Endpoint {
    pub fn new(
        operation: ResolvedOperation,
        interceptors: Interceptors,
        race_policy: RacePolicy,
    ) -> Self {
        Self {
            operation,
            interceptors,
            race_policy,
        }
    }

    pub fn operation(&self) -> &ResolvedOperation {
        &self.operation
    }
}

/// Converts call arguments into positional JSON values.
///
/// Arrays (including tuples and `Vec`s) are spread, `()`/`null` means no
/// arguments, anything else is a single argument. Wrap a lone array argument
/// in a one-element tuple: `(vec![1, 2],)`.
pub fn encode_args<A: Serialize>(args: &A) -> Result<Vec<Value>, Value> {
    match serde_json::to_value(args) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(Value::Null) => Ok(Vec::new()),
        Ok(single) => Ok(vec![single]),
        Err(e) => Err(Value::String(format!("invalid arguments: {}", e))),
    }
}

/// Starts the call immediately and returns its store.
pub fn now<V, A>(endpoint: &Endpoint, args: &A) -> NowStore<V>
where
    V: DeserializeOwned + Clone + Send + Sync + 'static,
    A: Serialize,
{
    let store = Store::new(CallResult::Loading);
    let writer = store.clone();
    spawn_resolution(endpoint.clone(), encode_args(args), move |result| {
        writer.set(result);
    });
    store
}

/// Returns a store that starts calls when its `call` trigger is invoked.
pub fn later<V, A>(endpoint: &Endpoint) -> LaterStore<V, A>
where
    V: DeserializeOwned + Clone + Send + Sync + 'static,
    A: Serialize + 'static,
{
    let endpoint = endpoint.clone();
    let generation = Arc::new(AtomicU64::new(0));

    Store::new_cyclic(move |weak: &WeakStore<LaterState<V, A>>| {
        let weak = weak.clone();
        let call = Trigger::new(move |args: A| {
            let Some(store) = weak.upgrade() else {
                tracing::debug!(
                    path = %endpoint.operation.path(),
                    "store dropped; ignoring trigger"
                );
                return;
            };

            let ticket = generation.fetch_add(1, Ordering::SeqCst) + 1;
            let generation = Arc::clone(&generation);
            let race_policy = endpoint.race_policy;
            let path = endpoint.operation.path().to_string();

            spawn_resolution(endpoint.clone(), encode_args(&args), move |result| {
                if race_policy == RacePolicy::DiscardStale
                    && generation.load(Ordering::SeqCst) != ticket
                {
                    tracing::debug!(path = %path, ticket, "discarding stale result");
                    return;
                }
                // Carry the trigger forward so it survives every transition.
                store.update(|current| LaterState {
                    result,
                    call: current.call.clone(),
                });
            });
        });

        LaterState {
            result: CallResult::Loading,
            call,
        }
    })
}

/// A `$now` store that never settles.
pub fn inert_now<V>() -> NowStore<V>
where
    V: Clone + Send + 'static,
{
    Store::new(CallResult::Loading)
}

/// A `$later` store that never settles and whose trigger does nothing.
pub fn inert_later<V, A>() -> LaterStore<V, A>
where
    V: Clone + Send + 'static,
    A: 'static,
{
    Store::new(LaterState {
        result: CallResult::Loading,
        call: Trigger::noop(),
    })
}

fn spawn_resolution<V, W>(endpoint: Endpoint, args: Result<Vec<Value>, Value>, write: W)
where
    V: DeserializeOwned + Send + 'static,
    W: FnOnce(CallResult<V>) + Send + 'static,
{
    let handle = match tokio::runtime::Handle::try_current() {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!(path = %endpoint.operation.path(), "cannot start call: {}", e);
            write(CallResult::Failure(Value::String(format!(
                "no async runtime available: {}",
                e
            ))));
            return;
        }
    };

    handle.spawn(async move {
        let result = resolve::<V>(&endpoint, args).await;
        write(result);
    });
}

async fn resolve<V: DeserializeOwned>(
    endpoint: &Endpoint,
    args: Result<Vec<Value>, Value>,
) -> CallResult<V> {
    let path = endpoint.operation.path().to_string();
    let args = match args {
        Ok(args) => args,
        Err(error) => return CallResult::Failure(error),
    };

    tracing::debug!(path = %path, args = args.len(), "invoking remote operation");

    match endpoint.operation.invoke(args).await {
        Ok(response) => match endpoint.interceptors.intercept_response(response, &path).await {
            Ok(response) => match serde_json::from_value::<V>(response) {
                Ok(response) => CallResult::Success(response),
                Err(e) => {
                    tracing::warn!(
                        path = %path,
                        "response does not match the expected type: {}",
                        e
                    );
                    CallResult::Failure(Value::String(format!(
                        "invalid response for {}: {}",
                        path, e
                    )))
                }
            },
            Err(hook_error) => CallResult::Failure(hook_error),
        },
        Err(error) => {
            tracing::debug!(path = %path, "remote operation failed");
            CallResult::Failure(endpoint.interceptors.intercept_error(error, &path).await)
        }
    }
}
