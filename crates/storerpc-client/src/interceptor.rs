//! Response and error interception hooks.
//!
//! Hooks receive the raw value and the dotted procedure path (`"user.get"`)
//! and return the value the store should hold instead. Both are async.
//!
//! A hook that itself fails (returns `Err`) does not escape: its error value
//! becomes the store's `Failure`.

use futures_util::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

pub type HookFuture = BoxFuture<'static, Result<Value, Value>>;

type Hook = Arc<dyn Fn(Value, String) -> HookFuture + Send + Sync>;

/// Optional hooks applied to every call made through a client.
///
/// # Example
///
/// ```
/// use storerpc_client::Interceptors;
/// use serde_json::json;
///
/// let interceptors = Interceptors::new()
///     .on_response(|response, _path| async move { Ok(json!({"data": response})) })
///     .on_error(|error, path| async move { Ok(json!({"path": path, "cause": error})) });
/// assert!(interceptors.has_response_hook());
/// ```
#[derive(Clone, Default)]
pub struct Interceptors {
    response: Option<Hook>,
    error: Option<Hook>,
}

impl Interceptors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transforms successful responses. `Err` turns the call into a failure.
    pub fn on_response<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Value, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Value>> + Send + 'static,
    {
        self.response = Some(Arc::new(move |value: Value, path: String| -> HookFuture {
            Box::pin(hook(value, path))
        }));
        self
    }

    /// Transforms failures. Both `Ok` and `Err` end up as the failure value.
    pub fn on_error<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Value, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Value>> + Send + 'static,
    {
        self.error = Some(Arc::new(move |value: Value, path: String| -> HookFuture {
            Box::pin(hook(value, path))
        }));
        self
    }

    pub fn has_response_hook(&self) -> bool {
        self.response.is_some()
    }

    pub fn has_error_hook(&self) -> bool {
        self.error.is_some()
    }

    pub(crate) async fn intercept_response(
        &self,
        response: Value,
        path: &str,
    ) -> Result<Value, Value> {
        match &self.response {
            Some(hook) => {
                let intercepted = hook(response, path.to_string()).await;
                if intercepted.is_err() {
                    tracing::warn!(path = %path, "response hook failed; recording as failure");
                }
                intercepted
            }
            None => Ok(response),
        }
    }

    pub(crate) async fn intercept_error(&self, error: Value, path: &str) -> Value {
        match &self.error {
            Some(hook) => match hook(error, path.to_string()).await {
                Ok(error) => error,
                Err(hook_error) => {
                    tracing::warn!(path = %path, "error hook failed; recording its error instead");
                    hook_error
                }
            },
            None => error,
        }
    }
}

impl fmt::Debug for Interceptors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptors")
            .field("response", &self.has_response_hook())
            .field("error", &self.has_error_hook())
            .finish()
    }
}
