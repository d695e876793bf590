//! Procedure Router
//!
//! Maps dotted procedure paths (`"user.get"`) to async handlers taking a
//! request context and positional JSON arguments.
//!
//! # Example
//!
//! ```
//! use storerpc_server::Router;
//! use storerpc_common::ProcedureError;
//! use serde_json::{json, Value};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let users = Router::<()>::new()
//!     .procedure("get", |_ctx, args: Vec<Value>| async move {
//!         Ok(json!({"id": args[0], "name": "x"}))
//!     })
//!     .typed("rename", |_ctx, (id, name): (u64, String)| async move {
//!         Ok::<_, ProcedureError>(json!({"id": id, "name": name}))
//!     });
//! let router = Router::new().merge("user", users);
//!
//! let caller = router.create_caller(());
//! assert_eq!(caller.call("user.get", vec![json!(42)]).await.unwrap()["id"], 42);
//! # }
//! ```

use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use storerpc_common::protocol::{ProcedureError, ProcedurePath};

pub type ProcedureFuture = BoxFuture<'static, Result<Value, ProcedureError>>;

type Handler<C> = Arc<dyn Fn(C, Vec<Value>) -> ProcedureFuture + Send + Sync>;

/// A set of procedures addressed by dotted path.
pub struct Router<C> {
    procedures: BTreeMap<String, Handler<C>>,
}

impl<C> Clone for Router<C> {
    fn clone(&self) -> Self {
        Self {
            procedures: self.procedures.clone(),
        }
    }
}

impl<C> Default for Router<C> {
    fn default() -> Self {
        Self {
            procedures: BTreeMap::new(),
        }
    }
}

impl<C> fmt::Debug for Router<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("procedures", &self.procedures.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn normalize(path: &str) -> String {
    ProcedurePath::parse(path).to_string()
}

impl<C: Send + 'static> Router<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an untyped procedure. Replaces any procedure at `path`.
    pub fn procedure<F, Fut>(mut self, path: &str, handler: F) -> Self
    where
        F: Fn(C, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ProcedureError>> + Send + 'static,
    {
        let handler: Handler<C> = Arc::new(move |ctx: C, args: Vec<Value>| -> ProcedureFuture {
            Box::pin(handler(ctx, args))
        });
        self.procedures.insert(normalize(path), handler);
        self
    }

    /// Registers a procedure with decoded arguments and an encoded result.
    ///
    /// Arguments are decoded from the positional array, so `A` is usually a
    /// tuple. A decode failure is a `BAD_REQUEST`.
    pub fn typed<A, R, F, Fut>(self, path: &str, handler: F) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + 'static,
        F: Fn(C, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ProcedureError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        self.procedure(path, move |ctx, args| {
            let decoded = serde_json::from_value::<A>(Value::Array(args));
            let handler = Arc::clone(&handler);
            async move {
                let args = decoded
                    .map_err(|e| ProcedureError::bad_request(format!("invalid arguments: {}", e)))?;
                let result = handler(ctx, args).await?;
                serde_json::to_value(result)
                    .map_err(|e| {
                        ProcedureError::internal(format!("failed to encode result: {}", e))
                    })
            }
        })
    }

    /// Adds every procedure of `other` under `prefix`.
    pub fn merge(mut self, prefix: &str, other: Router<C>) -> Self {
        let prefix = ProcedurePath::parse(prefix);
        for (path, handler) in other.procedures {
            let path = prefix.concat(&ProcedurePath::parse(&path)).to_string();
            self.procedures.insert(path, handler);
        }
        self
    }

    pub fn contains(&self, path: &str) -> bool {
        self.procedures.contains_key(&normalize(path))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.procedures.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }

    /// Invokes the procedure at `path`.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` when no procedure is registered at `path`, otherwise
    /// whatever the procedure returns.
    pub async fn call(
        &self,
        ctx: C,
        path: &str,
        args: Vec<Value>,
    ) -> Result<Value, ProcedureError> {
        let path = normalize(path);
        let handler = self
            .procedures
            .get(&path)
            .cloned()
            .ok_or_else(|| {
                ProcedureError::not_found(format!("No procedure on path \"{}\"", path))
            })?;

        tracing::debug!(path = %path, args = args.len(), "calling procedure");
        handler(ctx, args).await
    }

    /// An in-process caller bound to `ctx`.
    pub fn create_caller(&self, ctx: C) -> Caller<C> {
        Caller {
            router: self.clone(),
            ctx,
        }
    }
}

/// Calls procedures of a router in-process with a fixed context.
pub struct Caller<C> {
    router: Router<C>,
    ctx: C,
}

impl<C: Clone + Send + 'static> Caller<C> {
    pub async fn call(&self, path: &str, args: Vec<Value>) -> Result<Value, ProcedureError> {
        self.router.call(self.ctx.clone(), path, args).await
    }

    pub fn context(&self) -> &C {
        &self.ctx
    }
}

impl<C: Clone> Clone for Caller<C> {
    fn clone(&self) -> Self {
        Self {
            router: self.router.clone(),
            ctx: self.ctx.clone(),
        }
    }
}

impl<C: fmt::Debug> fmt::Debug for Caller<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Caller")
            .field("router", &self.router)
            .field("ctx", &self.ctx)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use storerpc_common::protocol::ErrorCode;

    #[derive(Clone, Debug)]
    struct Ctx {
        user: Option<String>,
    }

    fn router() -> Router<Ctx> {
        let users = Router::new()
            .procedure("whoami", |ctx: Ctx, _args| async move {
                ctx.user
                    .map(Value::String)
                    .ok_or_else(|| ProcedureError::new(ErrorCode::Unauthorized, "not signed in"))
            })
            .typed("add", |_ctx, (a, b): (i64, i64)| async move { Ok(a + b) });

        Router::new()
            .procedure("ping", |_ctx, _args| async move { Ok(json!("pong")) })
            .merge("user", users)
    }

    fn ctx(user: Option<&str>) -> Ctx {
        Ctx {
            user: user.map(str::to_string),
        }
    }

    #[test]
    fn test_merge_prefixes_paths() {
        let router = router();
        assert_eq!(router.paths().collect::<Vec<_>>(), vec!["ping", "user.add", "user.whoami"]);
        assert!(router.contains("user.add"));
        assert!(!router.contains("add"));
        assert_eq!(router.len(), 3);
    }

    #[tokio::test]
    async fn test_call_with_context() {
        let router = router();
        assert_eq!(
            router.call(ctx(Some("ada")), "user.whoami", vec![]).await,
            Ok(json!("ada"))
        );
        let err = router.call(ctx(None), "user.whoami", vec![]).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthorized);
    }

    #[tokio::test]
    async fn test_typed_decodes_and_rejects_bad_args() {
        let router = router();
        assert_eq!(
            router.call(ctx(None), "user.add", vec![json!(2), json!(3)]).await,
            Ok(json!(5))
        );
        let err = router
            .call(ctx(None), "user.add", vec![json!("two")])
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BadRequest);
        assert!(err.message.starts_with("invalid arguments"));
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let err = router().call(ctx(None), "user.delete", vec![]).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert!(err.message.contains("user.delete"));
    }

    #[tokio::test]
    async fn test_caller_reuses_context() {
        let caller = router().create_caller(ctx(Some("grace")));
        assert_eq!(caller.call("user.whoami", vec![]).await, Ok(json!("grace")));
        assert_eq!(caller.call("ping", vec![]).await, Ok(json!("pong")));
        assert_eq!(caller.context().user.as_deref(), Some("grace"));
    }
}
