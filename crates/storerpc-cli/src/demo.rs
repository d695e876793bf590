//! Demo procedures served by `storerpc serve`.

use serde_json::{json, Value};
use storerpc_common::protocol::ProcedureError;
use storerpc_server::Router;

/// The `system.*` procedures.
///
/// - `system.echo(...args)` returns its arguments as an array
/// - `system.ping()` returns `"pong"`
/// - `system.fail(message?)` always fails with BAD_REQUEST
pub fn router() -> Router<()> {
    let system = Router::new()
        .procedure("echo", |_ctx: (), args: Vec<Value>| async move { Ok(Value::Array(args)) })
        .procedure("ping", |_ctx: (), _args: Vec<Value>| async move { Ok(json!("pong")) })
        .procedure("fail", |_ctx: (), args: Vec<Value>| async move {
            let message = args
                .first()
                .and_then(Value::as_str)
                .unwrap_or("system.fail was called")
                .to_string();
            Err::<Value, _>(ProcedureError::bad_request(message))
        });

    Router::new().merge("system", system)
}

#[cfg(test)]
mod tests {
    use super::*;
    use storerpc_common::protocol::ErrorCode;

    #[test]
    fn test_demo_paths() {
        let router = router();
        assert_eq!(
            router.paths().collect::<Vec<_>>(),
            vec!["system.echo", "system.fail", "system.ping"]
        );
    }

    #[tokio::test]
    async fn test_echo_and_ping() {
        let caller = router().create_caller(());
        assert_eq!(
            caller.call("system.echo", vec![json!(1), json!("a")]).await.unwrap(),
            json!([1, "a"])
        );
        assert_eq!(caller.call("system.ping", vec![]).await.unwrap(), json!("pong"));
    }

    #[tokio::test]
    async fn test_fail_uses_message() {
        let caller = router().create_caller(());
        let error = caller.call("system.fail", vec![json!("boom")]).await.unwrap_err();
        assert_eq!(error.code, ErrorCode::BadRequest);
        assert_eq!(error.message, "boom");

        let error = caller.call("system.fail", vec![]).await.unwrap_err();
        assert_eq!(error.message, "system.fail was called");
    }
}
