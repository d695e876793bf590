//! The `call` subcommand: invoke one procedure and report every state its
//! store goes through.

use anyhow::{anyhow, Result};
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use tokio::sync::mpsc::{self, UnboundedSender};

use storerpc_client::{CallResult, ClientOptions, LaterState, StoreClient};
use storerpc_common::protocol::Mode;

/// One `storerpc call` invocation.
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub url: String,
    /// Dotted procedure path, without a mode selector.
    pub path: String,
    pub args: Vec<Value>,
    /// Go through `$later` and trigger once instead of `$now`.
    pub later: bool,
    pub headers: Vec<(String, String)>,
}

/// Parses the `--args` value into positional arguments.
///
/// An array is spread, `null` means no arguments and anything else is a
/// single argument.
pub fn parse_args(raw: &str) -> Result<Vec<Value>> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| anyhow!("Invalid JSON in args: {}", e))?;
    Ok(match value {
        Value::Array(args) => args,
        Value::Null => Vec::new(),
        other => vec![other],
    })
}

/// Parses a `name: value` header flag.
pub fn parse_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("Invalid header '{}': expected 'name: value'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("Invalid header '{}': empty name", raw));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Runs `request`, writing each observed state to `out` as one JSON line.
///
/// Returns the settled state; a `Failure` is not an `Err` here, the caller
/// decides the exit code.
pub async fn run<W: Write>(request: CallRequest, out: &mut W) -> Result<CallResult> {
    let mut options = ClientOptions::new().url(request.url.clone());
    for (name, value) in request.headers {
        options = options.header(name, value);
    }
    let client = StoreClient::http(options)?;
    let proxy = client.path(&request.path);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let settled = if request.later {
        let store = proxy
            .at(Mode::Later.as_str())
            .call(Vec::new())?
            .into_later()
            .ok_or_else(|| anyhow!("{} did not produce a deferred store", request.path))?;
        let _subscription = store.subscribe(forward_lines::<LaterState>(&tx));
        store.get().call(request.args);
        store.wait_for(|state| state.is_settled()).await.result
    } else {
        let store = proxy
            .at(Mode::Now.as_str())
            .call(request.args)?
            .into_now()
            .ok_or_else(|| anyhow!("{} did not produce an immediate store", request.path))?;
        let _subscription = store.subscribe(forward_lines::<CallResult>(&tx));
        store.wait_for(|state| state.is_settled()).await
    };

    while let Ok(line) = rx.try_recv() {
        writeln!(out, "{}", line)?;
    }
    out.flush()?;

    Ok(settled)
}

fn forward_lines<T: Serialize + 'static>(
    tx: &UnboundedSender<String>,
) -> impl Fn(&T) + Send + Sync + 'static {
    let tx = tx.clone();
    move |state: &T| match serde_json::to_string(state) {
        Ok(line) => {
            let _ = tx.send(line);
        }
        Err(e) => tracing::warn!("failed to serialize state: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_args_spreads_arrays() {
        assert_eq!(parse_args("[1, \"a\"]").unwrap(), vec![json!(1), json!("a")]);
        assert_eq!(parse_args("null").unwrap(), Vec::<Value>::new());
        assert_eq!(parse_args("{\"id\": 1}").unwrap(), vec![json!({"id": 1})]);
        assert!(parse_args("{oops").is_err());
    }

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("x-user: ada").unwrap(),
            ("x-user".to_string(), "ada".to_string())
        );
        assert_eq!(
            parse_header("authorization:Bearer a:b").unwrap(),
            ("authorization".to_string(), "Bearer a:b".to_string())
        );
        assert!(parse_header("no-colon").is_err());
        assert!(parse_header(": value").is_err());
    }
}
