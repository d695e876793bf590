//! CLI Integration Tests
//!
//! Serves the demo router on a random loopback port and drives the `call`
//! subcommand's library entry point against it.
//!
//! All URLs use `http://127.0.0.1:PORT` (not `localhost`, to avoid DNS
//! resolution differences between systems).

use serde_json::{json, Value};
use std::net::SocketAddr;
use storerpc_cli::call::{self, CallRequest};
use storerpc_cli::demo;
use storerpc_client::CallResult;
use storerpc_server::{HandlerOptions, HttpServer, RpcHandler};
use tokio::net::TcpListener;

// ============================================================================
// Test Helpers
// ============================================================================

async fn start_demo_server() -> SocketAddr {
    let hook = RpcHandler::new(HandlerOptions::<()>::new("/rpc")).hook(demo::router());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(HttpServer::new(hook).serve(listener));
    addr
}

fn request(addr: SocketAddr, path: &str, args: Vec<Value>, later: bool) -> CallRequest {
    CallRequest {
        url: format!("http://{}/rpc", addr),
        path: path.to_string(),
        args,
        later,
        headers: Vec::new(),
    }
}

/// Runs a call and returns the settled state plus the printed lines.
async fn run(request: CallRequest) -> (CallResult, Vec<Value>) {
    let mut out = Vec::new();
    let settled = call::run(request, &mut out).await.unwrap();
    let lines = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    (settled, lines)
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_call_now_prints_loading_then_success() {
    let addr = start_demo_server().await;
    let args = vec![json!(1), json!("a")];
    let (settled, lines) = run(request(addr, "system.echo", args, false)).await;

    assert_eq!(settled, CallResult::Success(json!([1, "a"])));
    assert_eq!(
        lines,
        vec![
            json!({"loading": true, "success": false, "error": false, "response": null}),
            json!({"loading": false, "success": true, "error": false, "response": [1, "a"]}),
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_call_always_prints_settled_line_on_multi_thread_runtime() {
    let addr = start_demo_server().await;
    for _ in 0..50 {
        let (settled, lines) = run(request(addr, "system.ping", vec![], false)).await;
        assert_eq!(settled, CallResult::Success(json!("pong")));
        let last = lines.last().unwrap();
        assert_eq!(last["success"], json!(true));
        assert_eq!(last["response"], json!("pong"));
    }
}

#[tokio::test]
async fn test_call_later_triggers_once() {
    let addr = start_demo_server().await;
    let (settled, lines) = run(request(addr, "system.ping", vec![], true)).await;

    assert_eq!(settled, CallResult::Success(json!("pong")));
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["loading"], json!(true));
    assert_eq!(lines[1]["response"], json!("pong"));
}

#[tokio::test]
async fn test_call_failure_is_reported_not_raised() {
    let addr = start_demo_server().await;
    let (settled, lines) = run(request(addr, "system.fail", vec![json!("nope")], false)).await;

    assert!(settled.is_failure());
    let last = lines.last().unwrap();
    assert_eq!(last["success"], json!(false));
    assert_eq!(last["error"]["message"], json!("nope"));
    assert_eq!(last["error"]["data"]["code"], json!("BAD_REQUEST"));
}

#[tokio::test]
async fn test_call_unknown_procedure_fails() {
    let addr = start_demo_server().await;
    let (settled, _lines) = run(request(addr, "system.missing", vec![], false)).await;

    let error = settled.error().unwrap();
    assert_eq!(error["data"]["httpStatus"], json!(404));
}

#[tokio::test]
async fn test_call_rejects_single_segment_path() {
    let addr = start_demo_server().await;
    let mut out = Vec::new();
    let result = call::run(request(addr, "ping", vec![], false), &mut out).await;

    assert!(result.is_err());
    assert!(out.is_empty());
}
