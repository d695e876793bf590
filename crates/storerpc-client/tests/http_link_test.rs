//! HTTP Link Integration Tests
//!
//! These tests run a small JSON-RPC server on a random loopback port and
//! verify that the store client:
//! - posts to `<url>/<dotted.path>` with positional params
//! - turns results into `Success` and JSON-RPC errors into `Failure`
//! - reports unreachable servers and non-JSON replies as `Failure`
//! - forwards configured headers

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storerpc_client::{CallResult, ClientOptions, Interceptors, StoreClient};
use storerpc_common::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use tokio::net::TcpListener;

/// What the test server saw for one request.
#[derive(Debug, Clone)]
struct Seen {
    uri: String,
    method: String,
    params: Value,
    header: Option<String>,
}

/// Test JSON-RPC server that runs on a separate task
struct TestServer {
    addr: String,
    seen: Arc<Mutex<Vec<Seen>>>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Starts a server answering every request with `reply(method, params)`.
    async fn new<F>(reply: F) -> Self
    where
        F: Fn(&str, &Value) -> (StatusCode, Vec<u8>) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let reply = Arc::new(reply);

        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel();

        let log = Arc::clone(&seen);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        let Ok((stream, _)) = result else { continue };
                        let io = TokioIo::new(stream);
                        let reply = Arc::clone(&reply);
                        let log = Arc::clone(&log);

                        tokio::spawn(async move {
                            let service = service_fn(move |req: Request<Incoming>| {
                                let reply = Arc::clone(&reply);
                                let log = Arc::clone(&log);
                                async move {
                                    let uri = req.uri().path().to_string();
                                    let header = req
                                        .headers()
                                        .get("x-client")
                                        .and_then(|v| v.to_str().ok())
                                        .map(str::to_string);
                                    let body = req.into_body().collect().await.unwrap().to_bytes();
                                    let request: JsonRpcRequest =
                                        serde_json::from_slice(&body).unwrap();

                                    log.lock().unwrap().push(Seen {
                                        uri,
                                        method: request.method.clone(),
                                        params: request.params.clone(),
                                        header,
                                    });

                                    let (status, body) = reply(&request.method, &request.params);
                                    Ok::<_, hyper::Error>(
                                        Response::builder()
                                            .status(status)
                                            .header("Content-Type", "application/json")
                                            .body(Full::new(Bytes::from(body)))
                                            .unwrap(),
                                    )
                                }
                            });

                            let _ = http1::Builder::new().serve_connection(io, service).await;
                        });
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
        });

        Self {
            addr,
            seen,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Server that echoes `{"method": .., "params": ..}` back as the result.
    async fn echo() -> Self {
        Self::new(|method, params| {
            let response =
                JsonRpcResponse::success(json!(1), json!({"method": method, "params": params}));
            (StatusCode::OK, serde_json::to_vec(&response).unwrap())
        })
        .await
    }

    fn base_url(&self) -> String {
        format!("http://{}/rpc", self.addr)
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn settle<T: Clone + Send + 'static>(
    store: &storerpc_client::Store<CallResult<T>>,
) -> CallResult<T> {
    tokio::time::timeout(Duration::from_secs(5), store.wait_for(|s| s.is_settled()))
        .await
        .expect("call did not settle")
}

// ============================================================================
// Success paths
// ============================================================================

#[tokio::test]
async fn test_now_posts_to_dotted_path() {
    let server = TestServer::echo().await;
    let client = StoreClient::http(ClientOptions::new().url(server.base_url())).unwrap();

    let store = client.path("user.get").now(vec![json!(42)]).unwrap();
    let state = settle(&store).await;

    assert_eq!(
        state,
        CallResult::Success(json!({"method": "user.get", "params": [42]}))
    );

    let seen = server.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].uri, "/rpc/user.get");
    assert_eq!(seen[0].method, "user.get");
    assert_eq!(seen[0].params, json!([42]));
}

#[tokio::test]
async fn test_typed_procedure_over_http() {
    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Echo {
        method: String,
        params: Vec<Value>,
    }

    let server = TestServer::echo().await;
    let client = StoreClient::http(ClientOptions::new().url(server.base_url())).unwrap();

    let update = client
        .procedure::<(u64, String), Echo>("user.profile.update")
        .unwrap();
    let state = settle(&update.now((7, "x".to_string()))).await;

    assert_eq!(
        state.response(),
        Some(&Echo {
            method: "user.profile.update".into(),
            params: vec![json!(7), json!("x")],
        })
    );
}

#[tokio::test]
async fn test_later_triggers_one_request_per_call() {
    let server = TestServer::echo().await;
    let client = StoreClient::http(ClientOptions::new().url(server.base_url())).unwrap();

    let store = client.path("counter.add").later().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(server.seen().is_empty());

    let trigger = store.get().call;
    trigger.call(vec![json!(1)]);
    store.wait_for(|s| s.is_settled()).await;
    trigger.call(vec![json!(2)]);
    store
        .wait_for(|s| s.response().map(|r| r["params"] == json!([2])).unwrap_or(false))
        .await;

    assert_eq!(server.seen().len(), 2);
    assert!(store.get().call.ptr_eq(&trigger));
}

#[tokio::test]
async fn test_headers_are_forwarded() {
    let server = TestServer::echo().await;
    let client = StoreClient::http(
        ClientOptions::new()
            .url(server.base_url())
            .header("x-client", "store-test"),
    )
    .unwrap();

    settle(&client.path("a.b").now(vec![]).unwrap()).await;
    assert_eq!(server.seen()[0].header.as_deref(), Some("store-test"));
}

// ============================================================================
// Failure paths
// ============================================================================

#[tokio::test]
async fn test_jsonrpc_error_becomes_failure() {
    let server = TestServer::new(|_, _| {
        let response = JsonRpcResponse::error(json!(1), JsonRpcError::method_not_found());
        (StatusCode::NOT_FOUND, serde_json::to_vec(&response).unwrap())
    })
    .await;
    let client = StoreClient::http(ClientOptions::new().url(server.base_url())).unwrap();

    let state = settle(&client.path("user.delete").now(vec![]).unwrap()).await;
    let error = state.error().unwrap();
    assert_eq!(error["code"], json!(-32601));
    assert_eq!(error["message"], json!("Method not found"));
}

#[tokio::test]
async fn test_non_json_reply_becomes_failure() {
    let server = TestServer::new(|_, _| (StatusCode::BAD_GATEWAY, b"upstream down".to_vec())).await;
    let client = StoreClient::http(ClientOptions::new().url(server.base_url())).unwrap();

    let state = settle(&client.path("user.get").now(vec![]).unwrap()).await;
    let message = state.error().unwrap()["message"].as_str().unwrap().to_string();
    assert!(message.contains("502"), "unexpected message: {}", message);
}

#[tokio::test]
async fn test_unreachable_server_becomes_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = StoreClient::http(ClientOptions::new().url(format!("http://{}", addr))).unwrap();
    let state = settle(&client.path("user.get").now(vec![]).unwrap()).await;
    assert!(state.is_failure());
}

#[tokio::test]
async fn test_error_hook_sees_remote_error() {
    let server = TestServer::new(|_, _| {
        let response = JsonRpcResponse::error(json!(1), JsonRpcError::invalid_params("bad id"));
        (StatusCode::BAD_REQUEST, serde_json::to_vec(&response).unwrap())
    })
    .await;
    let interceptors = Interceptors::new()
        .on_error(|error, path| async move {
            Ok(json!(format!("{} failed: {}", path, error["message"])))
        });
    let client = StoreClient::http(
        ClientOptions::new()
            .url(server.base_url())
            .interceptors(interceptors),
    )
    .unwrap();

    let state = settle(&client.path("user.get").now(vec![json!("x")]).unwrap()).await;
    assert_eq!(
        state,
        CallResult::Failure(json!("user.get failed: \"bad id\""))
    );
}
