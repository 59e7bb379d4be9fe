//! Test utilities for misty-client
//!
//! [`MockRobot`] is an in-process stand-in for the robot: it serves
//! `/api/*` with canned responses, records every request, and runs a
//! `/pubsub` WebSocket endpoint that acknowledges subscriptions and relays
//! frames pushed by the test.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::Router;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::debug;

use crate::config::ClientConfig;
use crate::{MistyClient, Result};

/// One REST call as the mock robot saw it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    /// Path below `/api/`, e.g. "drive/time"
    pub path: String,
    pub query: Option<String>,
    pub content_type: Option<String>,
    /// Body parsed as JSON, `Null` if empty or not JSON
    pub json: Value,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone)]
struct CannedResponse {
    status: StatusCode,
    body: String,
}

/// Frame queued for delivery; `None` target means every open socket
#[derive(Debug, Clone)]
enum PushedFrame {
    Text {
        target: Option<String>,
        text: String,
    },
    Close,
}

struct MockState {
    requests: Mutex<Vec<RecordedRequest>>,
    responses: Mutex<HashMap<(Method, String), CannedResponse>>,
    control_frames: Mutex<Vec<Value>>,
    acknowledge: Mutex<bool>,
    frames: broadcast::Sender<PushedFrame>,
}

/// A mock robot that shuts down when dropped
pub struct MockRobot {
    pub addr: SocketAddr,
    state: Arc<MockState>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl MockRobot {
    /// Bind to a free local port and start serving
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (frames, _) = broadcast::channel(64);
        let state = Arc::new(MockState {
            requests: Mutex::new(Vec::new()),
            responses: Mutex::new(HashMap::new()),
            control_frames: Mutex::new(Vec::new()),
            acknowledge: Mutex::new(true),
            frames,
        });

        let router = Router::new()
            .route("/api/{*path}", any(api_handler))
            .route("/pubsub", get(ws_handler))
            .with_state(state.clone());

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        Ok(Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Address to hand to `MistyClient::new`
    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    /// A fresh client pointed at this robot, with short timeouts
    pub fn client(&self) -> Result<MistyClient> {
        let mut config = ClientConfig::new(self.address());
        config.timeout_ms = 5_000;
        config.connect_timeout_ms = 2_000;
        MistyClient::with_config(config)
    }

    /// Answer `method path` with a success envelope around `result`
    pub fn respond(&self, method: Method, path: &str, result: Value) {
        let body = json!({"status": "Success", "result": result}).to_string();
        self.respond_raw(method, path, StatusCode::OK, body);
    }

    /// Answer `method path` with an exact status and body
    pub fn respond_raw(
        &self,
        method: Method,
        path: &str,
        status: StatusCode,
        body: impl Into<String>,
    ) {
        self.state.responses.lock().insert(
            (method, path.to_string()),
            CannedResponse {
                status,
                body: body.into(),
            },
        );
    }

    /// Every REST call received so far, oldest first
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }

    /// Most recent REST call to `path`
    pub fn last_request(&self, path: &str) -> Option<RecordedRequest> {
        self.state
            .requests
            .lock()
            .iter()
            .rev()
            .find(|r| r.path == path)
            .cloned()
    }

    /// Subscribe/unsubscribe frames received over WebSocket, oldest first
    pub fn control_frames(&self) -> Vec<Value> {
        self.state.control_frames.lock().clone()
    }

    /// Stop acknowledging new subscriptions; sockets close instead
    pub fn reject_subscriptions(&self) {
        *self.state.acknowledge.lock() = false;
    }

    /// Send `message` to the socket subscribed as `event_name`, wrapped in
    /// the robot's `{"eventName", "message"}` envelope
    pub fn push_event(&self, event_name: &str, message: Value) {
        let text = json!({"eventName": event_name, "message": message}).to_string();
        let _ = self.state.frames.send(PushedFrame::Text {
            target: Some(event_name.to_string()),
            text,
        });
    }

    /// Send `text` unchanged to every open socket
    pub fn push_raw(&self, text: impl Into<String>) {
        let _ = self.state.frames.send(PushedFrame::Text {
            target: None,
            text: text.into(),
        });
    }

    /// Close every open event socket from the robot's side
    pub fn close_sockets(&self) {
        let _ = self.state.frames.send(PushedFrame::Close);
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for MockRobot {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn api_handler(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().trim_start_matches("/api/").to_string();
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    state.requests.lock().push(RecordedRequest {
        method: method.clone(),
        path: path.clone(),
        query: uri.query().map(String::from),
        content_type,
        json: serde_json::from_slice(&body).unwrap_or(Value::Null),
        body: body.to_vec(),
    });

    let canned = state.responses.lock().get(&(method, path)).cloned();
    match canned {
        Some(canned) => (
            canned.status,
            [(header::CONTENT_TYPE, "application/json")],
            canned.body,
        )
            .into_response(),
        None => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            json!({"status": "Success", "result": true}).to_string(),
        )
            .into_response(),
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<MockState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<MockState>) {
    // Listen before acknowledging so no pushed frame can slip past.
    let mut frames = state.frames.subscribe();

    let event_name = loop {
        match socket.recv().await {
            Some(Ok(Message::Text(text))) => {
                let frame: Value = serde_json::from_str(text.as_str()).unwrap_or(Value::Null);
                let name = frame
                    .get("EventName")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                state.control_frames.lock().push(frame);
                break name;
            }
            Some(Ok(_)) => continue,
            _ => return,
        }
    };

    if !*state.acknowledge.lock() {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    let ack = json!({
        "eventName": event_name,
        "message": format!("Registration Status: API event registered: {}", event_name),
    });
    if socket.send(Message::Text(ack.to_string().into())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let frame: Value = serde_json::from_str(text.as_str()).unwrap_or(Value::Null);
                    state.control_frames.lock().push(frame);
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
            pushed = frames.recv() => match pushed {
                Ok(PushedFrame::Text { target, text }) => {
                    let wanted = target.as_deref().map_or(true, |t| t == event_name);
                    if wanted && socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Ok(PushedFrame::Close) => {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    debug!("Mock socket for {} closed", event_name);
}

/// Wait for a condition with timeout
pub async fn wait_for<F, Fut>(condition: F, timeout: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;

    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    false
}
