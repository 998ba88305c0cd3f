//! Fake coordinator and Ethereum node for integration tests

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// Canned behaviour of the fake backend.
#[derive(Clone)]
pub struct Script {
    pub configs_status: StatusCode,
    pub configs_body: String,
    pub send_status: StatusCode,
    pub balance_wei: u128,
    /// Raw frames written at the start of every `/sse` connection
    pub sse_frames: Vec<String>,
    /// End the `/sse` response after the scripted frames
    pub sse_close_after_script: bool,
    /// Abort the `/sse` body with an error after the scripted frames
    pub sse_fail_after_script: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            configs_status: StatusCode::OK,
            configs_body: json!([
                {"address": "0x1111111111111111111111111111111111111111", "sessionId": "1", "participants": ["a", "b", "c"]}
            ])
            .to_string(),
            send_status: StatusCode::OK,
            balance_wei: 0,
            sse_frames: Vec::new(),
            sse_close_after_script: false,
            sse_fail_after_script: false,
        }
    }
}

pub struct AppState {
    script: Script,
    calls: Mutex<Vec<String>>,
    sse_connected_at: Mutex<Vec<Instant>>,
    live: broadcast::Sender<String>,
}

impl AppState {
    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }
}

pub struct FakeBackend {
    pub addr: SocketAddr,
    state: Arc<AppState>,
}

#[allow(dead_code)]
impl FakeBackend {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn rpc_url(&self) -> String {
        format!("http://{}/rpc", self.addr)
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    /// Time between consecutive `/sse` connections.
    pub fn sse_gaps(&self) -> Vec<Duration> {
        let times = self.state.sse_connected_at.lock().unwrap();
        times.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Pushes a frame to every open `/sse` connection.
    pub fn push(&self, frame: &str) {
        let _ = self.state.live.send(frame.to_string());
    }

    pub fn push_event(&self, event: Value) {
        self.push(&format!("data: {}\n\n", event));
    }
}

pub async fn spawn_backend(script: Script) -> FakeBackend {
    let (live, _) = broadcast::channel(64);
    let state = Arc::new(AppState {
        script,
        calls: Mutex::new(Vec::new()),
        sse_connected_at: Mutex::new(Vec::new()),
        live,
    });

    let app = Router::new()
        .route("/configs", get(configs))
        .route("/online", get(online))
        .route("/keys/generate", post(generate))
        .route("/keys/refresh", post(refresh))
        .route("/sendeth", post(send_eth))
        .route("/sse", get(sse))
        .route("/rpc", post(rpc))
        .with_state(Arc::clone(&state));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    FakeBackend { addr, state }
}

/// Polls `condition` until it holds or five seconds pass.
#[allow(dead_code)]
pub async fn wait_until<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

async fn configs(State(state): State<Arc<AppState>>) -> Response {
    state.record("GET /configs");
    (
        state.script.configs_status,
        [(header::CONTENT_TYPE, "application/json")],
        state.script.configs_body.clone(),
    )
        .into_response()
}

async fn online(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.record("GET /online");
    Json(json!({"a": true, "b": false}))
}

async fn generate(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.record("POST /keys/generate");
    Json(json!({
        "address": "0x2222222222222222222222222222222222222222",
        "sessionId": "new-session",
        "participants": ["a", "b", "c"]
    }))
}

async fn refresh(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> Json<Value> {
    state.record("POST /keys/refresh");
    Json(json!({
        "address": body["address"],
        "sessionId": "refreshed",
        "participants": ["a", "b", "c"]
    }))
}

async fn send_eth(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> Response {
    state.record("POST /sendeth");
    if state.script.send_status != StatusCode::OK {
        return (state.script.send_status, Json(json!("insufficient signers"))).into_response();
    }
    // echo the amount so tests can check the wei conversion
    Json(json!(format!("0xtx-{}", body["amount"].as_str().unwrap_or("?")))).into_response()
}

async fn rpc(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> Json<Value> {
    state.record("POST /rpc");
    Json(json!({
        "jsonrpc": "2.0",
        "id": body["id"],
        "result": format!("0x{:x}", state.script.balance_wei)
    }))
}

async fn sse(State(state): State<Arc<AppState>>) -> Response {
    // subscribe before recording so pushes after the call is visible are not lost
    let rx = state.live.subscribe();
    state.sse_connected_at.lock().unwrap().push(Instant::now());
    state.record("GET /sse");

    let scripted = futures::stream::iter(
        state
            .script
            .sse_frames
            .clone()
            .into_iter()
            .map(Ok::<_, Infallible>),
    );

    let body = if state.script.sse_fail_after_script {
        let failing = scripted
            .map(|frame| Ok::<_, io::Error>(frame.unwrap_or_default()))
            .chain(futures::stream::once(async {
                // let the scripted frames reach the client before the reset
                tokio::time::sleep(Duration::from_millis(20)).await;
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "stream reset"))
            }));
        Body::from_stream(failing)
    } else if state.script.sse_close_after_script {
        Body::from_stream(scripted)
    } else {
        let live = futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(frame) => return Some((Ok::<_, Infallible>(frame), rx)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Body::from_stream(scripted.chain(live))
    };

    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .body(body)
        .unwrap()
}
