//! In-process mock of the portfolio analysis server.
//!
//! Serves the REST endpoints and the `/ws/{user_id}` push endpoint on
//! `127.0.0.1:0`. Each started task follows the server-wide [`Behaviour`].

#![allow(dead_code)]

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

pub const KNOWN_TYPES: [&str; 4] = ["stocks", "bonds", "crypto", "real_estate"];

/// How the mock drives every task it starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Behaviour {
    /// Progress steps over push, then a completed message carrying the result.
    Complete { value: f64 },
    /// Progress over REST only; push stays silent.
    RestOnly { value: f64 },
    /// A push `completed` without a result; REST keeps saying processing.
    MalformedPush,
    /// Never reaches a terminal state.
    Stall,
    /// Fails after one progress step.
    Fail,
}

#[derive(Debug, Clone)]
struct TaskEntry {
    user_id: String,
    status: &'static str,
    processed: u64,
    total: u64,
    pct: f64,
    step: String,
    value: f64,
}

impl TaskEntry {
    fn status_body(&self, task_id: &str) -> Value {
        json!({
            "task_id": task_id,
            "status": self.status,
            "processed_items": self.processed,
            "total_items": self.total,
            "progress_percentage": self.pct,
            "current_step": self.step,
        })
    }

    fn result_body(&self) -> Value {
        json!({
            "total_portfolio_value": self.value,
            "processing_summary": {"processing_time": "0.4 seconds"},
        })
    }
}

pub struct MockState {
    behaviour: Mutex<Behaviour>,
    tasks: Mutex<HashMap<String, TaskEntry>>,
    sockets: Mutex<HashMap<String, mpsc::UnboundedSender<String>>>,
    next_task: AtomicUsize,
    step_delay: Duration,
    pub pings: AtomicUsize,
    pub status_requests: AtomicUsize,
    pub client_closes: AtomicUsize,
    pub connections: AtomicUsize,
}

impl MockState {
    fn push_to(&self, user_id: &str, message: Value) {
        if let Some(tx) = self.sockets.lock().unwrap().get(user_id) {
            let _ = tx.send(message.to_string());
        }
    }

    fn update(&self, task_id: &str, f: impl FnOnce(&mut TaskEntry)) -> Option<TaskEntry> {
        let mut tasks = self.tasks.lock().unwrap();
        let entry = tasks.get_mut(task_id)?;
        f(entry);
        Some(entry.clone())
    }
}

pub struct MockServer {
    pub base_url: String,
    pub state: Arc<MockState>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockServer {
    /// Start the server, or `None` when the sandbox forbids binding.
    pub async fn start(behaviour: Behaviour) -> Option<Self> {
        let listener = match TcpListener::bind("127.0.0.1:0").await {
            Ok(listener) => listener,
            Err(e) => {
                eprintln!("Skipping test (sandbox, cannot bind): {e}");
                return None;
            }
        };
        let addr = listener.local_addr().ok()?;

        let state = Arc::new(MockState {
            behaviour: Mutex::new(behaviour),
            tasks: Mutex::new(HashMap::new()),
            sockets: Mutex::new(HashMap::new()),
            next_task: AtomicUsize::new(1),
            step_delay: Duration::from_millis(60),
            pings: AtomicUsize::new(0),
            status_requests: AtomicUsize::new(0),
            client_closes: AtomicUsize::new(0),
            connections: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/", get(health))
            .route("/api/portfolio/analyze", post(analyze))
            .route("/api/portfolio/status/{task_id}", get(status))
            .route("/api/portfolio/result/{task_id}", get(result))
            .route("/ws/{user_id}", get(ws_handler))
            .with_state(state.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                eprintln!("Mock server error: {}", e);
            }
        });

        Some(Self {
            base_url: format!("http://{}", addr),
            state,
            shutdown: Some(shutdown_tx),
        })
    }

    pub fn url(&self) -> reqwest::Url {
        reqwest::Url::parse(&self.base_url).unwrap()
    }

    pub fn set_behaviour(&self, behaviour: Behaviour) {
        *self.state.behaviour.lock().unwrap() = behaviour;
    }

    /// Wait until `counter` reaches `expected`, up to two seconds.
    pub async fn wait_for(&self, counter: &AtomicUsize, expected: usize) -> usize {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while counter.load(Ordering::SeqCst) < expected && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        counter.load(Ordering::SeqCst)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// A base URL nothing listens on.
pub async fn unused_base_url() -> Option<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await.ok()?;
    let addr = listener.local_addr().ok()?;
    drop(listener);
    Some(format!("http://{}", addr))
}

// ── REST handlers ────────────────────────────────────────────────────

#[derive(Deserialize)]
struct AnalyzeRequest {
    user_id: String,
    portfolio_types: Vec<String>,
    #[allow(dead_code)]
    calculation_type: String,
}

async fn health() -> Json<Value> {
    Json(json!({"message": "Portfolio analysis server is running"}))
}

fn detail(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({"detail": detail}))).into_response()
}

async fn analyze(State(state): State<Arc<MockState>>, Json(req): Json<AnalyzeRequest>) -> Response {
    if let Some(bad) = req
        .portfolio_types
        .iter()
        .find(|t| !KNOWN_TYPES.contains(&t.as_str()))
    {
        return detail(
            StatusCode::BAD_REQUEST,
            &format!("Invalid portfolio type: {bad}"),
        );
    }

    let n = state.next_task.fetch_add(1, Ordering::SeqCst);
    let task_id = format!("task-{n}");
    let behaviour = *state.behaviour.lock().unwrap();
    let value = match behaviour {
        Behaviour::Complete { value } | Behaviour::RestOnly { value } => value,
        _ => 0.0,
    };
    state.tasks.lock().unwrap().insert(
        task_id.clone(),
        TaskEntry {
            user_id: req.user_id.clone(),
            status: "initializing",
            processed: 0,
            total: req.portfolio_types.len() as u64,
            pct: 0.0,
            step: "Queued".into(),
            value,
        },
    );

    tokio::spawn(drive_task(
        state.clone(),
        task_id.clone(),
        req.portfolio_types.clone(),
        behaviour,
    ));

    Json(json!({
        "task_id": task_id,
        "websocket_url": format!("/ws/{}", req.user_id),
        "status": "started",
        "message": "Portfolio analysis started",
    }))
    .into_response()
}

async fn status(State(state): State<Arc<MockState>>, Path(task_id): Path<String>) -> Response {
    match state.tasks.lock().unwrap().get(&task_id) {
        Some(entry) => Json(entry.status_body(&task_id)).into_response(),
        None => detail(StatusCode::NOT_FOUND, "Task not found"),
    }
}

async fn result(State(state): State<Arc<MockState>>, Path(task_id): Path<String>) -> Response {
    match state.tasks.lock().unwrap().get(&task_id) {
        Some(entry) if entry.status == "completed" => Json(entry.result_body()).into_response(),
        Some(_) => detail(StatusCode::BAD_REQUEST, "Task not completed yet"),
        None => detail(StatusCode::NOT_FOUND, "Task not found"),
    }
}

async fn drive_task(
    state: Arc<MockState>,
    task_id: String,
    types: Vec<String>,
    behaviour: Behaviour,
) {
    let total = types.len() as u64;
    let push = !matches!(behaviour, Behaviour::RestOnly { .. });

    for (i, t) in types.iter().enumerate() {
        tokio::time::sleep(state.step_delay).await;
        let Some(entry) = state.update(&task_id, |e| {
            e.status = "processing";
            e.processed = i as u64 + 1;
            e.pct = (i as f64 + 1.0) / (total as f64 + 1.0) * 100.0;
            e.step = format!("Analyzing {t}");
        }) else {
            return;
        };
        if push {
            state.push_to(&entry.user_id, entry.status_body(&task_id));
        }
        if behaviour == Behaviour::Fail {
            let Some(entry) = state.update(&task_id, |e| {
                e.status = "failed";
                e.step = "Market data provider unavailable".into();
            }) else {
                return;
            };
            state.push_to(&entry.user_id, entry.status_body(&task_id));
            return;
        }
    }

    tokio::time::sleep(state.step_delay).await;
    match behaviour {
        Behaviour::Complete { .. } | Behaviour::RestOnly { .. } => {
            let Some(entry) = state.update(&task_id, |e| {
                e.status = "completed";
                e.pct = 100.0;
                e.step = "Analysis complete".into();
            }) else {
                return;
            };
            if push {
                let mut body = entry.status_body(&task_id);
                body["data"] = entry.result_body();
                state.push_to(&entry.user_id, body);
            }
        }
        Behaviour::MalformedPush => {
            let Some(entry) = state.update(&task_id, |_| {}) else {
                return;
            };
            state.push_to(
                &entry.user_id,
                json!({
                    "task_id": task_id,
                    "status": "completed",
                    "progress_percentage": 100.0,
                    "current_step": "Analysis complete",
                }),
            );
        }
        Behaviour::Stall | Behaviour::Fail => {}
    }
}

// ── Push endpoint ────────────────────────────────────────────────────

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<MockState>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
}

async fn handle_socket(socket: WebSocket, state: Arc<MockState>, user_id: String) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    state.sockets.lock().unwrap().insert(user_id.clone(), tx);
    state.connections.fetch_add(1, Ordering::SeqCst);

    let (mut sender, mut receiver) = socket.split();
    loop {
        tokio::select! {
            outgoing = rx.recv() => match outgoing {
                Some(text) => {
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let Ok(value) = serde_json::from_str::<Value>(text.as_str()) else {
                        continue;
                    };
                    match value.get("type").and_then(Value::as_str) {
                        Some("ping") => {
                            state.pings.fetch_add(1, Ordering::SeqCst);
                            let pong = json!({"type": "pong", "timestamp": "2024-01-01T00:00:00"});
                            if sender.send(Message::Text(pong.to_string().into())).await.is_err() {
                                break;
                            }
                        }
                        Some("get_status") => {
                            state.status_requests.fetch_add(1, Ordering::SeqCst);
                            let task_id = value.get("task_id").and_then(Value::as_str).unwrap_or_default();
                            let body = state
                                .tasks
                                .lock()
                                .unwrap()
                                .get(task_id)
                                .map(|e| e.status_body(task_id));
                            if let Some(body) = body
                                && sender.send(Message::Text(body.to_string().into())).await.is_err()
                            {
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    state.client_closes.fetch_add(1, Ordering::SeqCst);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => break,
            },
        }
    }

    state.sockets.lock().unwrap().remove(&user_id);
}
