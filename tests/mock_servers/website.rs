//! Mock association website for testing
//!
//! Serves the JSON-RPC endpoint at /api/, the room page's REST endpoints,
//! the do-group data, the POS form endpoints and PNG images.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use image::ImageEncoder;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

const SESSION_COOKIE: &str = "sessionid=kiosk-session";

/// What an RPC method answers
#[derive(Debug, Clone)]
pub enum RpcAnswer {
    Result(Value),
    Error(String),
    /// Neither `result` nor `error`
    Empty,
}

#[derive(Default)]
struct MockWebsiteState {
    rpc_answers: HashMap<String, RpcAnswer>,
    rpc_calls: Vec<(String, Value)>,
    rpc_status: Option<StatusCode>,
    pcs: HashMap<String, String>,
    now_playing: HashMap<String, Value>,
    controls: Vec<String>,
    dogroups: Value,
    login_tags: Vec<String>,
    login_error: Option<String>,
    checkouts: Vec<String>,
    free_cookie: bool,
    logouts: Vec<HashMap<String, String>>,
    images: HashMap<String, (u32, u32)>,
}

type SharedState = Arc<RwLock<MockWebsiteState>>;

/// Mock website
pub struct MockWebsite {
    addr: SocketAddr,
    state: SharedState,
    handle: JoinHandle<()>,
}

impl MockWebsite {
    /// Start a mock website on a random port
    pub async fn start() -> Self {
        let state: SharedState = Arc::new(RwLock::new(MockWebsiteState {
            dogroups: json!({"dogroups": [], "years": [], "data": {}}),
            ..Default::default()
        }));

        let app = Router::new()
            .route("/api/", post(handle_jsonrpc))
            .route("/narrowcasting/room/pc_status", get(handle_pc_status))
            .route("/narrowcasting/room/spotify/", get(handle_now_playing))
            .route("/narrowcasting/room/{action}/", get(handle_control))
            .route("/members/dogroups/data", get(handle_dogroups))
            .route("/personal_tab/pos/process_rfid/", post(handle_rfid_login))
            .route("/personal_tab/pos/verify/", get(handle_login_status))
            .route("/personal_tab/pos/shop/", post(handle_checkout))
            .route("/personal_tab/pos/user_logout/", get(handle_logout))
            .route("/images/{name}", get(handle_image))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// Get the server address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn set_rpc_answer(&self, method: &str, answer: RpcAnswer) {
        let mut state = self.state.write().await;
        state.rpc_answers.insert(method.to_string(), answer);
    }

    /// Answer every RPC call with this HTTP status
    pub async fn set_rpc_status(&self, status: StatusCode) {
        self.state.write().await.rpc_status = Some(status);
    }

    /// (method, params) of every RPC call so far
    pub async fn rpc_calls(&self) -> Vec<(String, Value)> {
        self.state.read().await.rpc_calls.clone()
    }

    pub async fn set_pc(&self, host: &str, status: &str) {
        let mut state = self.state.write().await;
        state.pcs.insert(host.to_string(), status.to_string());
    }

    /// Link a Spotify identifier; unknown identifiers answer 404
    pub async fn set_now_playing(&self, identifier: &str, answer: Value) {
        let mut state = self.state.write().await;
        state.now_playing.insert(identifier.to_string(), answer);
    }

    /// `"<action>:<id>"` of every pause/play request
    pub async fn controls(&self) -> Vec<String> {
        self.state.read().await.controls.clone()
    }

    pub async fn set_dogroups(&self, data: Value) {
        self.state.write().await.dogroups = data;
    }

    pub async fn login_tags(&self) -> Vec<String> {
        self.state.read().await.login_tags.clone()
    }

    pub async fn set_login_error(&self, message: &str) {
        self.state.write().await.login_error = Some(message.to_string());
    }

    pub async fn checkouts(&self) -> Vec<String> {
        self.state.read().await.checkouts.clone()
    }

    pub async fn set_free_cookie(&self, winner: bool) {
        self.state.write().await.free_cookie = winner;
    }

    pub async fn logouts(&self) -> Vec<HashMap<String, String>> {
        self.state.read().await.logouts.clone()
    }

    /// Serve a blank PNG at /images/{name}
    pub async fn add_image(&self, name: &str, width: u32, height: u32) {
        let mut state = self.state.write().await;
        state.images.insert(name.to_string(), (width, height));
    }

    /// Stop the mock server
    pub async fn stop(self) {
        self.handle.abort();
    }
}

/// JSON-RPC request format
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

async fn handle_jsonrpc(
    State(state): State<SharedState>,
    Json(req): Json<JsonRpcRequest>,
) -> Response {
    let mut state = state.write().await;
    state.rpc_calls.push((req.method.clone(), req.params.clone()));

    if let Some(status) = state.rpc_status {
        return (status, "backend exploded").into_response();
    }

    let body = match state.rpc_answers.get(&req.method) {
        Some(RpcAnswer::Result(result)) => json!({"jsonrpc": "2.0", "id": req.id, "result": result}),
        Some(RpcAnswer::Error(message)) => json!({
            "jsonrpc": "2.0",
            "id": req.id,
            "error": {"code": -32000, "message": message}
        }),
        Some(RpcAnswer::Empty) => json!({"jsonrpc": "2.0", "id": req.id}),
        None => json!({
            "jsonrpc": "2.0",
            "id": req.id,
            "error": {"code": -32601, "message": "Method not found"}
        }),
    };
    Json(body).into_response()
}

async fn handle_pc_status(State(state): State<SharedState>) -> Json<HashMap<String, String>> {
    Json(state.read().await.pcs.clone())
}

async fn handle_now_playing(
    State(state): State<SharedState>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let state = state.read().await;
    let answer = query.get("id").and_then(|id| state.now_playing.get(id));
    match answer {
        Some(answer) => Json(answer.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, "not associated").into_response(),
    }
}

async fn handle_control(
    State(state): State<SharedState>,
    Path(action): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> StatusCode {
    if action != "pause_spotify" && action != "play_spotify" {
        return StatusCode::NOT_FOUND;
    }
    let id = query.get("id").cloned().unwrap_or_default();
    state.write().await.controls.push(format!("{}:{}", action, id));
    StatusCode::OK
}

async fn handle_dogroups(State(state): State<SharedState>) -> Json<Value> {
    Json(state.read().await.dogroups.clone())
}

#[derive(Deserialize)]
struct LoginForm {
    tags: String,
}

async fn handle_rfid_login(
    State(state): State<SharedState>,
    Form(form): Form<LoginForm>,
) -> Response {
    let tags: Vec<String> = serde_json::from_str(&form.tags).unwrap_or_default();
    state.write().await.login_tags = tags;
    (
        [(header::SET_COOKIE, format!("{}; Path=/", SESSION_COOKIE))],
        "<html>Scan accepted</html>",
    )
        .into_response()
}

async fn handle_login_status(State(state): State<SharedState>, headers: HeaderMap) -> Json<Value> {
    let has_session = headers
        .get(header::COOKIE)
        .and_then(|c| c.to_str().ok())
        .is_some_and(|c| c.contains(SESSION_COOKIE));
    let state = state.read().await;

    if let Some(message) = &state.login_error {
        return Json(json!({"error": true, "message": message, "status": false}));
    }
    Json(json!({"error": false, "message": "", "status": has_session}))
}

#[derive(Deserialize)]
struct CheckoutForm {
    cart: String,
}

async fn handle_checkout(
    State(state): State<SharedState>,
    Form(form): Form<CheckoutForm>,
) -> Response {
    let mut state = state.write().await;
    state.checkouts.push(form.cart);
    let body_class = if state.free_cookie {
        "free-cookie-winner"
    } else {
        "receipt"
    };
    format!(r#"<html><body class="{}">Thanks!</body></html>"#, body_class).into_response()
}

async fn handle_logout(
    State(state): State<SharedState>,
    Query(query): Query<HashMap<String, String>>,
) -> StatusCode {
    state.write().await.logouts.push(query);
    StatusCode::OK
}

async fn handle_image(State(state): State<SharedState>, Path(name): Path<String>) -> Response {
    let size = state.read().await.images.get(&name).copied();
    match size {
        Some((width, height)) => {
            let img = image::RgbaImage::new(width, height);
            let mut data = Vec::new();
            image::codecs::png::PngEncoder::new(&mut data)
                .write_image(&img, width, height, image::ExtendedColorType::Rgba8)
                .unwrap();
            ([(header::CONTENT_TYPE, "image/png")], data).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
