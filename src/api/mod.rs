//! HTTP API handlers

use crate::bus::{PageKind, SharedBus};
use crate::config::Config;
use crate::coordinator::{PageCoordinator, TaskStatus};
use crate::display::SharedDisplay;
use crate::members::DogroupTree;
use crate::pos::{CalculatorKey, CartItem, KioskError, SharedKiosk};
use crate::rpc::SharedRoomServices;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub display: SharedDisplay,
    pub bus: SharedBus,
    pub coordinator: Arc<PageCoordinator>,
    pub kiosk: SharedKiosk,
    pub room: SharedRoomServices,
    pub config: Arc<Config>,
    pub started: Instant,
}

impl AppState {
    pub fn new(
        display: SharedDisplay,
        bus: SharedBus,
        coordinator: Arc<PageCoordinator>,
        kiosk: SharedKiosk,
        room: SharedRoomServices,
        config: Arc<Config>,
    ) -> Self {
        Self {
            display,
            bus,
            coordinator,
            kiosk,
            room,
            config,
            started: Instant::now(),
        }
    }
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, error: impl ToString) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

fn kiosk_error(e: KioskError) -> Response {
    let status = match e {
        KioskError::WrongScreen(_) => StatusCode::CONFLICT,
        KioskError::EmptyCart => StatusCode::BAD_REQUEST,
        KioskError::Backend(_) => StatusCode::BAD_GATEWAY,
    };
    error_response(status, e)
}

/// General status response
#[derive(Serialize)]
pub struct StatusResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub git_sha: &'static str,
    pub uptime_secs: u64,
    pub pages: Vec<TaskStatus>,
    pub bus_subscribers: usize,
}

/// GET /status - Service health and page task status
pub async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        service: "amelie-narrowcast",
        version: env!("NARROWCAST_VERSION"),
        git_sha: env!("NARROWCAST_GIT_SHA"),
        uptime_secs: state.started.elapsed().as_secs(),
        pages: state.coordinator.task_status().await,
        bus_subscribers: state.bus.subscriber_count(),
    })
}

/// GET /display/{page} - Current view model of a page
pub async fn display_handler(
    State(state): State<AppState>,
    Path(page): Path<String>,
) -> impl IntoResponse {
    match page.parse::<PageKind>() {
        Ok(page) => (StatusCode::OK, Json(state.display.snapshot(page).await)).into_response(),
        Err(e) => error_response(StatusCode::NOT_FOUND, e),
    }
}

/// GET /events - SSE stream of bus events
pub async fn events_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.bus.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => serde_json::to_string(&event)
            .ok()
            .map(|json| Ok(Event::default().data(json))),
        // Lagged receivers skip ahead
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

// =============================================================================
// POS handlers
// =============================================================================

/// GET /pos/cart - Shopping cart view
pub async fn pos_cart_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.kiosk.cart().await)
}

/// POST /pos/cart/add - Add a product to the cart
pub async fn pos_cart_add_handler(
    State(state): State<AppState>,
    Json(item): Json<CartItem>,
) -> impl IntoResponse {
    match state.kiosk.add_to_cart(&item).await {
        Ok(cart) => (StatusCode::OK, Json(cart)).into_response(),
        Err(e) => kiosk_error(e),
    }
}

#[derive(Deserialize)]
pub struct RemoveRequest {
    pub product: i64,
}

/// POST /pos/cart/remove - Drop a product from the cart
pub async fn pos_cart_remove_handler(
    State(state): State<AppState>,
    Json(req): Json<RemoveRequest>,
) -> impl IntoResponse {
    match state.kiosk.remove_from_cart(req.product).await {
        Ok(cart) => (StatusCode::OK, Json(cart)).into_response(),
        Err(e) => kiosk_error(e),
    }
}

/// POST /pos/cart/reset - Empty the cart
pub async fn pos_cart_reset_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.kiosk.reset_cart().await {
        Ok(cart) => (StatusCode::OK, Json(cart)).into_response(),
        Err(e) => kiosk_error(e),
    }
}

/// Keypad press next to a product
#[derive(Deserialize)]
pub struct CalculatorRequest {
    pub key: String,
    pub name: String,
    pub price: i64,
    #[serde(default)]
    pub image_url: String,
}

/// POST /pos/calculator/{product} - Amount keypad
pub async fn pos_calculator_handler(
    State(state): State<AppState>,
    Path(product): Path<i64>,
    Json(req): Json<CalculatorRequest>,
) -> impl IntoResponse {
    let key: CalculatorKey = match req.key.parse() {
        Ok(key) => key,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };
    let item = CartItem {
        product,
        name: req.name,
        amount: 1,
        price: req.price,
        image_url: req.image_url,
    };
    match state.kiosk.calculator(&item, key).await {
        Ok(cart) => (StatusCode::OK, Json(cart)).into_response(),
        Err(e) => kiosk_error(e),
    }
}

/// POST /pos/checkout - Submit the cart
pub async fn pos_checkout_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.kiosk.checkout(tokio::time::Instant::now()).await {
        Ok(screen) => (StatusCode::OK, Json(screen)).into_response(),
        Err(e) => kiosk_error(e),
    }
}

/// POST /pos/instabuy - Buy one product straight away
pub async fn pos_instabuy_handler(
    State(state): State<AppState>,
    Json(item): Json<CartItem>,
) -> impl IntoResponse {
    match state.kiosk.insta_buy(&item, tokio::time::Instant::now()).await {
        Ok(screen) => (StatusCode::OK, Json(screen)).into_response(),
        Err(e) => kiosk_error(e),
    }
}

/// POST /pos/cancel - Log out and return to the home screen
pub async fn pos_cancel_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.kiosk.cancel().await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"ok": true}))).into_response(),
        Err(e) => kiosk_error(e),
    }
}

/// POST /pos/activities/{action} - `next`, `previous` or an index
pub async fn pos_activities_handler(
    State(state): State<AppState>,
    Path(action): Path<String>,
) -> impl IntoResponse {
    let now = tokio::time::Instant::now();
    let home = match action.as_str() {
        "next" => state.kiosk.next_activity(now).await,
        "previous" => state.kiosk.previous_activity(now).await,
        other => match other.parse::<usize>() {
            Ok(index) => state.kiosk.select_activity(index, now).await,
            Err(_) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("Unknown activity action: {}", other),
                )
            }
        },
    };
    (StatusCode::OK, Json(home)).into_response()
}

// =============================================================================
// Members handlers
// =============================================================================

#[derive(Deserialize)]
pub struct GraphQuery {
    pub highlight: Option<i64>,
}

/// GET /members/dogroups/graph - Do-group tree, optionally highlighting a node
pub async fn dogroup_graph_handler(
    State(state): State<AppState>,
    Query(query): Query<GraphQuery>,
) -> impl IntoResponse {
    match state.room.dogroup_data().await {
        Ok(data) => {
            let tree = DogroupTree::from_data(&data);
            let tree = match query.highlight {
                Some(node) => tree.highlight(node),
                None => tree,
            };
            (StatusCode::OK, Json(tree)).into_response()
        }
        Err(e) => error_response(StatusCode::BAD_GATEWAY, e),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::bus::create_bus;
    use crate::display::DisplayStore;
    use crate::pos::{LoginOutcome, PosKiosk};
    use crate::testing::{FakePos, FakeRoom};
    use axum::body::to_bytes;
    use serde_json::{json, Value};

    fn state() -> AppState {
        state_with_room(Arc::new(FakeRoom::default()))
    }

    fn state_with_room(room: Arc<FakeRoom>) -> AppState {
        state_with(room, Arc::new(FakePos::default()))
    }

    fn state_with(room: Arc<FakeRoom>, pos: Arc<FakePos>) -> AppState {
        let bus = create_bus();
        let display = Arc::new(DisplayStore::new(Arc::clone(&bus)));
        let kiosk = Arc::new(PosKiosk::new(
            pos,
            Arc::clone(&display),
            Arc::clone(&bus),
            "https://media.example/data".into(),
        ));
        AppState::new(
            display,
            Arc::clone(&bus),
            Arc::new(PageCoordinator::new(bus)),
            kiosk,
            room,
            Arc::new(Config::default()),
        )
    }

    async fn body(response: Response) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_display_unknown_page() {
        let response = display_handler(State(state()), Path("kitchen".into()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_display_snapshot() {
        let state = state();
        state.display.update(PageKind::Tv, "clock", &"16:00").await;

        let (status, value) = body(
            display_handler(State(state), Path("tv".into()))
                .await
                .into_response(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["regions"]["clock"], json!("16:00"));
    }

    #[tokio::test]
    async fn test_cart_outside_shop_conflicts() {
        let item = CartItem {
            product: 1,
            name: "Cola".into(),
            amount: 1,
            price: 80,
            image_url: String::new(),
        };
        let (status, value) = body(
            pos_cart_add_handler(State(state()), Json(item))
                .await
                .into_response(),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(value["error"].as_str().unwrap().contains("home"));
    }

    #[tokio::test]
    async fn test_calculator_rejects_unknown_key() {
        let req = CalculatorRequest {
            key: "x".into(),
            name: "Cola".into(),
            price: 80,
            image_url: String::new(),
        };
        let response = pos_calculator_handler(State(state()), Path(1), Json(req))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_calculator_adds_typed_amount() {
        let pos = Arc::new(FakePos::default());
        pos.script_login(LoginOutcome::LoggedIn);
        let state = state_with(Arc::new(FakeRoom::default()), pos);
        let now = tokio::time::Instant::now();
        state.kiosk.card_scanned("02,abc", now).await;
        state.kiosk.check_login(now).await;

        let press = |key: &str| CalculatorRequest {
            key: key.into(),
            name: "Cola".into(),
            price: 65,
            image_url: String::new(),
        };
        for key in ["1", "2"] {
            let response = pos_calculator_handler(State(state.clone()), Path(3), Json(press(key)))
                .await
                .into_response();
            assert_eq!(response.status(), StatusCode::OK);
        }
        let (status, value) = body(
            pos_calculator_handler(State(state.clone()), Path(3), Json(press("add")))
                .await
                .into_response(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        assert_eq!(value["entries"][0]["image_amount"], json!("12x"));
        assert_eq!(value["total"], json!(crate::display::format::euro(12 * 65)));
        assert_eq!(state.kiosk.cart().await.total, "€ 7,80");
    }

    #[tokio::test]
    async fn test_activities_bad_action() {
        let response = pos_activities_handler(State(state()), Path("sideways".into()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_dogroup_graph_highlight() {
        let room = Arc::new(FakeRoom::default());
        *room.dogroups.lock().unwrap() = Some(
            serde_json::from_value(json!({
                "dogroups": ["Alpha"],
                "years": [2024, 2025],
                "data": {"Alpha": {
                    "2024": {"id": 1, "parents": [], "color": "#ff0000"},
                    "2025": {"id": 2, "parents": [{"id": 1}], "color": "#ff0000"}
                }}
            }))
            .unwrap(),
        );

        let query = GraphQuery { highlight: Some(7) };
        let (status, value) = body(
            dogroup_graph_handler(State(state_with_room(room)), Query(query))
                .await
                .into_response(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(value["nodes"][0]["color"], json!("#ff000060"));
        assert_eq!(value["edges"][0]["hidden"], json!(true));
    }

    #[tokio::test]
    async fn test_status_lists_pages() {
        let state = state();
        state.coordinator.register("tv", true).await;

        let Json(status) = status_handler(State(state)).await;
        assert_eq!(status.service, "amelie-narrowcast");
        assert_eq!(status.pages.len(), 1);
        assert_eq!(status.pages[0].name, "tv");
    }
}
