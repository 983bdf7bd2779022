//! Amelie Narrowcast
//!
//! Headless display service for the association's TVs, room dashboard and
//! point-of-sale kiosk.

use amelie_narrowcast::adapters::{AdapterHandle, RetryConfig, RfidBridge};
use amelie_narrowcast::coordinator::{PageCoordinator, RFID_TASK};
use amelie_narrowcast::pages::narrowcast::NarrowcastPage;
use amelie_narrowcast::pages::pos::PosPage;
use amelie_narrowcast::pages::room::RoomPage;
use amelie_narrowcast::pages::tv::TvPage;
use amelie_narrowcast::pages::PageContext;
use amelie_narrowcast::pos::{PosClient, PosKiosk};
use amelie_narrowcast::preload::HttpPreloader;
use amelie_narrowcast::rpc::{JsonRpcClient, RoomClient, SharedApi, SharedRoomServices};
use amelie_narrowcast::{api, bus, config, display, ui};

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "amelie_narrowcast=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Starting Amelie Narrowcast v{} ({})",
        env!("NARROWCAST_VERSION"),
        env!("NARROWCAST_GIT_SHA")
    );

    // Load configuration
    let config = Arc::new(config::load_config()?);
    tracing::info!(
        "Configuration loaded, port: {}, backend: {}",
        config.port,
        config.backend.base_url
    );

    // Create event bus and display store
    let bus = bus::create_bus();
    let display = Arc::new(display::DisplayStore::new(bus.clone()));

    // Website clients
    let timeout = config.backend.timeout();
    let api_client: SharedApi = Arc::new(JsonRpcClient::new(
        &config.backend.base_url,
        &config.backend.api_path,
        timeout,
    )?);
    let room: SharedRoomServices = Arc::new(RoomClient::new(
        &config.backend.base_url,
        &config.room.page_path,
        timeout,
    )?);
    let preloader = Arc::new(HttpPreloader::new(timeout)?);
    let kiosk = Arc::new(PosKiosk::new(
        Arc::new(PosClient::new(&config.backend, &config.pos)?),
        display.clone(),
        bus.clone(),
        config.backend.media_url.clone(),
    ));
    tracing::info!("Website clients initialized for {}", config.backend.api_url());

    let ctx = PageContext {
        api: api_client,
        room: room.clone(),
        display: display.clone(),
        bus: bus.clone(),
        config: config.clone(),
        preloader,
    };

    // Start page controllers and the RFID bridge
    let coordinator = Arc::new(PageCoordinator::new(bus.clone()));
    coordinator.register_from_config(&config).await;

    let page_ctx = ctx.clone();
    coordinator
        .start("narrowcast", move |cancel| {
            NarrowcastPage::new(page_ctx, cancel).run()
        })
        .await?;
    let page_ctx = ctx.clone();
    coordinator
        .start("tv", move |cancel| TvPage::new(page_ctx, cancel).run())
        .await?;
    let page_ctx = ctx.clone();
    coordinator
        .start("room", move |cancel| RoomPage::new(page_ctx, cancel).run())
        .await?;
    let page_kiosk = kiosk.clone();
    coordinator
        .start("pos", move |cancel| {
            PosPage::new(ctx, page_kiosk, cancel).run()
        })
        .await?;

    let rfid = RfidBridge::new(&config.rfid);
    let rfid_bus = bus.clone();
    coordinator
        .start(RFID_TASK, move |cancel| async move {
            let handle = AdapterHandle::new(rfid, rfid_bus, cancel);
            if let Err(e) = handle.run_with_retry(RetryConfig::default()).await {
                tracing::error!("RFID bridge stopped: {}", e);
            }
        })
        .await?;

    // Build application state
    let state = api::AppState::new(
        display,
        bus.clone(),
        coordinator.clone(),
        kiosk,
        room,
        config.clone(),
    );

    // Build API routes
    let app = Router::new()
        // Health check
        .route("/status", get(api::status_handler))
        // Display view models
        .route("/display/{page}", get(api::display_handler))
        // Event stream (SSE)
        .route("/events", get(api::events_handler))
        // Point of sale
        .route("/pos/cart", get(api::pos_cart_handler))
        .route("/pos/cart/add", post(api::pos_cart_add_handler))
        .route("/pos/cart/remove", post(api::pos_cart_remove_handler))
        .route("/pos/cart/reset", post(api::pos_cart_reset_handler))
        .route("/pos/calculator/{product}", post(api::pos_calculator_handler))
        .route("/pos/checkout", post(api::pos_checkout_handler))
        .route("/pos/instabuy", post(api::pos_instabuy_handler))
        .route("/pos/cancel", post(api::pos_cancel_handler))
        .route("/pos/activities/{action}", post(api::pos_activities_handler))
        // Members
        .route("/members/dogroups/graph", get(api::dogroup_graph_handler))
        // Web UI routes
        .route("/", get(ui::index_page))
        .route("/narrowcast", get(ui::narrowcast_page))
        .route("/tv", get(ui::tv_page))
        .route("/room", get(ui::room_page))
        .route("/pos", get(ui::pos_page))
        // Middleware
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server with graceful shutdown
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Stopping pages...");
    coordinator.shutdown().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
