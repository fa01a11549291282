//! HTTP control surface
//!
//! REST endpoints mirroring the user actions (queue edits, playback toggle and
//! skip, search, sharing) plus an SSE stream of host events.

pub mod handlers;
pub mod sse;

use crate::config::PlayerConfig;
use crate::error::{Error, Result};
use crate::media::MediaBackend;
use crate::notify::{EventNotifier, Notifier};
use crate::playback::Orchestrator;
use crate::provider::VideoProvider;
use crate::queue::SharedQueue;
use crate::share::{LocalEndpoint, LocalHub, PeerId, SharedQueueServer};
use crate::state::SharedState;
use crate::url_sync::QueueUrlSync;
use mxt_common::events::EventBus;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<SharedState>,
    pub queue: SharedQueue,
    pub orchestrator: Orchestrator,
    pub provider: Arc<dyn VideoProvider>,
    pub share: Arc<SharedQueueServer>,
    /// Signaling hub the sharing session lives on
    pub hub: Arc<LocalHub>,
    /// Peer connections opened through the API
    pub peers: Arc<Mutex<HashMap<PeerId, Arc<LocalEndpoint>>>>,
    pub url_sync: Arc<QueueUrlSync>,
}

impl AppContext {
    /// Wire every host component together
    ///
    /// Spawns the orchestrator event loop and the URL writer, which stops when
    /// `shutdown` fires. Must be called from within a tokio runtime.
    pub fn build(
        config: &PlayerConfig,
        provider: Arc<dyn VideoProvider>,
        backend: Arc<dyn MediaBackend>,
        shutdown: CancellationToken,
    ) -> Self {
        let event_bus = Arc::new(EventBus::new(config.event_capacity.max(1)));
        let state = Arc::new(SharedState::new(Arc::clone(&event_bus)));
        let queue = SharedQueue::new(Arc::clone(&event_bus));
        let notifier: Arc<dyn Notifier> = Arc::new(EventNotifier::new(Arc::clone(&event_bus)));
        let notification_duration = Duration::from_millis(config.notifications.duration_ms);

        let orchestrator = Orchestrator::start(
            queue.clone(),
            backend,
            config.slot_timing(),
            Arc::clone(&state),
        );

        let hub = LocalHub::new();
        let share = SharedQueueServer::new(
            Arc::new(hub.connect()),
            queue.clone(),
            Arc::clone(&provider),
            Arc::clone(&notifier),
            Arc::clone(&event_bus),
            notification_duration,
        );

        let url_sync = QueueUrlSync::new(
            queue.clone(),
            Arc::clone(&provider),
            notifier,
            notification_duration,
        );
        url_sync.spawn_writer(shutdown);

        Self {
            state,
            queue,
            orchestrator,
            provider,
            share,
            hub,
            peers: Arc::new(Mutex::new(HashMap::new())),
            url_sync,
        }
    }
}

/// Build the router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // Playback control
        .route("/playback/state", get(handlers::get_playback_state))
        .route("/playback/toggle", post(handlers::toggle_playback))
        .route("/playback/skip/:index", post(handlers::skip_to))
        // Queue
        .route("/queue", get(handlers::get_queue))
        .route("/queue/append", post(handlers::append_video))
        .route("/queue/:entry_id", delete(handlers::remove_entry))
        .route(
            "/queue/url",
            get(handlers::get_queue_url).put(handlers::put_queue_url),
        )
        // Provider search
        .route("/search", get(handlers::search))
        // Queue sharing
        .route("/share", post(handlers::share_queue))
        .route("/share/peers", post(handlers::connect_peer))
        .route("/share/peers/:peer_id/signal", post(handlers::peer_signal))
        .route("/share/peers/:peer_id", delete(handlers::disconnect_peer))
        // SSE event stream
        .route("/events", get(sse::event_stream))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
}

/// Run the HTTP API server until `shutdown` resolves
pub async fn run(
    port: u16,
    ctx: AppContext,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = create_router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
