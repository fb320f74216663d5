//! axum web server for the live dashboard.
//!
//! Serves a single-page HTML dashboard at `/`, answers point lookups at
//! `/api/claims/at` and pushes live metrics plus the claim-change feed to
//! connected browsers via WebSocket at `/ws`.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use claims_engine::{Position3D, WorldId};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;

use super::{DashboardState, FeedEntry};

pub fn router(state: Arc<DashboardState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/claims/at", get(claim_at))
        .route("/ws", get(ws_upgrade))
        .with_state(state)
}

/// Start the dashboard web server. Runs forever on its own tasks.
pub async fn start(state: Arc<DashboardState>, port: u16) {
    let app = router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Dashboard failed to bind to {}: {}", addr, e);
            return;
        }
    };
    tracing::info!("Dashboard listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Dashboard server error: {}", e);
    }
}

/// Serve the embedded single-page dashboard.
async fn index() -> Html<&'static str> {
    Html(include_str!("index.html"))
}

#[derive(Deserialize)]
struct AtQuery {
    world: WorldId,
    x: i32,
    #[serde(default)]
    y: i32,
    z: i32,
}

/// Which claim owns a position, as JSON. 404 for unclaimed land.
async fn claim_at(State(state): State<Arc<DashboardState>>, Query(q): Query<AtQuery>) -> impl IntoResponse {
    let pos = Position3D::new(q.x, q.y, q.z);
    let started = std::time::Instant::now();
    let found = state.index.claim_at(q.world, &pos);
    state.metrics.record_lookup(started.elapsed());
    match found {
        Some(claim) => {
            let body = serde_json::json!({
                "id": claim.id,
                "name": claim.name,
                "owner": claim.owner,
                "anchor": claim.anchor,
                "partitions": claim.areas(),
                "flags": claim.flags(),
            });
            (StatusCode::OK, Json(body))
        }
        None => (StatusCode::NOT_FOUND, Json(serde_json::json!({ "claim": null }))),
    }
}

/// Upgrade an HTTP request to a WebSocket connection.
async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<DashboardState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Push metrics and claim events to a connected browser.
async fn handle_socket(mut socket: WebSocket, state: Arc<DashboardState>) {
    let mut events = state.subscribe_events();
    let mut ticker = tokio::time::interval(Duration::from_millis(200));

    loop {
        tokio::select! {
            // Push metrics every 200 ms.
            _ = ticker.tick() => {
                let msg = serde_json::json!({
                    "type": "metrics",
                    "data": state.snapshot(),
                });
                if send_json(&mut socket, &msg).await.is_err() {
                    break;
                }
            }

            // Forward claim events as they happen.
            result = events.recv() => {
                let event = match result {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("Dashboard client skipped {} claim events", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let msg = serde_json::json!({
                    "type": "event",
                    "data": FeedEntry::from(&event),
                });
                if send_json(&mut socket, &msg).await.is_err() {
                    break;
                }
            }

            // Drain any incoming messages (ping/pong, close).
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
        }
    }
}

async fn send_json(socket: &mut WebSocket, value: &serde_json::Value) -> Result<(), ()> {
    let text = value.to_string();
    socket.send(Message::Text(text.into())).await.map_err(|_| ())
}
