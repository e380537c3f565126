//! HTTP and WebSocket surface.
//!
//! | Route | Method | Behavior |
//! |---|---|---|
//! | `/api/panel` | GET | current record |
//! | `/api/panel` | POST | validate, persist, broadcast |
//! | `/ws` | GET | upgrade to the streaming protocol |
//! | `/health` | GET | liveness and observer count |

use crate::bus::ObserverId;
use crate::error::{ProtocolError, SyncError};
use crate::protocol;
use crate::service::SyncService;
use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::{SinkExt, Stream, StreamExt};
use psg_core::PanelRecord;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// Build the router over a shared service.
pub fn router(service: Arc<SyncService>) -> Router {
    Router::new()
        .route("/api/panel", get(get_panel).post(post_panel))
        .route("/ws", get(websocket_handler))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, service: Arc<SyncService>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Panel sync server listening");
    }
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await
}

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let status = match &self {
            SyncError::Protocol(ProtocolError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            e if e.is_rejection() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            debug!(error = %self, %status, "Request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

async fn get_panel(State(service): State<Arc<SyncService>>) -> Result<Json<PanelRecord>, SyncError> {
    Ok(Json(service.current().await?))
}

async fn post_panel(
    State(service): State<Arc<SyncService>>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, SyncError> {
    service.submit(&body).await?;
    Ok(Json(json!({ "ok": true })))
}

async fn health_check(State(service): State<Arc<SyncService>>) -> impl IntoResponse {
    Json(json!({ "status": "ok", "observers": service.observer_count() }))
}

async fn websocket_handler(ws: WebSocketUpgrade, State(service): State<Arc<SyncService>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, service))
}

/// Drive one observer connection until either side closes it.
async fn handle_socket(socket: WebSocket, service: Arc<SyncService>) {
    let (mut subscription, current) = match service.attach().await {
        Ok(attached) => attached,
        Err(e) => {
            error!(error = %e, "Failed to attach observer");
            return;
        }
    };
    let id = subscription.id();
    let (mut sink, stream) = socket.split();

    if !send_update(&mut sink, &current).await {
        service.detach(id);
        return;
    }

    let mut forward = tokio::spawn(async move {
        while let Some(record) = subscription.recv().await {
            if !send_update(&mut sink, &record).await {
                break;
            }
        }
    });

    let (stop, stopped) = oneshot::channel();
    let mut receive = tokio::spawn(receive_frames(service.clone(), id, stream, stopped));

    let forward_ended = tokio::select! {
        _ = &mut forward => true,
        _ = &mut receive => false,
    };
    if forward_ended {
        let _ = stop.send(());
        let _ = receive.await;
    } else {
        forward.abort();
    }

    service.detach(id);
}

/// Hand inbound frames to the service until the peer leaves or `stop` fires.
///
/// `stop` is only checked between frames, and frames already waiting are
/// handled first.
async fn receive_frames<S>(
    service: Arc<SyncService>,
    id: ObserverId,
    mut stream: S,
    mut stop: oneshot::Receiver<()>,
) where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    loop {
        let frame = tokio::select! {
            biased;
            frame = stream.next() => frame,
            _ = &mut stop => None,
        };
        let Some(frame) = frame else { break };

        match frame {
            Ok(Message::Text(text)) => {
                service.handle_message(id, &text).await;
            }
            Ok(Message::Binary(data)) => {
                warn!(observer = %id, bytes = data.len(), "Dropped binary frame");
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(observer = %id, error = %e, "Connection error");
                break;
            }
        }
    }
}

async fn send_update<S>(sink: &mut S, record: &PanelRecord) -> bool
where
    S: futures::Sink<Message> + Unpin,
{
    match protocol::encode_update(record) {
        Ok(text) => sink.send(Message::Text(text)).await.is_ok(),
        Err(e) => {
            error!(error = %e, "Failed to encode update");
            false
        }
    }
}
