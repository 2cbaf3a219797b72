use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::IntoResponse,
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::state::AppState;
use crate::transport::WsConnection;

/// WebSocket upgrade handler for subscribers
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!("WebSocket connection request from {}", addr);

    ws.on_failed_upgrade(move |e| {
        tracing::warn!(peer = %addr, "Error occurred while upgrading: {}", e);
    })
    .on_upgrade(move |socket| handle_socket(socket, addr, state))
}

/// Register the socket with the hub and hold the connection until both
/// pumps are done
async fn handle_socket(socket: WebSocket, addr: SocketAddr, state: Arc<AppState>) {
    let subscription = state.hub.subscribe(WsConnection::new(socket, addr)).await;
    let id = subscription.id();

    subscription.join().await;

    tracing::info!(subscriber = %id, peer = %addr, "WebSocket connection closed");
}
