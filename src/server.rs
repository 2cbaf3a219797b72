use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{api, state::AppState, ws};

/// Build the application router.
///
/// `/ws/subscribe` upgrades subscribers, `/broadcast` publishes, and every
/// other path falls through to files under `static_dir`.
pub fn router(state: Arc<AppState>, static_dir: impl AsRef<Path>) -> Router {
    Router::new()
        .route("/ws/subscribe", get(ws::ws_handler))
        .route("/broadcast", post(api::publish))
        .route("/api/subscribers", get(api::list_subscribers))
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `app` on `listener` until the process ends.
///
/// Peer addresses are attached to each request for the WebSocket handler.
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::SubscribersResponse;
    use crate::hub::Hub;
    use crate::transport::memory_pair;
    use crate::types::DispatchMode;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState::new(Hub::new(DispatchMode::HandOff, false)))
    }

    fn publish_request(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/broadcast")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let state = test_state();
        let (connection, mut client) = memory_pair("a");
        state.hub.subscribe(connection).await;

        let app = router(state.clone(), ".");
        let response = app
            .oneshot(publish_request("msg=hello+world"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let msg = tokio::time::timeout(Duration::from_secs(5), client.recv())
            .await
            .unwrap();
        assert_eq!(msg.as_deref(), Some("hello world"));
    }

    #[tokio::test]
    async fn test_publish_empty_message_is_ignored() {
        let state = test_state();
        let (connection, mut client) = memory_pair("a");
        state.hub.subscribe(connection).await;

        for body in ["msg=", ""] {
            let response = router(state.clone(), ".")
                .oneshot(publish_request(body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        assert!(client.try_recv().is_none());
        assert_eq!(state.hub.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let state = test_state();
        let response = router(state.clone(), ".")
            .oneshot(publish_request("msg=anyone"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.hub.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_publish_rejects_non_form_body() {
        let request = Request::builder()
            .method("POST")
            .uri("/broadcast")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("hello"))
            .unwrap();

        let response = router(test_state(), ".").oneshot(request).await.unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_list_subscribers() {
        let state = test_state();
        let (connection, _client) = memory_pair("10.0.0.1:5000");
        state.hub.subscribe(connection).await;

        let request = Request::builder()
            .uri("/api/subscribers")
            .body(Body::empty())
            .unwrap();
        let response = router(state, ".").oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let listing: SubscribersResponse =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(listing.count, 1);
        assert_eq!(listing.dispatch, DispatchMode::HandOff);
        assert_eq!(listing.subscribers[0].peer, "10.0.0.1:5000");
        assert!(!listing.subscribers[0].closed);
    }

    #[tokio::test]
    async fn test_serves_static_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>hub</h1>").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "plain notes").unwrap();

        let app = router(test_state(), dir.path());

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "<h1>hub</h1>");

        let request = Request::builder()
            .uri("/notes.txt")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(body_string(response).await, "plain notes");

        let request = Request::builder()
            .uri("/missing.txt")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
