//! Router-level tests for the admission endpoint, health check and static assets.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use locshare_server::config::Config;
use locshare_server::routes::build_router;
use locshare_server::state::AppState;

/// Build a router serving a temp directory containing a small front-end build.
fn make_router() -> (axum::Router, AppState, tempfile::TempDir) {
    let static_dir = tempfile::tempdir().expect("Failed to create temp dir");
    std::fs::write(static_dir.path().join("index.html"), "<h1>map</h1>").unwrap();
    std::fs::create_dir(static_dir.path().join("assets")).unwrap();
    std::fs::write(
        static_dir.path().join("assets").join("app.js"),
        "console.log('map')",
    )
    .unwrap();

    let state = AppState::new(&Config::default());
    let router = build_router(state.clone(), static_dir.path());
    (router, state, static_dir)
}

async fn get(router: axum::Router, uri: &str) -> (StatusCode, String) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = router.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), 64 * 1024)
        .await
        .unwrap();
    (status, String::from_utf8_lossy(&body).into_owned())
}

#[tokio::test]
async fn test_ws_without_user_id_is_bad_request() {
    let (router, state, _dir) = make_router();
    let (status, body) = get(router, "/ws").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Missing userID");
    assert_eq!(state.relay.connection_count(), 0);
}

#[tokio::test]
async fn test_ws_with_empty_user_id_is_bad_request() {
    let (router, _state, _dir) = make_router();
    let (status, body) = get(router, "/ws?userID=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Missing userID");
}

#[tokio::test]
async fn test_ws_with_user_id_but_no_upgrade_is_rejected() {
    let (router, state, _dir) = make_router();
    let (status, _body) = get(router, "/ws?userID=alice").await;
    assert!(status.is_client_error(), "unexpected status {}", status);
    assert!(!state.relay.is_admitted("alice"));
}

#[tokio::test]
async fn test_repeated_user_id_reaches_upgrade() {
    let (router, _state, _dir) = make_router();
    let (status, body) = get(router, "/ws?userID=alice&userID=bob").await;
    // No upgrade headers, so the upgrade is refused, but admission accepted the identity.
    assert!(status.is_client_error(), "unexpected status {}", status);
    assert_ne!(body, "Missing userID");
    assert!(!body.contains("deserialize"), "query was rejected: {}", body);
}

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let (router, _state, _dir) = make_router();
    let (status, body) = get(router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn test_root_serves_index_html() {
    let (router, _state, _dir) = make_router();
    let (status, body) = get(router, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "<h1>map</h1>");
}

#[tokio::test]
async fn test_nested_asset_served() {
    let (router, _state, _dir) = make_router();
    let (status, body) = get(router, "/assets/app.js").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "console.log('map')");
}

#[tokio::test]
async fn test_unknown_asset_returns_404() {
    let (router, _state, _dir) = make_router();
    let (status, _body) = get(router, "/missing.js").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
