use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tower::ServiceExt;

use listings::application::auth::{AuthService, TokenConfig};
use listings::application::feed::{FeedService, FoldDispatcher};
use listings::cache::{FeedCache, FeedCacheConfig, MemoryFeedStore};
use listings::infra::http::{HttpState, build_router};
use listings::infra::memory::InMemoryRepositories;
use listings_api_types::{AdResponse, ApiErrorBody, AuthResponse, FeedResponse, HealthResponse};

fn app() -> Router {
    let repos = Arc::new(InMemoryRepositories::new());
    let config = FeedCacheConfig::default();
    let cache = Arc::new(FeedCache::new(Arc::new(MemoryFeedStore::new()), &config));
    let folds = FoldDispatcher::new(cache.clone(), config.fold_timeout);
    let feed = Arc::new(FeedService::new(
        repos.clone(),
        cache,
        folds,
        Duration::from_secs(5),
    ));
    let auth = Arc::new(AuthService::new(
        repos.clone(),
        TokenConfig {
            secret: "integration-test-secret".to_string(),
            issuer: "listings".to_string(),
            ttl: Duration::from_secs(3600),
        },
    ));

    build_router(HttpState {
        feed,
        auth,
        store: repos,
    })
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes()
        .to_vec();
    (status, headers, bytes)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> T {
    serde_json::from_slice(bytes).expect("json body")
}

async fn register(app: &Router, username: &str) -> AuthResponse {
    let (status, _, body) = send(
        app,
        Method::POST,
        "/register",
        None,
        Some(json!({ "username": username, "password": "correct-horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    decode(&body)
}

async fn create_ad(app: &Router, token: &str, caption: &str, price: i64) -> AdResponse {
    let (status, _, body) = send(
        app,
        Method::POST,
        "/ads",
        Some(token),
        Some(json!({
            "caption": caption,
            "description": "Pick up only",
            "image_url": "https://img.example.com/1.png",
            "price": price,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    decode(&body)
}

#[tokio::test]
async fn register_and_login_issue_bearer_tokens() {
    let app = app();
    let (status, headers, body) = send(
        &app,
        Method::POST,
        "/register",
        None,
        Some(json!({ "username": "alice", "password": "correct-horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let registered: AuthResponse = decode(&body);
    assert_eq!(registered.username, "alice");
    assert!(registered.is_authorized);
    assert_eq!(
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok()),
        Some(format!("Bearer {}", registered.token).as_str())
    );

    let (status, _, body) = send(
        &app,
        Method::POST,
        "/login",
        None,
        Some(json!({ "username": "alice", "password": "correct-horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let logged_in: AuthResponse = decode(&body);
    assert_eq!(logged_in.id, registered.id);

    let (status, _, body) = send(
        &app,
        Method::POST,
        "/login",
        None,
        Some(json!({ "username": "alice", "password": "wrong-horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let error: ApiErrorBody = decode(&body);
    assert_eq!(error.error.code, "invalid_credentials");
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let app = app();
    register(&app, "bob").await;
    let (status, _, _) = send(
        &app,
        Method::POST,
        "/register",
        None,
        Some(json!({ "username": "bob", "password": "another-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn invalid_registration_is_rejected() {
    let app = app();
    let (status, _, body) = send(
        &app,
        Method::POST,
        "/register",
        None,
        Some(json!({ "username": "x", "password": "short" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ApiErrorBody = decode(&body);
    assert_eq!(error.error.code, "invalid_input");
    assert!(error.error.hint.is_some());
}

#[tokio::test]
async fn writes_require_a_valid_token() {
    let app = app();
    let (status, _, _) = send(
        &app,
        Method::POST,
        "/ads",
        None,
        Some(json!({ "caption": "Sofa", "description": "", "price": 100 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(&app, Method::GET, "/ads", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn created_ad_is_listed_with_owner_flag() {
    let app = app();
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;

    let created = create_ad(&app, &alice.token, "Road bike", 45_000).await;
    assert_eq!(created.author_username, "alice");
    assert_eq!(created.price, 45_000);
    assert_eq!(created.is_owner, Some(true));

    let (status, _, body) = send(&app, Method::GET, "/ads", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let feed: FeedResponse = decode(&body);
    assert_eq!(feed.total, 1);
    assert_eq!(feed.ads[0].id, created.id);
    assert_eq!(feed.ads[0].is_owner, None);

    let (_, _, body) = send(&app, Method::GET, "/ads", Some(&bob.token), None).await;
    let feed: FeedResponse = decode(&body);
    assert_eq!(feed.ads[0].is_owner, Some(false));

    let uri = format!("/ads/{}", created.id);
    let (status, _, body) = send(&app, Method::GET, &uri, Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::OK);
    let fetched: AdResponse = decode(&body);
    assert_eq!(fetched.is_owner, Some(true));
}

#[tokio::test]
async fn unknown_or_malformed_ids_are_not_found() {
    let app = app();
    let (status, _, _) = send(&app, Method::GET, "/ads/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let uri = format!("/ads/{}", uuid::Uuid::new_v4());
    let (status, _, body) = send(&app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let error: ApiErrorBody = decode(&body);
    assert_eq!(error.error.code, "not_found");
}

#[tokio::test]
async fn only_owner_can_modify_an_ad() {
    let app = app();
    let alice = register(&app, "alice").await;
    let mallory = register(&app, "mallory").await;
    let ad = create_ad(&app, &alice.token, "Camera", 12_000).await;
    let uri = format!("/ads/{}", ad.id);

    let (status, _, _) = send(
        &app,
        Method::PUT,
        &uri,
        Some(&mallory.token),
        Some(json!({ "price": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, body) = send(
        &app,
        Method::PUT,
        &uri,
        Some(&alice.token),
        Some(json!({ "price": 11_000 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let updated: AdResponse = decode(&body);
    assert_eq!(updated.price, 11_000);
    assert_eq!(updated.caption, "Camera");
    assert!(updated.updated_at.is_some());

    let (status, _, _) = send(&app, Method::DELETE, &uri, Some(&mallory.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, body) = send(&app, Method::DELETE, &uri, Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());

    let (status, _, _) = send(&app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn negative_price_is_invalid() {
    let app = app();
    let alice = register(&app, "alice").await;
    let (status, _, body) = send(
        &app,
        Method::POST,
        "/ads",
        Some(&alice.token),
        Some(json!({ "caption": "Table", "description": "Oak", "price": -5 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ApiErrorBody = decode(&body);
    assert_eq!(error.error.code, "invalid_input");
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"username\":"))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn feed_query_is_parsed_leniently_but_rejects_inverted_range() {
    let app = app();
    let alice = register(&app, "alice").await;
    for (caption, price) in [("Vase", 300), ("Rug", 900), ("Clock", 100)] {
        create_ad(&app, &alice.token, caption, price).await;
    }

    let (status, _, body) = send(
        &app,
        Method::GET,
        "/ads?sort_by=price&order=asc&page=abc&page_size=2&min_price=-3",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let feed: FeedResponse = decode(&body);
    assert_eq!(feed.page, 1);
    assert_eq!(feed.page_size, 2);
    assert_eq!(feed.total, 3);
    assert_eq!(feed.total_pages, 2);
    let prices: Vec<i64> = feed.ads.iter().map(|ad| ad.price).collect();
    assert_eq!(prices, vec![100, 300]);

    let (status, _, body) = send(
        &app,
        Method::GET,
        "/ads?min_price=500&max_price=100",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ApiErrorBody = decode(&body);
    assert_eq!(error.error.code, "invalid_input");
}

#[tokio::test]
async fn health_reports_both_dependencies() {
    let app = app();
    let (status, _, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let health: HealthResponse = decode(&body);
    assert_eq!(health.database, "ok");
    assert_eq!(health.cache, "ok");
}
