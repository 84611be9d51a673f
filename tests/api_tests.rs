//! HTTP surface tests
//!
//! Drives the actix-web service end to end: creation endpoint,
//! redirect status codes, password form, unlock flow, rate-limit
//! headers and the query endpoints.

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use actix_web::{App, web};
use chrono::{Duration, Utc};
use tempfile::TempDir;

use linklet::api::{api_routes, redirect_routes};
use linklet::cache::{HotCache, MemoryCache};
use linklet::ratelimit::RateLimiter;
use linklet::services::ai::{AiService, OllamaClient};
use linklet::services::resolver::Resolver;
use linklet::services::{
    AnalyticsExecutor, ClickTracker, GeoIpClient, MetadataFetcher, Shortener,
};
use linklet::storage::{
    AnnotationStore, ClickStore, MappingStore, connect_sqlite, run_migrations,
};

const BASE_URL: &str = "http://localhost:8080";

struct TestEnv {
    _tmp: TempDir,
    resolver: Arc<Resolver>,
    tracker: ClickTracker,
    shortener: Shortener,
    limiter: Arc<RateLimiter>,
}

async fn setup() -> TestEnv {
    let tmp = TempDir::new().expect("temp dir");
    let db_path = tmp.path().join("api_test.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let db = connect_sqlite(&db_url).await.expect("connect sqlite");
    run_migrations(&db).await.expect("run migrations");

    let mappings = MappingStore::new(db.clone());
    let clicks = ClickStore::new(db.clone());
    let annotations = AnnotationStore::new(db, 7);

    let cache: Arc<dyn HotCache> = Arc::new(MemoryCache::new(1000, 3600));
    let executor = AnalyticsExecutor::start(2, 64);

    let ollama = Arc::new(OllamaClient::new("http://127.0.0.1:1", "test-model"));
    let ai = AiService::new(
        ollama,
        annotations,
        mappings.clone(),
        Arc::clone(&executor),
    );
    let metadata = Arc::new(MetadataFetcher::new(1, 1024));
    let geoip = Arc::new(GeoIpClient::new());

    let resolver = Arc::new(Resolver::new(mappings.clone(), Arc::clone(&cache)));
    let tracker = ClickTracker::new(mappings.clone(), clicks.clone(), geoip, executor);
    let shortener = Shortener::new(mappings, clicks, cache, metadata, ai, BASE_URL);

    // 无 Redis 后端：限流 fail-open，但响应头照常
    let limiter = Arc::new(RateLimiter::new("", 100, 60).await);

    TestEnv {
        _tmp: tmp,
        resolver,
        tracker,
        shortener,
        limiter,
    }
}

macro_rules! test_app {
    ($env:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(Arc::clone(&$env.resolver)))
                .app_data(web::Data::new($env.tracker.clone()))
                .app_data(web::Data::new($env.shortener.clone()))
                .service(api_routes())
                .service(redirect_routes(Arc::clone(&$env.limiter))),
        )
        .await
    };
}

fn create_body(url: &str) -> serde_json::Value {
    serde_json::json!({
        "originalUrl": url,
        "fetchMetadata": false,
        "enableAiAnalysis": false,
    })
}

macro_rules! create_via_api {
    ($app:expr, $body:expr) => {{
        let req = TestRequest::post()
            .uri("/api/urls")
            .set_json(&$body)
            .to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        body
    }};
}

#[actix_web::test]
async fn test_create_then_redirect() {
    let env = setup().await;
    let app = test_app!(env);

    let created = create_via_api!(app, create_body("https://example.com/a"));
    let short_key = created["shortKey"].as_str().expect("shortKey");
    assert!(short_key.len() >= 6 && short_key.len() <= 8);
    assert_eq!(
        created["shortUrl"].as_str().unwrap(),
        format!("{}/{}", BASE_URL, short_key)
    );

    let req = TestRequest::get().uri(&format!("/{}", short_key)).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        resp.headers().get("Location").unwrap(),
        "https://example.com/a"
    );
    assert_eq!(
        resp.headers().get("Cache-Control").unwrap(),
        "no-cache, no-store, must-revalidate"
    );
    // 限流头在重定向 scope 的所有响应上
    assert_eq!(resp.headers().get("X-RateLimit-Limit").unwrap(), "100");
    assert!(resp.headers().contains_key("X-RateLimit-Remaining"));
}

#[actix_web::test]
async fn test_redirect_unknown_key_404() {
    let env = setup().await;
    let app = test_app!(env);

    let req = TestRequest::get().uri("/nosuchkey").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        resp.headers().get("Cache-Control").unwrap(),
        "no-cache, no-store, must-revalidate"
    );
}

#[actix_web::test]
async fn test_redirect_expired_410() {
    let env = setup().await;
    let app = test_app!(env);

    let past = (Utc::now() - Duration::hours(1)).to_rfc3339();
    let mut body = create_body("https://x.test");
    body["expiresAt"] = serde_json::Value::String(past);
    let created = create_via_api!(app, body);
    let short_key = created["shortKey"].as_str().unwrap();

    let req = TestRequest::get().uri(&format!("/{}", short_key)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::GONE);
}

#[actix_web::test]
async fn test_password_gate_over_http() {
    let env = setup().await;
    let app = test_app!(env);

    let mut body = create_body("https://secret.test");
    body["password"] = serde_json::Value::String("hunter2".to_string());
    let created = create_via_api!(app, body);
    assert_eq!(created["isPasswordProtected"], serde_json::json!(true));
    let short_key = created["shortKey"].as_str().unwrap().to_string();

    // 无密码：401 + HTML 表单
    let req = TestRequest::get().uri(&format!("/{}", short_key)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let content_type = resp.headers().get("Content-Type").unwrap().to_str().unwrap();
    assert!(content_type.starts_with("text/html"));
    let body_bytes = test::read_body(resp).await;
    assert!(String::from_utf8_lossy(&body_bytes).contains("Password Required"));

    // 错密码：401
    let req = TestRequest::get()
        .uri(&format!("/{}?password=wrong", short_key))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // 对密码：302
    let req = TestRequest::get()
        .uri(&format!("/{}?password=hunter2", short_key))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        resp.headers().get("Location").unwrap(),
        "https://secret.test"
    );
}

#[actix_web::test]
async fn test_unlock_endpoint() {
    let env = setup().await;
    let app = test_app!(env);

    let mut body = create_body("https://vault.test");
    body["password"] = serde_json::Value::String("opensesame".to_string());
    let created = create_via_api!(app, body);
    let short_key = created["shortKey"].as_str().unwrap().to_string();

    let req = TestRequest::post()
        .uri(&format!("/{}/unlock", short_key))
        .set_json(serde_json::json!({"password": "opensesame"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers().get("Location").unwrap(), "https://vault.test");

    let req = TestRequest::post()
        .uri(&format!("/{}/unlock", short_key))
        .set_json(serde_json::json!({"password": "wrong"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], serde_json::json!(401));
}

#[actix_web::test]
async fn test_duplicate_alias_400() {
    let env = setup().await;
    let app = test_app!(env);

    let mut body = create_body("https://a.test");
    body["customAlias"] = serde_json::Value::String("demo".to_string());
    create_via_api!(app, body.clone());

    body["originalUrl"] = serde_json::Value::String("https://b.test".to_string());
    let req = TestRequest::post().uri("/api/urls").set_json(&body).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert!(
        body["message"].as_str().unwrap().contains("already exists"),
        "unexpected message: {}",
        body["message"]
    );
}

#[actix_web::test]
async fn test_invalid_url_400() {
    let env = setup().await;
    let app = test_app!(env);

    let req = TestRequest::post()
        .uri("/api/urls")
        .set_json(create_body("not-a-url"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_bulk_endpoint_partial_failure() {
    let env = setup().await;
    let app = test_app!(env);

    let req = TestRequest::post()
        .uri("/api/urls/bulk")
        .set_json(serde_json::json!({
            "urls": [
                {"originalUrl": "https://ok.test", "fetchMetadata": false, "enableAiAnalysis": false},
                {"originalUrl": "not-a-url", "fetchMetadata": false, "enableAiAnalysis": false},
                {"originalUrl": "https://also.test", "fetchMetadata": false, "enableAiAnalysis": false},
            ],
            "fetchMetadata": false,
            "enableAiAnalysis": false,
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["successCount"], serde_json::json!(2));
    assert_eq!(body["failedCount"], serde_json::json!(1));
    assert_eq!(body["errors"][0]["index"], serde_json::json!(1));
    assert_eq!(
        body["errors"][0]["originalUrl"],
        serde_json::json!("not-a-url")
    );
}

#[actix_web::test]
async fn test_list_stats_protected_preview() {
    let env = setup().await;
    let app = test_app!(env);

    let created = create_via_api!(app, create_body("https://listed.test"));
    let short_key = created["shortKey"].as_str().unwrap().to_string();

    let req = TestRequest::get().uri("/api/urls").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let req = TestRequest::get()
        .uri(&format!("/api/urls/{}/stats", short_key))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["originalUrl"], serde_json::json!("https://listed.test"));
    assert_eq!(body["clickCount"], serde_json::json!(0));

    let req = TestRequest::get().uri("/api/urls/missing0/stats").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = TestRequest::get()
        .uri(&format!("/api/urls/{}/protected", short_key))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["passwordRequired"], serde_json::json!(false));

    let req = TestRequest::get()
        .uri(&format!("/api/urls/{}/preview", short_key))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_analytics_endpoint_empty_breakdowns() {
    let env = setup().await;
    let app = test_app!(env);

    let created = create_via_api!(app, create_body("https://analytics.test"));
    let short_key = created["shortKey"].as_str().unwrap();

    let req = TestRequest::get()
        .uri(&format!("/api/urls/{}/analytics", short_key))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["totalClicks"], serde_json::json!(0));
    assert!(body["clicksByCountry"].as_object().unwrap().is_empty());
    assert!(body["clicksByDevice"].as_object().unwrap().is_empty());
}

#[actix_web::test]
async fn test_qrcode_endpoint_returns_png() {
    let env = setup().await;
    let app = test_app!(env);

    let created = create_via_api!(app, create_body("https://qr.test"));
    let short_key = created["shortKey"].as_str().unwrap();

    let req = TestRequest::get()
        .uri(&format!("/api/urls/{}/qrcode?size=128", short_key))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("Content-Type").unwrap(), "image/png");
    let body = test::read_body(resp).await;
    assert_eq!(&body[..8], &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);

    let req = TestRequest::get().uri("/api/urls/missing0/qrcode").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
