//! Wire contract tests against a local fake crawl service.

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::{Form, Path};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use crawl_service_client::{ControlAction, CrawlServiceClient, CrawlServiceError};
use serde_json::{json, Value};

async fn spawn_service(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn fake_service() -> Router {
    Router::new()
        .route(
            "/crawl",
            post(|Form(form): Form<HashMap<String, String>>| async move {
                match form.get("url").map(String::as_str) {
                    Some("https://example.com") if form.get("depth").map(String::as_str) == Some("2") => {
                        (StatusCode::OK, Json(json!({"crawl_id": "abc123"})))
                    }
                    Some("https://no-id.example.com") => (StatusCode::OK, Json(json!({"ok": true}))),
                    _ => (StatusCode::BAD_REQUEST, Json(json!({"error": "bad url"}))),
                }
            }),
        )
        .route(
            "/status/:crawl_id",
            get(|Path(crawl_id): Path<String>| async move {
                Json(json!({
                    "crawl_id": crawl_id,
                    "status": "running",
                    "crawled": 5,
                    "total": 50,
                    "queued": 10,
                    "current_url": "https://example.com/about"
                }))
            }),
        )
        .route(
            "/control/:crawl_id/:action",
            post(|Path((crawl_id, action)): Path<(String, String)>| async move {
                if crawl_id == "gone" {
                    return (StatusCode::NOT_FOUND, Json(json!({"error": "unknown crawl"})));
                }
                (StatusCode::OK, Json(json!({"crawl_id": crawl_id, "action": action})))
            }),
        )
        .route(
            "/report/:crawl_id",
            get(|| async {
                Json(json!({"files": {"content": ["index.md", "about.md"], "images": ["logo.png"]}}))
            }),
        )
        .route(
            "/download/:crawl_id/:category/:filename",
            get(|Path((_, category, filename)): Path<(String, String, String)>| async move {
                format!("{category}/{filename}: hello")
            }),
        )
        .route(
            "/slow/status/:crawl_id",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(Value::Null)
            }),
        )
}

#[tokio::test]
async fn test_create_crawl_returns_id() {
    let base = spawn_service(fake_service()).await;
    let client = CrawlServiceClient::new(base).unwrap();

    let created = client.create_crawl("https://example.com", 2).await.unwrap();

    assert_eq!(created.crawl_id(), Some("abc123".to_string()));
}

#[tokio::test]
async fn test_create_crawl_success_without_id() {
    let base = spawn_service(fake_service()).await;
    let client = CrawlServiceClient::new(base).unwrap();

    let created = client.create_crawl("https://no-id.example.com", 1).await.unwrap();

    assert_eq!(created.crawl_id(), None);
}

#[tokio::test]
async fn test_create_crawl_rejected_is_api_error() {
    let base = spawn_service(fake_service()).await;
    let client = CrawlServiceClient::new(base).unwrap();

    let err = client.create_crawl("ftp://nope", 1).await.unwrap_err();

    match err {
        CrawlServiceError::Api { status, message } => {
            assert_eq!(status, 400);
            assert!(message.contains("bad url"));
        }
        other => panic!("expected API error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_get_status_parses_progress() {
    let base = spawn_service(fake_service()).await;
    let client = CrawlServiceClient::new(base).unwrap();

    let status = client.get_status("abc123").await.unwrap();

    assert_eq!(status.status, "running");
    assert_eq!(status.crawled, Some(5));
    assert_eq!(status.total, Some(50));
    assert_eq!(status.queued, Some(10));
    assert_eq!(status.current_url.as_deref(), Some("https://example.com/about"));
}

#[tokio::test]
async fn test_control_ack_and_rejection() {
    let base = spawn_service(fake_service()).await;
    let client = CrawlServiceClient::new(base).unwrap();

    let ack = client.control("abc123", ControlAction::Pause).await.unwrap();
    assert_eq!(ack.0["action"], "pause");

    let err = client.control("gone", ControlAction::Stop).await.unwrap_err();
    assert!(err.is_rejection());
}

#[tokio::test]
async fn test_report_and_download() {
    let base = spawn_service(fake_service()).await;
    let client = CrawlServiceClient::new(base).unwrap();

    let files = client.get_report("abc123").await.unwrap();
    assert_eq!(files.content, vec!["index.md", "about.md"]);
    assert_eq!(files.images, vec!["logo.png"]);
    assert!(files.documents.is_empty());

    let bytes = client
        .download_file("abc123", "content", "index.md")
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"content/index.md: hello");
}

#[tokio::test]
async fn test_timeout_surfaces_as_network_error() {
    let base = spawn_service(fake_service()).await;
    let client =
        CrawlServiceClient::with_timeout(format!("{base}/slow"), Duration::from_millis(100))
            .unwrap();

    let err = client.get_status("abc123").await.unwrap_err();

    assert!(err.is_transport(), "expected transport error, got {err:?}");
}

#[tokio::test]
async fn test_unreachable_service_is_network_error() {
    let client =
        CrawlServiceClient::with_timeout("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();

    let err = client.get_status("abc123").await.unwrap_err();

    assert!(err.is_transport());
}
