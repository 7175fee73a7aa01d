//! HTTP adapter tests against a loopback server
//!
//! Each test binds a one-shot tokio listener on 127.0.0.1, answers a single
//! request with a canned response and hands back what it received.

use readhub_core::api::{ApiRequest, HttpClient, HttpTransport};
use readhub_core::config::ClientConfig;
use readhub_core::error::{CatalogError, TransportError};
use readhub_core::storage::{local_storage, Database, Session, AUTH_TOKEN_KEY};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Raw request as seen by the server
struct Received {
    head: String,
    body: String,
}

impl Received {
    fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    fn header(&self, name: &str) -> Option<String> {
        header_value(&self.head, name)
    }
}

fn header_value(head: &str, name: &str) -> Option<String> {
    head.lines().skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim().to_string())
    })
}

/// Serve exactly one request; with `reply = None` the request is never answered
async fn serve_once(reply: Option<(u16, &'static str)>) -> (String, JoinHandle<Received>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 4096];

        let head_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before headers were complete");
            buffer.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos;
            }
        };
        let head = String::from_utf8_lossy(&buffer[..head_end]).to_string();
        let content_length = header_value(&head, "content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);
        while buffer.len() < head_end + 4 + content_length {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..n]);
        }
        let body = String::from_utf8_lossy(&buffer[head_end + 4..]).to_string();

        match reply {
            Some((status, payload)) => {
                let response = format!(
                    "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    payload.len(),
                    payload
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
            None => tokio::time::sleep(Duration::from_secs(5)).await,
        }

        Received { head, body }
    });

    (base_url, handle)
}

fn client(base_url: &str, session: Arc<Session>) -> HttpClient {
    let config = ClientConfig::builder()
        .base_url(base_url)
        .timeout(Duration::from_secs(5))
        .build();
    HttpClient::with_config(&config, session).unwrap()
}

#[tokio::test]
async fn test_bearer_token_attached_when_present() {
    let (base_url, server) = serve_once(Some((200, r#"{"id":"b1","title":"Dune"}"#))).await;
    let session = Arc::new(Session::new(Some("secret-token".to_string()), None));

    let value = client(&base_url, session)
        .send(ApiRequest::get("/books/b1"))
        .await
        .unwrap();

    let received = server.await.unwrap();
    assert_eq!(received.request_line(), "GET /books/b1 HTTP/1.1");
    assert_eq!(received.header("authorization").as_deref(), Some("Bearer secret-token"));
    assert_eq!(value["title"], "Dune");
}

#[tokio::test]
async fn test_anonymous_request_has_no_authorization() {
    let (base_url, server) = serve_once(Some((200, "[]"))).await;

    client(&base_url, Arc::new(Session::anonymous()))
        .send(ApiRequest::get("/books"))
        .await
        .unwrap();

    let received = server.await.unwrap();
    assert!(received.header("authorization").is_none());
    assert_eq!(received.header("accept").as_deref(), Some("application/json"));
}

#[tokio::test]
async fn test_query_and_body_are_sent() {
    let (base_url, server) = serve_once(Some((200, "[]"))).await;

    client(&base_url, Arc::new(Session::anonymous()))
        .send(
            ApiRequest::post("/search/by-category")
                .with_query([("categories", "Science Fiction,Drama"), ("page", "0")])
                .with_body(json!({})),
        )
        .await
        .unwrap();

    let received = server.await.unwrap();
    assert!(received
        .request_line()
        .starts_with("POST /search/by-category?categories=Science+Fiction%2CDrama&page=0 "));
    assert_eq!(received.body, "{}");
}

#[tokio::test]
async fn test_unauthorized_clears_token_and_fires_callback() {
    let (base_url, server) = serve_once(Some((401, ""))).await;

    let db = Database::new_in_memory().await.unwrap();
    local_storage::set_item(db.pool(), AUTH_TOKEN_KEY, "expired-token")
        .await
        .unwrap();
    let session = Arc::new(Session::load(db.clone()).await.unwrap());
    assert!(session.has_token());

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    let http = client(&base_url, session.clone()).on_unauthorized(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let err = http.send(ApiRequest::get("/books")).await.unwrap_err();
    server.await.unwrap();

    assert!(err.is_auth_error());
    assert!(!session.has_token());
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(local_storage::get_item(db.pool(), AUTH_TOKEN_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn test_server_error_body_passes_through() {
    let body = r#"{"statusCode":409,"timestamp":"2025-01-01T00:00:00Z","message":"ISBN already registered","description":"A book with this ISBN exists"}"#;
    let (base_url, server) = serve_once(Some((409, body))).await;

    let err = client(&base_url, Arc::new(Session::anonymous()))
        .send(ApiRequest::post("/books").with_body(json!({ "title": "Dup" })))
        .await
        .unwrap_err();
    server.await.unwrap();

    let api_error = err.to_api_error();
    assert_eq!(api_error.status_code, 409);
    assert_eq!(api_error.message, "ISBN already registered");
    assert_eq!(api_error.timestamp, "2025-01-01T00:00:00Z");
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_missing_error_body_is_synthesized() {
    let (base_url, server) = serve_once(Some((503, ""))).await;

    let err = client(&base_url, Arc::new(Session::anonymous()))
        .send(ApiRequest::get("/books/count"))
        .await
        .unwrap_err();
    server.await.unwrap();

    assert!(matches!(
        err,
        CatalogError::Transport(TransportError::HttpStatus { status: 503, .. })
    ));
    assert_eq!(err.to_api_error().description, "Please try again later");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_empty_success_body_is_null() {
    let (base_url, server) = serve_once(Some((200, ""))).await;

    let value = client(&base_url, Arc::new(Session::anonymous()))
        .send(ApiRequest::delete("/books/b1"))
        .await
        .unwrap();
    server.await.unwrap();

    assert_eq!(value, Value::Null);
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let (base_url, _server) = serve_once(None).await;
    let config = ClientConfig::builder()
        .base_url(base_url)
        .timeout(Duration::from_millis(200))
        .build();
    let http = HttpClient::with_config(&config, Arc::new(Session::anonymous())).unwrap();

    let err = http.send(ApiRequest::get("/books")).await.unwrap_err();

    assert!(matches!(err, CatalogError::Transport(TransportError::Timeout)));
    assert_eq!(err.status_code(), Some(408));
}
