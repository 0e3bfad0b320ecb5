//! Integration tests for JsonLog

use axum::body::Body;
use axum::http::{Request, StatusCode};
use jsonlog::config::ServerConfig;
use jsonlog::server::LogServer;
use serde_json::Value;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tower::ServiceExt;

/// Helper function to create a test server config
fn create_test_server_config(data_dir: &Path) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.server.bind = "127.0.0.1:0".to_string();
    config.storage.data_dir = data_dir.to_path_buf();
    config.storage.buffer_capacity = 4;
    config.platforms.insert(
        "web".to_string(),
        vec!["pageview".to_string(), "click".to_string()],
    );
    config
        .platforms
        .insert("android".to_string(), vec!["crash".to_string()]);
    config
}

/// Send one HTTP/1.1 request over a fresh connection and return the raw response
async fn raw_post(addr: SocketAddr, path: &str, body: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "POST {} HTTP/1.1\r\nHost: {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        path,
        addr,
        body.len(),
        body
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

async fn read_records(path: &Path) -> Vec<Value> {
    let content = fs::read_to_string(path).await.unwrap();
    content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

/// Test records posted over TCP land in their stream files
#[tokio::test]
async fn test_http_end_to_end() {
    let temp_dir = tempdir().unwrap();
    let config = create_test_server_config(temp_dir.path());
    let server = Arc::new(LogServer::new(config).await.unwrap());

    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();
    let serving = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.serve(listener).await })
    };

    let response = raw_post(addr, "/collect/web/click", r#"{"uid":12423434,"x":1.5}"#).await;
    assert!(response.starts_with("HTTP/1.1 204"), "{}", response);

    let response = raw_post(addr, "/collect/android/crash", r#"{"trace":"boom"}"#).await;
    assert!(response.starts_with("HTTP/1.1 204"), "{}", response);

    let response = raw_post(addr, "/collect/ios/crash", "{}").await;
    assert!(response.starts_with("HTTP/1.1 400"), "{}", response);
    assert!(response.contains("Invalid platform"));

    server.close().await;
    serving.await.unwrap().unwrap();

    let clicks = read_records(&temp_dir.path().join("web").join("click.log")).await;
    assert_eq!(clicks.len(), 1);
    assert_eq!(clicks[0]["uid"], 12423434);
    assert_eq!(clicks[0]["platform"], "web");
    assert_eq!(clicks[0]["doctype"], "click");
    assert!(clicks[0]["ts"].is_i64());

    let crashes = read_records(&temp_dir.path().join("android").join("crash.log")).await;
    assert_eq!(crashes.len(), 1);
    assert_eq!(crashes[0]["trace"], "boom");

    let pageviews = fs::read_to_string(temp_dir.path().join("web").join("pageview.log"))
        .await
        .unwrap();
    assert!(pageviews.is_empty());
}

/// Test many concurrent producers on one stream keep per-producer order
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers() {
    let temp_dir = tempdir().unwrap();
    let config = create_test_server_config(temp_dir.path());
    let server = LogServer::new(config).await.unwrap();
    let app = server.router();

    let mut handles = vec![];
    for producer in 0..10 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            for seq in 0..20 {
                let body = format!(r#"{{"producer":{},"seq":{}}}"#, producer, seq);
                let request = Request::builder()
                    .method("POST")
                    .uri("/collect/web/pageview")
                    .body(Body::from(body))
                    .unwrap();
                let response = app.clone().oneshot(request).await.unwrap();
                assert_eq!(response.status(), StatusCode::NO_CONTENT);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    server.close().await;

    let records = read_records(&temp_dir.path().join("web").join("pageview.log")).await;
    assert_eq!(records.len(), 200);
    for producer in 0..10 {
        let seqs: Vec<i64> = records
            .iter()
            .filter(|r| r["producer"] == producer)
            .map(|r| r["seq"].as_i64().unwrap())
            .collect();
        assert_eq!(seqs, (0..20).collect::<Vec<_>>(), "producer {}", producer);
    }
}

/// Test server startup from a configuration file
#[tokio::test]
async fn test_server_from_config_file() {
    let temp_dir = tempdir().unwrap();
    let data_dir = temp_dir.path().join("data");
    let config_path = temp_dir.path().join("server.toml");
    let toml = format!(
        "[server]\nbind = \"127.0.0.1:0\"\n\n[storage]\ndata_dir = {:?}\nbuffer_capacity = 2\n\n[platforms]\nweb = [\"click\", \"\"]\n",
        data_dir.to_string_lossy()
    );
    fs::write(&config_path, toml).await.unwrap();

    let config = ServerConfig::from_file(&config_path).unwrap();
    let server = LogServer::new(config).await.unwrap();

    assert_eq!(server.registry().keys(), vec!["web.click"]);
    assert!(data_dir.join("web").join("click.log").exists());
    server.close().await;
}

/// Test rejected requests never reach a stream file
#[tokio::test]
async fn test_rejected_bodies_are_not_written() {
    let temp_dir = tempdir().unwrap();
    let server = LogServer::new(create_test_server_config(temp_dir.path()))
        .await
        .unwrap();
    let app = server.router();

    for body in ["", "invalid json", "{broken: json", "42", "\"text\""] {
        let request = Request::builder()
            .method("POST")
            .uri("/collect/web/click")
            .body(Body::from(body))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {:?}", body);
    }

    server.close().await;
    let content = fs::read_to_string(temp_dir.path().join("web").join("click.log"))
        .await
        .unwrap();
    assert!(content.is_empty());
}
