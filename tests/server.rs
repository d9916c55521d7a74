//! HTTP Surface Integration Tests
//!
//! Exercises the intake and liveness endpoints over a real socket.

use std::time::Duration;

use leadrelay::core::{IntakeCoordinator, LogChannel, LogWriter, PipelineContext};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;

async fn start(logs: &LogWriter) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let coordinator = IntakeCoordinator::new(PipelineContext::new(logs.clone()));

    tokio::spawn(async move {
        leadrelay::server::serve_on(listener, coordinator).await.unwrap();
    });

    format!("http://{}", addr)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let temp = TempDir::new().unwrap();
    let base = start(&LogWriter::new(temp.path())).await;

    let response = client().get(format!("{}/health", base)).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_submit_acknowledges_and_captures() {
    let temp = TempDir::new().unwrap();
    let logs = LogWriter::new(temp.path());
    let base = start(&logs).await;
    let payload = json!({"source": "whatsapp", "name": "Rui", "phone": "+351 934 000 111"});

    let response = client()
        .post(format!("{}/submit", base))
        .header("X-Forwarded-For", "198.51.100.23, 10.0.0.2")
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"status": "ok", "message": "Lead received"}));

    let general = logs.read(LogChannel::Submissions).await.unwrap();
    assert_eq!(general.len(), 1);
    assert_eq!(general[0]["payload"], payload);
    assert_eq!(general[0]["client_ip"], "198.51.100.23");
    assert_eq!(logs.read(LogChannel::WhatsApp).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_submit_falls_back_to_peer_address() {
    let temp = TempDir::new().unwrap();
    let logs = LogWriter::new(temp.path());
    let base = start(&logs).await;

    client()
        .post(format!("{}/submit", base))
        .json(&json!({"name": "Eva"}))
        .send()
        .await
        .unwrap();

    let general = logs.read(LogChannel::Submissions).await.unwrap();
    assert_eq!(general[0]["client_ip"], "127.0.0.1");
}

#[tokio::test]
async fn test_submit_rejects_malformed_bodies() {
    let temp = TempDir::new().unwrap();
    let logs = LogWriter::new(temp.path());
    let base = start(&logs).await;

    let response = client()
        .post(format!("{}/submit", base))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let response = client()
        .post(format!("{}/submit", base))
        .json(&json!([1, 2, 3]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("Invalid payload"));

    assert!(logs.read(LogChannel::Submissions).await.unwrap().is_empty());
}
