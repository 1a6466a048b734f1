use std::sync::Arc;

use gardenlab::{
    store::RunStore,
    web::{router, AppState},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

fn post(path: &str, body: &str) -> String {
    format!(
        "POST {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

async fn spawn_server(store: RunStore) -> std::net::SocketAddr {
    let state = Arc::new(AppState::new(store));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router(state)).await;
    });
    addr
}

async fn request(addr: std::net::SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream.write_all(raw.as_bytes()).await.expect("write");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    response
}

#[tokio::test]
async fn serves_health_simulate_and_not_found() {
    let temp = tempfile::tempdir().expect("tempdir");
    let addr = spawn_server(RunStore::open(temp.path().join("runs.db")).unwrap()).await;

    let health = request(
        addr,
        "GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(health.starts_with("HTTP/1.1 200"), "{health}");
    assert!(health.contains(r#"{"ok":true}"#));

    let body = r#"{"scenario":{"name":"api-test","days":15,"seed":11}}"#;
    let simulate = request(addr, &post("/simulate", body)).await;
    assert!(simulate.starts_with("HTTP/1.1 200"), "{simulate}");
    assert!(simulate.contains(r#""runId":1"#));

    let stored = request(
        addr,
        "GET /runs/1 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(stored.starts_with("HTTP/1.1 200"), "{stored}");
    assert!(stored.contains(r#""scenarioName":"api-test""#));
    assert!(stored.contains(r#""day":15"#));
    assert!(RunStore::open(temp.path().join("runs.db"))
        .unwrap()
        .get(1)
        .is_ok());

    let invalid = r#"{"days":0}"#;
    let rejected = request(addr, &post("/simulate", invalid)).await;
    assert!(rejected.starts_with("HTTP/1.1 400"), "{rejected}");
    assert!(rejected.contains("days must be > 0"));

    let missing = request(
        addr,
        "GET /nowhere HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(missing.starts_with("HTTP/1.1 404"), "{missing}");
}

#[tokio::test]
async fn live_streams_each_day_then_done() {
    let addr = spawn_server(RunStore::in_memory().unwrap()).await;
    let body = r#"{"scenario":{"name":"live-api","days":30,"seed":4},"intervalMs":0,"maxDays":3}"#;
    let response = request(addr, &post("/live", body)).await;

    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.contains("text/event-stream"));
    let day_events: Vec<&str> = response
        .lines()
        .filter(|line| line.starts_with(r#"data: {"day":"#))
        .collect();
    assert_eq!(day_events.len(), 3, "{response}");
    assert!(day_events[2].starts_with(r#"data: {"day":3,"#));
    assert_eq!(response.matches("event: done").count(), 1);
    assert!(response.contains(r#""scenarioName":"live-api""#));
    assert!(response.contains(r#""days":3"#));
}
