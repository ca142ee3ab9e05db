//! Protocol-level tests: connection handshake, acknowledgments, errors.

use crate::common::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_tungstenite::tungstenite::protocol::Message;

#[tokio::test(flavor = "multi_thread")]
async fn test_initial_status_on_connect() {
    let agent = TestAgent::start().await;
    let mut client = agent.connect().await;

    let first = client.recv().await;
    assert_eq!(
        first,
        json!({
            "type": "event",
            "event": "device-connected",
            "data": {"status": "disconnected", "connected": false, "pid": null, "port": null}
        })
    );

    agent.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_late_joiner_sees_connected_device() {
    let agent = TestAgent::start().await;
    let _port = agent.plug().await;

    let mut client = agent.connect().await;
    let status = client.next_event("device-connected").await;
    assert_eq!(status["status"], "connected");
    assert_eq!(status["connected"], true);
    assert_eq!(status["pid"], 0x5508);
    assert_eq!(status["port"], "/dev/ttyMOCK0");

    // Exactly one status frame, no replay of the historical transition.
    let rest = client.collect_for(Duration::from_millis(150)).await;
    assert_eq!(events_named(&rest, "device-connected").count(), 0);

    agent.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_version_ack() {
    let agent = TestAgent::start().await;
    let mut client = agent.connect().await;

    let result = client.call("version").await;
    assert_eq!(
        result,
        json!({
            "success": true,
            "message": env!("CARGO_PKG_VERSION"),
            "command": "version",
            "error": null
        })
    );

    agent.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_command_is_acknowledged_with_error() {
    let agent = TestAgent::start().await;
    let mut client = agent.connect().await;

    let result = client.call("format-disk").await;
    assert_eq!(result["success"], false);
    assert_eq!(result["command"], "format-disk");
    assert!(result["error"].as_str().unwrap().contains("format-disk"));

    // The connection stays usable.
    assert_eq!(client.call("version").await["success"], true);

    agent.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_call_without_ack_gets_no_reply() {
    let agent = TestAgent::start().await;
    let mut client = agent.connect().await;
    client.recv().await;

    client
        .send_raw(Message::Text(json!({"type": "call", "event": "start-snappy"}).to_string()))
        .await;
    let frames = client.collect_for(Duration::from_millis(200)).await;
    assert!(frames.iter().all(|f| f["type"] != "ack"));
    assert!(agent.bridge.state().collection().is_running());

    agent.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_garbage_frame_gets_protocol_error() {
    let agent = TestAgent::start().await;
    let mut client = agent.connect().await;
    client.recv().await;

    client.send_raw(Message::Text("{not json".to_string())).await;
    let reply = client.recv().await;
    assert_eq!(reply["type"], "error");
    assert!(reply["message"].as_str().unwrap().starts_with("Invalid message"));

    agent.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ping_answered_with_pong() {
    let agent = TestAgent::start().await;
    let mut client = agent.connect().await;
    client.recv().await;

    client.send_raw(Message::Ping(vec![1, 2, 3])).await;
    assert_eq!(client.recv().await["type"], "pong");

    agent.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_health_probe() {
    let agent = TestAgent::start().await;

    let mut stream = tokio::net::TcpStream::connect(agent.addr).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("alive"));

    agent.stop().await;
}
