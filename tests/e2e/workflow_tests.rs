//! Collection workflows: start/stop gating, device churn, multiple clients.

use crate::common::*;
use std::time::Duration;

const QUIET: Duration = Duration::from_millis(300);

#[tokio::test(flavor = "multi_thread")]
async fn test_full_collection_scenario() {
    let agent = TestAgent::start().await;
    let mut client = agent.connect().await;
    assert_eq!(client.next_event("device-connected").await["connected"], false);

    // Device connects
    let port = agent.source.plug(receiver());
    assert_eq!(client.next_event("device-connected").await["connected"], true);

    let started = client.call("start-snappy").await;
    assert_eq!(started["success"], true);

    // Three frames arrive
    for value in [100, 200, 300] {
        port.enqueue_read(&frame(value));
    }
    let mut readings = Vec::new();
    for _ in 0..3 {
        readings.push(client.next_event("snappy-data").await);
    }
    let values: Vec<_> = readings.iter().map(|r| r["value"].as_u64().unwrap()).collect();
    assert_eq!(values, vec![100, 200, 300]);
    assert!(readings.iter().all(|r| r["mac"] == "24:0a:c4:12:34:56"));
    assert!(readings.iter().all(|r| r["pid"] == 0x5508));

    let stamps: Vec<_> = readings
        .iter()
        .map(|r| chrono::DateTime::parse_from_rfc3339(r["timestamp"].as_str().unwrap()).unwrap())
        .collect();
    assert!(stamps.windows(2).all(|w| w[0] <= w[1]));

    let stopped = client.call("stop-snappy").await;
    assert_eq!(stopped["success"], true);

    // Two more frames are decoded but not relayed
    port.enqueue_read(&frame(400));
    port.enqueue_read(&frame(500));
    drain(&port).await;
    let frames = client.collect_for(QUIET).await;
    assert_eq!(events_named(&frames, "snappy-data").count(), 0);

    // Device unplugged
    agent.source.unplug();
    let frames = client.collect_for(QUIET).await;
    let statuses: Vec<_> = events_named(&frames, "device-connected").collect();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0]["data"]["status"], "disconnected");

    agent.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_start_is_idempotent_over_the_wire() {
    let agent = TestAgent::start().await;
    let mut client = agent.connect().await;

    let first = client.call("start-snappy").await;
    let second = client.call("start-snappy").await;
    assert_eq!(first["success"], true);
    assert_eq!(second["success"], true);
    assert!(second["message"].as_str().unwrap().contains("already running"));

    let first = client.call("stop-snappy").await;
    let second = client.call("stop-snappy").await;
    assert_eq!(first["success"], true);
    assert_eq!(second["success"], true);
    assert!(!agent.bridge.state().collection().is_running());

    agent.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_readings_broadcast_to_every_client() {
    let agent = TestAgent::start().await;
    let port = agent.plug().await;
    let mut alice = agent.connect().await;
    let mut bob = agent.connect().await;
    alice.next_event("device-connected").await;
    bob.next_event("device-connected").await;

    alice.call("start-snappy").await;
    port.enqueue_read(&frame(11));
    assert_eq!(alice.next_event("snappy-data").await["value"], 11);
    assert_eq!(bob.next_event("snappy-data").await["value"], 11);

    // Stopping from one client stops the feed for all of them.
    bob.call("stop-snappy").await;
    port.enqueue_read(&frame(12));
    drain(&port).await;
    let frames = alice.collect_for(QUIET).await;
    assert_eq!(events_named(&frames, "snappy-data").count(), 0);

    agent.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reconnect_resumes_without_new_start() {
    let agent = TestAgent::start().await;
    let mut client = agent.connect().await;
    client.next_event("device-connected").await;

    let port = agent.source.plug(receiver());
    client.next_event("device-connected").await;
    client.call("start-snappy").await;

    // Half a frame is in flight when the cable is pulled.
    port.enqueue_read(&frame(1)[..8]);
    drain(&port).await;
    agent.source.unplug();
    assert_eq!(client.next_event("device-connected").await["status"], "disconnected");
    assert!(agent.bridge.state().collection().is_running());

    let port = agent.source.plug(receiver());
    assert_eq!(client.next_event("device-connected").await["status"], "connected");
    port.enqueue_read(&frame(77));
    assert_eq!(client.next_event("snappy-data").await["value"], 77);

    agent.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_noise_between_frames_is_skipped() {
    let agent = TestAgent::start().await;
    let port = agent.plug().await;
    let mut client = agent.connect().await;
    client.call("start-snappy").await;

    port.enqueue_read(b"\x00\xffboot v2.1\r\n");
    port.enqueue_read(&frame(5));
    port.enqueue_read(b"garbage-line\r\n");
    port.enqueue_read(&frame(6));

    assert_eq!(client.next_event("snappy-data").await["value"], 5);
    assert_eq!(client.next_event("snappy-data").await["value"], 6);

    agent.stop().await;
}
