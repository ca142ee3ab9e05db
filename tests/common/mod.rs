//! Shared test utilities for Snappy Web Agent tests.
//!
//! This module provides common test infrastructure including:
//! - An in-process agent wired to a mock USB receiver
//! - A WebSocket client speaking the call/ack/event protocol
//! - Frame builders using the device-side encoder

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use snappy_web_agent::codec::{FrameCodec, HardwareAddress, DEFAULT_SEED};
use snappy_web_agent::config::DeviceConfig;
use snappy_web_agent::device::{DeviceInfo, DeviceManager, MockDeviceSource};
use snappy_web_agent::port::MockSerialPort;
use snappy_web_agent::server::{self, ServerContext};
use snappy_web_agent::{AgentState, Bridge};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};

pub const SERIAL: &str = "SNP0042A7";
pub const ADDR: HardwareAddress = HardwareAddress::new([0x24, 0x0a, 0xc4, 0x12, 0x34, 0x56]);
pub const WAIT: Duration = Duration::from_secs(3);

/// Device info for the mock receiver.
pub fn receiver() -> DeviceInfo {
    DeviceInfo {
        port_name: "/dev/ttyMOCK0".to_string(),
        vid: 0xb1b0,
        pid: 0x5508,
        serial_number: Some(SERIAL.to_string()),
    }
}

/// One encrypted frame as the receiver would emit it.
pub fn frame(value: u16) -> Vec<u8> {
    FrameCodec::for_device(&DEFAULT_SEED, SERIAL).encode(ADDR, value)
}

/// Agent running in-process on an ephemeral port.
pub struct TestAgent {
    pub addr: SocketAddr,
    pub source: MockDeviceSource,
    pub bridge: Bridge,
    shutdown: watch::Sender<bool>,
    manager: JoinHandle<()>,
}

impl TestAgent {
    pub async fn start() -> Self {
        let device = DeviceConfig {
            poll_interval_ms: 5,
            read_timeout_ms: 5,
            settle_ms: 0,
            ..DeviceConfig::default()
        };
        let bridge = Bridge::new(AgentState::new(), 256);
        let source = MockDeviceSource::new();
        let (shutdown, rx) = watch::channel(false);

        let manager = DeviceManager::new(source.clone(), bridge.clone(), device.clone(), DEFAULT_SEED)
            .spawn(rx.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get address");
        let ctx = ServerContext::new(bridge.clone(), device);
        tokio::spawn(async move {
            server::serve(listener, ctx, rx).await.expect("Server failed");
        });

        Self {
            addr,
            source,
            bridge,
            shutdown,
            manager,
        }
    }

    /// Plug the receiver in and wait until the agent has opened it.
    pub async fn plug(&self) -> MockSerialPort {
        let port = self.source.plug(receiver());
        let bridge = self.bridge.clone();
        wait_until(move || bridge.state().presence().is_connected()).await;
        port
    }

    pub async fn connect(&self) -> TestClient {
        let url = format!("ws://{}/ws", self.addr);
        let (ws, _) = connect_async(&url).await.expect("Failed to connect");
        TestClient {
            ws,
            pending: VecDeque::new(),
            next_ack: 1,
        }
    }

    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        tokio::time::timeout(WAIT, self.manager)
            .await
            .expect("device manager did not stop")
            .expect("device manager panicked");
    }
}

/// Poll `condition` until it holds or `WAIT` runs out.
pub async fn wait_until(condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Wait until the mock receiver's queued bytes have been read, then give the
/// decode loop a moment to publish.
pub async fn drain(port: &MockSerialPort) {
    let port = port.clone();
    wait_until(move || port.available_bytes() == 0).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
}

pub struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    /// Frames read while waiting for something else
    pending: VecDeque<Value>,
    next_ack: u64,
}

impl TestClient {
    async fn read_frame(&mut self, wait: Duration) -> Option<Value> {
        loop {
            let msg = match tokio::time::timeout(wait, self.ws.next()).await {
                Ok(Some(Ok(msg))) => msg,
                Ok(Some(Err(e))) => panic!("WebSocket error: {e}"),
                Ok(None) => panic!("Connection closed"),
                Err(_) => return None,
            };
            match msg {
                Message::Text(text) => {
                    return Some(serde_json::from_str(&text).expect("server sent invalid JSON"))
                }
                Message::Pong(_) => return Some(json!({"type": "pong"})),
                _ => continue,
            }
        }
    }

    /// Next frame from the server.
    pub async fn recv(&mut self) -> Value {
        if let Some(frame) = self.pending.pop_front() {
            return frame;
        }
        self.read_frame(WAIT).await.expect("timed out waiting for a frame")
    }

    /// Next pushed event called `name`; other frames stay queued.
    pub async fn next_event(&mut self, name: &str) -> Value {
        if let Some(i) = self
            .pending
            .iter()
            .position(|f| f["type"] == "event" && f["event"] == name)
        {
            return self.pending.remove(i).map(|f| f["data"].clone()).unwrap_or_default();
        }
        loop {
            let frame = self.read_frame(WAIT).await.expect("timed out waiting for event");
            if frame["type"] == "event" && frame["event"] == name {
                return frame["data"].clone();
            }
            self.pending.push_back(frame);
        }
    }

    pub async fn send_raw(&mut self, msg: Message) {
        self.ws.send(msg).await.expect("Failed to send");
    }

    /// Invoke `command` and return the acknowledged `CommandResult`.
    pub async fn call(&mut self, command: &str) -> Value {
        let id = self.next_ack;
        self.next_ack += 1;
        let call = json!({"type": "call", "event": command, "ack": id});
        self.send_raw(Message::Text(call.to_string())).await;

        loop {
            let frame = self.read_frame(WAIT).await.expect("timed out waiting for ack");
            if frame["type"] == "ack" {
                assert_eq!(frame["ack"], id, "ack for another call");
                return frame["data"].clone();
            }
            self.pending.push_back(frame);
        }
    }

    /// Every frame (queued or new) arriving within `window`.
    pub async fn collect_for(&mut self, window: Duration) -> Vec<Value> {
        let mut frames: Vec<Value> = self.pending.drain(..).collect();
        let deadline = tokio::time::Instant::now() + window;
        loop {
            let left = deadline.saturating_duration_since(tokio::time::Instant::now());
            if left.is_zero() {
                return frames;
            }
            match self.read_frame(left).await {
                Some(frame) => frames.push(frame),
                None => return frames,
            }
        }
    }
}

/// Filter `frames` down to events called `name`.
pub fn events_named<'a>(frames: &'a [Value], name: &'a str) -> impl Iterator<Item = &'a Value> {
    frames
        .iter()
        .filter(move |f| f["type"] == "event" && f["event"] == name)
}
