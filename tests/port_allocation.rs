//! Startup behaviour of the binary when its port range is taken.

use std::io::Write;
use std::process::Stdio;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::process::Command;

/// Hold `count` consecutive loopback ports.
async fn reserve_block(count: u16) -> (u16, Vec<TcpListener>) {
    for attempt in 0..200u16 {
        let base = 40_000 + (std::process::id() as u16 % 500) * 20 + attempt * 5;
        let mut held = Vec::new();
        for port in base..base + count {
            match TcpListener::bind(("127.0.0.1", port)).await {
                Ok(listener) => held.push(listener),
                Err(_) => break,
            }
        }
        if held.len() == count as usize {
            return (base, held);
        }
    }
    panic!("could not reserve {count} consecutive ports");
}

fn config_for(base: u16, span: u16) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[server]\nbase_port = {base}\nport_span = {span}").unwrap();
    file
}

#[tokio::test]
async fn test_exits_non_zero_when_range_exhausted() {
    let (base, _held) = reserve_block(3).await;
    let config = config_for(base, 3);

    let child = Command::new(env!("CARGO_BIN_EXE_snappy-web-agent"))
        .arg("--config")
        .arg(config.path())
        .env_remove("RUST_LOG")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .unwrap();

    let output = tokio::time::timeout(Duration::from_secs(20), child.wait_with_output())
        .await
        .expect("agent kept running with no free port")
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains(&format!(
        "NoAvailablePort {{ start: {}, end: {} }}",
        base,
        base + 2
    )));
}
