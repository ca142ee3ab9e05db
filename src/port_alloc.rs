//! Listening port allocation.
//!
//! Clients find the agent by scanning a small fixed range, so the agent takes
//! the first free port in that range. The bound listener is returned as-is to
//! avoid a release-and-rebind race.

use crate::error::{AppError, AppResult};
use std::io::ErrorKind;
use tokio::net::TcpListener;
use tracing::debug;

/// Bind the first free port in `base..=base + span - 1`, lowest first.
pub async fn allocate(host: &str, base: u16, span: u16) -> AppResult<(TcpListener, u16)> {
    let end = base.saturating_add(span.saturating_sub(1));

    for port in base..=end {
        match TcpListener::bind((host, port)).await {
            Ok(listener) => return Ok((listener, port)),
            // Windows reports a port held by another process as access denied.
            Err(e) if matches!(e.kind(), ErrorKind::AddrInUse | ErrorKind::PermissionDenied) => {
                debug!(port, "Port unavailable: {}", e);
            }
            Err(e) => return Err(AppError::Io(e)),
        }
    }

    Err(AppError::NoAvailablePort { start: base, end })
}
