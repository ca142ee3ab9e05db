//! End-to-end tests against an in-process agent and a mock receiver.

pub mod websocket_tests;
pub mod workflow_tests;
