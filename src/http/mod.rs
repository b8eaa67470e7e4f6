//! HTTP/WebSocket transport
//!
//! One WebSocket per client carries the bidirectional session events:
//! - GET /ws - upgrade to the session channel
//! - GET /health - liveness and connection count
//!
//! Admission control caps global and per-address connections before the
//! session layer is involved.

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::{AppState, ConnectionLimits, ConnectionPermit};
