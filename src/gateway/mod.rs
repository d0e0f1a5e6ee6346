//! HTTP and WebSocket gateway in front of an [`Engine`](crate::Engine).
//!
//! REST routes submit and inspect executions; `/ws` streams execution events
//! to clients that subscribe to an execution id.

mod connection;
mod protocol;
mod routes;
mod server;

pub use protocol::{ClientFrame, ServerFrame};
pub use server::GatewayServer;
