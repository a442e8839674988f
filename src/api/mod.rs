//! HTTP/WebSocket surface for the round engine
//!
//! Thin request/response layer: every mutation is forwarded to the engine's
//! public operations and every viewer stream is bridged from the subscriber
//! hub. No game logic lives here.

pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod server;
pub mod websocket;

pub use handlers::AppState;
