//! HTTP API for operators and room views
//!
//! JSON endpoints over `DrawEngine` plus a per-draw WebSocket event stream.

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod websocket;

pub use server::{create_app, ApiServer};
