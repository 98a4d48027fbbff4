//! Browser-facing adapters: exchange feed, analytics API, console logging.

pub mod http;
pub mod services;
pub mod websocket;
