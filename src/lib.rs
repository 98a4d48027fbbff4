//! Real-time OHLC chart engine: a bounded bar buffer fed by history plus a
//! live kline stream, moving averages kept in step, a camera that fits once
//! and then follows the market until the user takes over, and crosshair
//! lookups. Compiled to WASM for the dashboard; the logic layers are plain
//! Rust and run natively in tests.

use wasm_bindgen::prelude::*;

use crate::domain::logging::LogComponent;

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use application::{ChartCoordinator, StreamMerger, SwitchTicket};
pub use config::ChartConfig;
pub use domain::errors::{ChartError, ChartResult};

/// Install the panic hook, console logger and browser clock.
#[wasm_bindgen(start)]
pub fn initialize() {
    console_error_panic_hook::set_once();

    let logger = if cfg!(debug_assertions) {
        infrastructure::services::ConsoleLogger::new_development()
    } else {
        infrastructure::services::ConsoleLogger::new_production()
    };
    domain::logging::init_logger(Box::new(logger));
    domain::logging::init_time_provider(Box::new(infrastructure::services::BrowserTimeProvider::new()));

    crate::log_info!(LogComponent::Presentation("Initialize"), "live chart engine ready");
}
