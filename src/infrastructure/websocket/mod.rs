//! Binance kline stream: wire DTOs, frame decoder and the live feed.

pub mod binance_client;
pub mod dto;

pub use binance_client::*;
pub use dto::{BinanceKline, BinanceKlineData, BinanceKlineDecoder};
