use crate::domain::{
    errors::{ChartError, ChartResult},
    market_data::{Bar, FrameDecoder, LiveBar, OHLCV, Price, Timestamp, Volume},
};
use serde::{Deserialize, Deserializer};

/// Kline stream envelope (`<symbol>@kline_<interval>`)
#[derive(Debug, Deserialize)]
pub struct BinanceKlineData {
    #[serde(rename = "e", default)]
    pub event_type: Option<String>,
    #[serde(rename = "s", default)]
    pub symbol: Option<String>,
    #[serde(rename = "k")]
    pub kline: BinanceKline,
}

#[derive(Debug, Deserialize)]
pub struct BinanceKline {
    #[serde(rename = "t", deserialize_with = "millis")]
    pub start_time: u64,
    #[serde(rename = "T", deserialize_with = "millis")]
    pub close_time: u64,
    #[serde(rename = "o", deserialize_with = "decimal")]
    pub open_price: f64,
    #[serde(rename = "h", deserialize_with = "decimal")]
    pub high_price: f64,
    #[serde(rename = "l", deserialize_with = "decimal")]
    pub low_price: f64,
    #[serde(rename = "c", deserialize_with = "decimal")]
    pub close_price: f64,
    #[serde(rename = "v", deserialize_with = "decimal")]
    pub base_asset_volume: f64,
    #[serde(rename = "x", default)]
    pub is_kline_closed: bool,
}

impl BinanceKline {
    pub fn to_live_bar(&self) -> LiveBar {
        let ohlcv = OHLCV::new(
            Price::new(self.open_price),
            Price::new(self.high_price),
            Price::new(self.low_price),
            Price::new(self.close_price),
            Volume::new(self.base_asset_volume),
        );
        let bar = Bar::new(Timestamp::from_millis(self.start_time), Timestamp::from_millis(self.close_time), ohlcv);
        LiveBar::new(bar, self.is_kline_closed)
    }
}

/// Binance sends prices as decimal strings; tolerate plain numbers too.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

pub(crate) fn decimal<'de, De>(deserializer: De) -> Result<f64, De::Error>
where
    De: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom),
    }
}

fn millis<'de, De>(deserializer: De) -> Result<u64, De::Error>
where
    De: Deserializer<'de>,
{
    let value = decimal(deserializer)?;
    if !value.is_finite() || value < 0.0 {
        return Err(serde::de::Error::custom(format!("invalid timestamp {value}")));
    }
    Ok(value as u64)
}

/// [`FrameDecoder`] for raw Binance kline text frames
#[derive(Debug, Clone, Copy, Default)]
pub struct BinanceKlineDecoder;

impl BinanceKlineDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl FrameDecoder for BinanceKlineDecoder {
    fn decode(&self, frame: &str) -> ChartResult<LiveBar> {
        let data: BinanceKlineData = serde_json::from_str(frame)
            .map_err(|e| ChartError::Decode(format!("Failed to parse Binance message: {e}")))?;
        Ok(data.kline.to_live_bar())
    }
}
