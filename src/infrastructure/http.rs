use crate::config::DEFAULT_API_BASE;
use crate::domain::{
    errors::{ChartError, ChartResult},
    logging::LogComponent,
    market_data::{Bar, HistoricalBarSource, OHLCV, Price, SessionKey, Timestamp, Volume},
};
use crate::infrastructure::websocket::dto::decimal;
use crate::{log_info, log_warn};
use chrono::{DateTime, Utc};
use gloo_net::http::Request;
use serde::Deserialize;

/// One row of the analytics API `/klines` response
#[derive(Debug, Deserialize)]
pub struct AnalyticsKline {
    pub open_time: DateTime<Utc>,
    #[serde(deserialize_with = "decimal")]
    pub open: f64,
    #[serde(deserialize_with = "decimal")]
    pub high: f64,
    #[serde(deserialize_with = "decimal")]
    pub low: f64,
    #[serde(deserialize_with = "decimal")]
    pub close: f64,
    #[serde(deserialize_with = "decimal")]
    pub volume: f64,
    pub close_time: DateTime<Utc>,
}

impl AnalyticsKline {
    pub fn to_bar(&self) -> ChartResult<Bar> {
        let ohlcv = OHLCV::new(
            Price::new(self.open),
            Price::new(self.high),
            Price::new(self.low),
            Price::new(self.close),
            Volume::new(self.volume),
        );
        Ok(Bar::new(to_timestamp(self.open_time)?, to_timestamp(self.close_time)?, ohlcv))
    }
}

fn to_timestamp(time: DateTime<Utc>) -> ChartResult<Timestamp> {
    u64::try_from(time.timestamp_millis())
        .map(Timestamp::from_millis)
        .map_err(|_| ChartError::InvalidInput(format!("timestamp before epoch: {time}")))
}

/// Parse a `/klines` JSON body into bars, oldest first as delivered.
pub fn parse_klines(body: &str) -> ChartResult<Vec<Bar>> {
    let rows: Vec<AnalyticsKline> =
        serde_json::from_str(body).map_err(|e| ChartError::Network(format!("Failed to parse klines: {e}")))?;
    rows.iter().map(AnalyticsKline::to_bar).collect()
}

/// [`HistoricalBarSource`] backed by the dashboard's analytics REST API
#[derive(Debug, Clone)]
pub struct AnalyticsApiClient {
    base_url: String,
}

impl Default for AnalyticsApiClient {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE)
    }
}

impl AnalyticsApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }

    pub fn klines_url(&self, key: &SessionKey, limit: usize) -> String {
        format!(
            "{}/klines?symbol={}&interval={}&limit={}",
            self.base_url.trim_end_matches('/'),
            key.symbol.value(),
            key.interval.to_binance_str(),
            limit
        )
    }
}

impl HistoricalBarSource for AnalyticsApiClient {
    async fn fetch_historical_bars(&self, key: &SessionKey, limit: usize) -> ChartResult<Vec<Bar>> {
        let url = self.klines_url(key, limit);
        log_info!(LogComponent::Infrastructure("AnalyticsApi"), "fetching {} bars: {}", limit, url);

        let response = Request::get(&url)
            .send()
            .await
            .map_err(|e| ChartError::Network(format!("Failed to send request: {e:?}")))?;

        if !response.ok() {
            log_warn!(
                LogComponent::Infrastructure("AnalyticsApi"),
                "{} answered {} {}",
                url,
                response.status(),
                response.status_text()
            );
            return Err(ChartError::Network(format!(
                "HTTP error: {} - {}",
                response.status(),
                response.status_text()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ChartError::Network(format!("Failed to read response: {e:?}")))?;
        let bars = parse_klines(&body)?;

        log_info!(LogComponent::Infrastructure("AnalyticsApi"), "loaded {} bars for {}", bars.len(), key);
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market_data::{Symbol, TimeInterval};

    #[test]
    fn klines_url_carries_key_and_limit() {
        let client = AnalyticsApiClient::new("http://localhost:8000/");
        let key = SessionKey::new(Symbol::from("solusdt"), TimeInterval::OneHour);
        assert_eq!(client.klines_url(&key, 500), "http://localhost:8000/klines?symbol=SOLUSDT&interval=1h&limit=500");
    }

    #[test]
    fn parses_pandas_style_records() {
        let body = r#"[
            {"open_time": "2024-01-01T00:00:00+00:00", "open": 42000.5, "high": "42100", "low": 41950,
             "close": 42050, "volume": 12.25, "close_time": "2024-01-01T00:59:59.999000+00:00"},
            {"open_time": "2024-01-01T01:00:00Z", "open": 42050, "high": 42060, "low": 42000,
             "close": 42010, "volume": 3, "close_time": "2024-01-01T01:59:59.999Z"}
        ]"#;
        let bars = parse_klines(body).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].open_time, Timestamp::from_millis(1_704_067_200_000));
        assert_eq!(bars[0].close_time, Timestamp::from_millis(1_704_070_799_999));
        assert_eq!(bars[0].ohlcv.high, Price::new(42100.0));
        assert_eq!(bars[1].open_time.value() - bars[0].open_time.value(), 3_600_000);
    }

    #[test]
    fn malformed_body_is_a_network_error() {
        assert!(matches!(parse_klines("{\"detail\": \"boom\"}"), Err(ChartError::Network(_))));
    }
}
