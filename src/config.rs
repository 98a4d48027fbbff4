use crate::domain::errors::{ChartError, ChartResult};
use crate::domain::market_data::MIN_MAX_BARS;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: usize = 1000;
pub const DEFAULT_MA_WINDOWS: [usize; 3] = [7, 25, 99];
pub const DEFAULT_RIGHT_OFFSET_BARS: f64 = 6.0;
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";
pub const DEFAULT_STREAM_BASE: &str = "wss://stream.binance.com:9443/ws";

/// Upper bound on bars requested from the history endpoint per load.
const HISTORY_FETCH_CAP: usize = 500;

/// Chart engine settings, usually parsed from the page's JSON options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChartConfig {
    pub limit: usize,
    pub ma_windows: Vec<usize>,
    pub right_offset_bars: f64,
    pub api_base: String,
    pub stream_base: String,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            ma_windows: DEFAULT_MA_WINDOWS.to_vec(),
            right_offset_bars: DEFAULT_RIGHT_OFFSET_BARS,
            api_base: DEFAULT_API_BASE.to_string(),
            stream_base: DEFAULT_STREAM_BASE.to_string(),
        }
    }
}

impl ChartConfig {
    pub fn from_json(json: &str) -> ChartResult<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json).map_err(|e| ChartError::InvalidInput(format!("chart config: {e}")))
    }

    /// Buffer capacity: the user limit, never below 500.
    pub fn max_bars(&self) -> usize {
        self.limit.max(MIN_MAX_BARS)
    }

    /// Bars requested when seeding a session.
    pub fn history_limit(&self) -> usize {
        self.limit.min(HISTORY_FETCH_CAP)
    }
}
