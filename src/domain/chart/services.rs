use crate::domain::market_data::{Bar, BarSeries, MovingAverageEngine, Timestamp};
use serde::Serialize;

/// Indicator value for one window at the hovered bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndicatorValue {
    pub window: usize,
    pub value: Option<f64>,
}

/// Everything the OHLC overlay shows for one bar
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoverResult {
    pub index: usize,
    pub bar: Bar,
    pub indicators: Vec<IndicatorValue>,
    pub change_pct: f64,
    pub amplitude_pct: f64,
}

impl HoverResult {
    pub fn indicator(&self, window: usize) -> Option<f64> {
        self.indicators.iter().find(|iv| iv.window == window).and_then(|iv| iv.value)
    }
}

/// Domain service answering crosshair queries
#[derive(Debug, Clone, Copy, Default)]
pub struct HoverResolver;

impl HoverResolver {
    pub fn new() -> Self {
        Self
    }

    /// Exact open-time match, or the latest bar when `query` is `None`.
    /// `None` means nothing to show.
    pub fn resolve(
        &self,
        series: &BarSeries,
        indicators: &MovingAverageEngine,
        query: Option<Timestamp>,
    ) -> Option<HoverResult> {
        let index = match query {
            Some(time) => series.index_of(time)?,
            None => series.len().checked_sub(1)?,
        };
        let bar = series.get(index)?.clone();

        Some(HoverResult {
            index,
            indicators: indicators
                .values_at(index)
                .into_iter()
                .map(|(window, value)| IndicatorValue { window, value })
                .collect(),
            change_pct: bar.change_pct(),
            amplitude_pct: bar.amplitude_pct(),
            bar,
        })
    }
}
