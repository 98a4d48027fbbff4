use super::services::{HoverResolver, HoverResult};
use super::value_objects::{RangeChangeSource, ViewportState, VisibleRange};
use super::viewport::ViewportController;
use crate::config::ChartConfig;
use crate::domain::errors::ChartResult;
use crate::domain::events::ChartEvent;
use crate::domain::logging::LogComponent;
use crate::domain::market_data::{
    Bar, BarSeries, IndicatorSeries, LiveBar, MovingAverageEngine, Price, SeriesCounters, SessionKey,
    Timestamp, UpsertOutcome,
};
use crate::log_info;
use serde::Serialize;
use std::collections::BTreeMap;

/// Observability counters for one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub updated: u64,
    pub appended: u64,
    pub evicted: u64,
    pub ignored: u64,
    pub ignored_stale: u64,
    pub ignored_unfinalized: u64,
    pub ignored_empty: u64,
    pub decode_errors: u64,
    pub dropped_after_teardown: u64,
}

impl SessionStats {
    fn from_counters(counters: SeriesCounters, decode_errors: u64, dropped_after_teardown: u64) -> Self {
        Self {
            updated: counters.updated,
            appended: counters.appended,
            evicted: counters.evicted,
            ignored: counters.ignored(),
            ignored_stale: counters.ignored_stale,
            ignored_unfinalized: counters.ignored_unfinalized,
            ignored_empty: counters.ignored_empty,
            decode_errors,
            dropped_after_teardown,
        }
    }
}

/// Aggregate owning everything shown for one `(symbol, interval)` key.
///
/// Each concern has one mutation entry point: bars go through
/// [`load_history`](Self::load_history) / [`apply_live_bar`](Self::apply_live_bar),
/// the camera through [`on_visible_range_changed`](Self::on_visible_range_changed).
#[derive(Debug, Clone)]
pub struct ChartSession {
    key: SessionKey,
    max_bars: usize,
    series: BarSeries,
    indicators: MovingAverageEngine,
    viewport: ViewportController,
    hover: HoverResolver,
    last_price: Option<Price>,
    decode_errors: u64,
    dropped_after_teardown: u64,
}

impl ChartSession {
    pub fn new(key: SessionKey, config: &ChartConfig) -> Self {
        Self {
            key,
            max_bars: config.max_bars(),
            series: BarSeries::new(config.max_bars()),
            indicators: MovingAverageEngine::new(&config.ma_windows),
            viewport: ViewportController::new(config.right_offset_bars),
            hover: HoverResolver::new(),
            last_price: None,
            decode_errors: 0,
            dropped_after_teardown: 0,
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Drop all data ahead of a (re)load. The camera flags only reset when
    /// the key actually changes. Returns whether it did.
    pub fn reset(&mut self, key: SessionKey) -> bool {
        let key_changed = key != self.key;
        if key_changed {
            self.viewport.reset();
        }
        self.key = key;
        self.series.clear();
        self.indicators.clear();
        self.last_price = None;
        self.decode_errors = 0;
        self.dropped_after_teardown = 0;
        key_changed
    }

    /// Seed the session from a finalized historical batch.
    pub fn load_history(&mut self, bars: Vec<Bar>) -> ChartResult<ChartEvent> {
        self.series.initialize(bars, self.max_bars)?;
        self.indicators.compute_historical(&self.series.closes());
        self.last_price = self.series.latest_price();
        let viewport = self.viewport.on_data(self.series.len());

        log_info!(
            LogComponent::Domain("ChartSession"),
            "{}: seeded {} bars",
            self.key,
            self.series.len()
        );

        Ok(ChartEvent::HistoryLoaded { key: self.key.clone(), bar_count: self.series.len(), viewport })
    }

    /// Merge one live bar; `None` when nothing changed.
    pub fn apply_live_bar(&mut self, live: LiveBar) -> Option<ChartEvent> {
        self.last_price = Some(live.bar.ohlcv.close);
        let open_time = live.bar.open_time;

        let outcome = self.series.upsert(live.bar, live.is_final);
        if !outcome.is_mutation() {
            return None;
        }

        self.indicators.apply(outcome, &self.series.closes());
        let viewport = self.viewport.on_data(self.series.len());

        match outcome {
            UpsertOutcome::Updated => Some(ChartEvent::BarUpdated { open_time, viewport }),
            UpsertOutcome::Appended { evicted } => Some(ChartEvent::BarAppended { open_time, evicted, viewport }),
            UpsertOutcome::Ignored(_) => None,
        }
    }

    pub fn on_visible_range_changed(&mut self, range: VisibleRange, source: RangeChangeSource) {
        self.viewport.on_range_changed(range, source);
    }

    pub fn pan_view(&mut self, delta_bars: f64) -> Option<VisibleRange> {
        self.viewport.pan(delta_bars)
    }

    pub fn zoom_view(&mut self, factor: f64, anchor_ratio: f64) -> Option<VisibleRange> {
        self.viewport.zoom(factor, anchor_ratio)
    }

    pub fn record_decode_error(&mut self) {
        self.decode_errors += 1;
    }

    pub fn record_dropped_after_teardown(&mut self) {
        self.dropped_after_teardown += 1;
    }

    pub fn hover(&self, query: Option<Timestamp>) -> Option<HoverResult> {
        self.hover.resolve(&self.series, &self.indicators, query)
    }

    pub fn snapshot(&self) -> Vec<Bar> {
        self.series.snapshot()
    }

    pub fn series(&self) -> &BarSeries {
        &self.series
    }

    pub fn indicator_series(&self) -> &BTreeMap<usize, IndicatorSeries> {
        self.indicators.all()
    }

    pub fn viewport_state(&self) -> ViewportState {
        self.viewport.state()
    }

    pub fn visible_range(&self) -> Option<VisibleRange> {
        self.viewport.visible_range()
    }

    pub fn last_price(&self) -> Option<Price> {
        self.last_price
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats::from_counters(self.series.counters(), self.decode_errors, self.dropped_after_teardown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chart::ViewportCommand;
    use crate::domain::market_data::{OHLCV, Symbol, TimeInterval, Volume};

    fn key(symbol: &str) -> SessionKey {
        SessionKey::new(Symbol::from(symbol), TimeInterval::OneMinute)
    }

    fn bar(i: u64, close: f64) -> Bar {
        Bar::new(
            Timestamp::from_millis(i * 60_000),
            Timestamp::from_millis(i * 60_000 + 59_999),
            OHLCV::new(Price::new(close), Price::new(close), Price::new(close), Price::new(close), Volume::new(1.0)),
        )
    }

    #[test]
    fn ignored_live_bar_still_moves_last_price() {
        let mut session = ChartSession::new(key("BTCUSDT"), &ChartConfig::default());
        session.load_history((0..3).map(|i| bar(i, 1.0)).collect()).unwrap();

        let event = session.apply_live_bar(LiveBar::new(bar(5, 9.0), false));
        assert_eq!(event, None);
        assert_eq!(session.last_price(), Some(Price::new(9.0)));
        assert_eq!(session.stats().ignored_unfinalized, 1);
    }

    #[test]
    fn same_key_reload_keeps_camera_flags() {
        let mut session = ChartSession::new(key("BTCUSDT"), &ChartConfig::default());
        session.load_history((0..3).map(|i| bar(i, 1.0)).collect()).unwrap();
        session.on_visible_range_changed(VisibleRange::new(0.0, 1.0), RangeChangeSource::User);

        assert!(!session.reset(key("BTCUSDT")));
        assert!(session.snapshot().is_empty());
        assert_eq!(session.viewport_state(), ViewportState { has_user_interacted: true, has_fit_once: true });

        assert!(session.reset(key("ETHUSDT")));
        assert_eq!(session.viewport_state(), ViewportState::default());
    }

    #[test]
    fn history_load_fits_once() {
        let mut session = ChartSession::new(key("BTCUSDT"), &ChartConfig::default());
        let event = session.load_history((0..10).map(|i| bar(i, 1.0)).collect()).unwrap();
        assert!(matches!(event.viewport(), ViewportCommand::FitContent(_)));
        let next = session.apply_live_bar(LiveBar::new(bar(10, 2.0), true)).unwrap();
        assert!(matches!(next.viewport(), ViewportCommand::ScrollToRealtime(_)));
    }
}
