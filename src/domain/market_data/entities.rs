use super::services::DataValidationService;
use super::value_objects::{OHLCV, Price, Timestamp};
use crate::domain::errors::ChartResult;
use crate::domain::logging::LogComponent;
use crate::log_debug;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Smallest capacity a series is ever created with.
pub const MIN_MAX_BARS: usize = 500;

/// Domain entity - one OHLCV interval keyed by its open time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub open_time: Timestamp,
    pub close_time: Timestamp,
    pub ohlcv: OHLCV,
}

impl Bar {
    pub fn new(open_time: Timestamp, close_time: Timestamp, ohlcv: OHLCV) -> Self {
        Self { open_time, close_time, ohlcv }
    }

    /// `(close - open) / open` in percent, 0 for a zero open.
    pub fn change_pct(&self) -> f64 {
        let open = self.ohlcv.open.value();
        if open == 0.0 { 0.0 } else { (self.ohlcv.close.value() - open) / open * 100.0 }
    }

    /// `(high - low) / open` in percent, 0 for a zero open.
    pub fn amplitude_pct(&self) -> f64 {
        let open = self.ohlcv.open.value();
        if open == 0.0 { 0.0 } else { (self.ohlcv.high.value() - self.ohlcv.low.value()) / open * 100.0 }
    }
}

/// A bar as delivered by the live feed, with the exchange's "interval closed" flag.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveBar {
    pub bar: Bar,
    pub is_final: bool,
}

impl LiveBar {
    pub fn new(bar: Bar, is_final: bool) -> Self {
        Self { bar, is_final }
    }
}

/// Why an upsert left the series untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IgnoreReason {
    /// Open time older than the last stored bar.
    Stale,
    /// Newer open time but the interval has not closed yet.
    Unfinalized,
    /// Nothing seeded yet.
    EmptyBuffer,
}

/// Result of [`BarSeries::upsert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Updated,
    Appended { evicted: bool },
    Ignored(IgnoreReason),
}

impl UpsertOutcome {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, UpsertOutcome::Ignored(_))
    }
}

/// Per-series counters kept for observability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeriesCounters {
    pub updated: u64,
    pub appended: u64,
    pub evicted: u64,
    pub ignored_stale: u64,
    pub ignored_unfinalized: u64,
    pub ignored_empty: u64,
}

impl SeriesCounters {
    pub fn ignored(&self) -> u64 {
        self.ignored_stale + self.ignored_unfinalized + self.ignored_empty
    }
}

/// Domain entity - bounded, strictly time-ordered bar store
#[derive(Debug, Clone)]
pub struct BarSeries {
    bars: VecDeque<Bar>,
    max_bars: usize,
    counters: SeriesCounters,
}

impl BarSeries {
    pub fn new(max_bars: usize) -> Self {
        let max_bars = max_bars.max(MIN_MAX_BARS);
        Self { bars: VecDeque::with_capacity(max_bars), max_bars, counters: SeriesCounters::default() }
    }

    /// Replace the whole series with a historical batch.
    ///
    /// The batch must be strictly ascending by open time; on error the series
    /// is left exactly as it was. A batch larger than the capacity keeps its
    /// most recent `max_bars` bars.
    pub fn initialize(&mut self, bars: Vec<Bar>, max_bars: usize) -> ChartResult<()> {
        DataValidationService::new().validate_bar_sequence(&bars)?;

        let max_bars = max_bars.max(MIN_MAX_BARS);
        let mut bars = VecDeque::from(bars);
        while bars.len() > max_bars {
            bars.pop_front();
        }
        self.bars = bars;
        self.max_bars = max_bars;
        self.counters = SeriesCounters::default();
        Ok(())
    }

    /// Merge one live bar into the tail of the series.
    pub fn upsert(&mut self, bar: Bar, is_final: bool) -> UpsertOutcome {
        let outcome = match self.bars.back_mut() {
            None => UpsertOutcome::Ignored(IgnoreReason::EmptyBuffer),
            Some(last) if last.open_time == bar.open_time => {
                *last = bar;
                UpsertOutcome::Updated
            }
            Some(last) if bar.open_time < last.open_time => UpsertOutcome::Ignored(IgnoreReason::Stale),
            Some(_) if !is_final => UpsertOutcome::Ignored(IgnoreReason::Unfinalized),
            Some(_) => {
                self.bars.push_back(bar);
                let evicted = self.bars.len() > self.max_bars;
                if evicted {
                    self.bars.pop_front();
                }
                UpsertOutcome::Appended { evicted }
            }
        };
        self.count(outcome);
        outcome
    }

    fn count(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Updated => self.counters.updated += 1,
            UpsertOutcome::Appended { evicted } => {
                self.counters.appended += 1;
                if evicted {
                    self.counters.evicted += 1;
                }
            }
            UpsertOutcome::Ignored(reason) => {
                log_debug!(LogComponent::Domain("BarSeries"), "ignored live bar: {:?}", reason);
                match reason {
                    IgnoreReason::Stale => self.counters.ignored_stale += 1,
                    IgnoreReason::Unfinalized => self.counters.ignored_unfinalized += 1,
                    IgnoreReason::EmptyBuffer => self.counters.ignored_empty += 1,
                }
            }
        }
    }

    /// Owned copy of the ordered bars.
    pub fn snapshot(&self) -> Vec<Bar> {
        self.bars.iter().cloned().collect()
    }

    pub fn bars(&self) -> &VecDeque<Bar> {
        &self.bars
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|bar| bar.ohlcv.close.value()).collect()
    }

    /// Index of the bar opening exactly at `open_time`.
    pub fn index_of(&self, open_time: Timestamp) -> Option<usize> {
        self.bars.binary_search_by(|bar| bar.open_time.cmp(&open_time)).ok()
    }

    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn latest(&self) -> Option<&Bar> {
        self.bars.back()
    }

    pub fn latest_price(&self) -> Option<Price> {
        self.bars.back().map(|bar| bar.ohlcv.close)
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn max_bars(&self) -> usize {
        self.max_bars
    }

    pub fn counters(&self) -> SeriesCounters {
        self.counters
    }

    pub fn clear(&mut self) {
        self.bars.clear();
        self.counters = SeriesCounters::default();
    }
}
