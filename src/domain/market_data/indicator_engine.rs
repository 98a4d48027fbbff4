use super::entities::UpsertOutcome;
use serde::Serialize;
use std::collections::BTreeMap;

/// Moving-average values aligned 1:1 with the bars of a series.
///
/// `None` marks indices where fewer than `window` closes are available.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndicatorSeries {
    pub window: usize,
    values: Vec<Option<f64>>,
}

impl IndicatorSeries {
    pub fn new(window: usize) -> Self {
        Self { window, values: Vec::new() }
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied().flatten()
    }
}

/// Simple moving average of `closes` over `window`.
///
/// Each value is summed from its own window so incremental updates in
/// [`MovingAverageEngine::apply`] reproduce it bit for bit.
pub fn sma(closes: &[f64], window: usize) -> IndicatorSeries {
    let values = (0..closes.len()).map(|i| tail_average(closes, i, window)).collect();
    IndicatorSeries { window, values }
}

/// Full recompute for every window.
pub fn recompute(closes: &[f64], windows: &[usize]) -> BTreeMap<usize, IndicatorSeries> {
    windows.iter().map(|&w| (w, sma(closes, w))).collect()
}

/// Mean of the `window` closes ending at `index`, if that many exist.
fn tail_average(closes: &[f64], index: usize, window: usize) -> Option<f64> {
    if window == 0 || index + 1 < window || index >= closes.len() {
        return None;
    }
    let sum: f64 = closes[index + 1 - window..=index].iter().sum();
    Some(sum / window as f64)
}

/// Engine keeping one SMA series per configured window in step with a bar series
#[derive(Debug, Clone, Default)]
pub struct MovingAverageEngine {
    windows: Vec<usize>,
    series: BTreeMap<usize, IndicatorSeries>,
}

impl MovingAverageEngine {
    /// Zero and duplicate windows are dropped.
    pub fn new(windows: &[usize]) -> Self {
        let mut windows: Vec<usize> = windows.iter().copied().filter(|w| *w > 0).collect();
        windows.sort_unstable();
        windows.dedup();
        let series = windows.iter().map(|&w| (w, IndicatorSeries::new(w))).collect();
        Self { windows, series }
    }

    pub fn windows(&self) -> &[usize] {
        &self.windows
    }

    pub fn compute_historical(&mut self, closes: &[f64]) {
        self.series = recompute(closes, &self.windows);
    }

    /// Bring every series in line with `closes` after one upsert.
    ///
    /// `closes` is the post-upsert close sequence. Only the tail (and, after an
    /// eviction, the warm-up boundary) is touched; anything that does not line
    /// up falls back to a full recompute.
    pub fn apply(&mut self, outcome: UpsertOutcome, closes: &[f64]) {
        for (&window, series) in self.series.iter_mut() {
            match outcome {
                UpsertOutcome::Ignored(_) => {}
                UpsertOutcome::Updated => {
                    if series.values.len() != closes.len() || closes.is_empty() {
                        *series = sma(closes, window);
                        continue;
                    }
                    let last = closes.len() - 1;
                    series.values[last] = tail_average(closes, last, window);
                }
                UpsertOutcome::Appended { evicted } => {
                    if evicted && !series.values.is_empty() {
                        series.values.remove(0);
                        // the first defined value lost its oldest close
                        if window >= 2 && window - 2 < series.values.len() {
                            series.values[window - 2] = None;
                        }
                    }
                    if series.values.len() + 1 != closes.len() {
                        *series = sma(closes, window);
                        continue;
                    }
                    series.values.push(tail_average(closes, closes.len() - 1, window));
                }
            }
        }
    }

    pub fn series(&self, window: usize) -> Option<&IndicatorSeries> {
        self.series.get(&window)
    }

    pub fn all(&self) -> &BTreeMap<usize, IndicatorSeries> {
        &self.series
    }

    /// `(window, value)` for every window at `index`.
    pub fn values_at(&self, index: usize) -> Vec<(usize, Option<f64>)> {
        self.series.iter().map(|(&w, s)| (w, s.get(index))).collect()
    }

    pub fn clear(&mut self) {
        for series in self.series.values_mut() {
            series.values.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_matches_closed_form() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0], 3);
        assert_eq!(out.get(0), None);
        assert_eq!(out.get(1), None);
        assert_eq!(out.get(2), Some(2.0));
        assert_eq!(out.get(6), Some(6.0));
        assert_eq!(out.len(), 7);
    }

    #[test]
    fn window_longer_than_input_is_all_undefined() {
        let out = sma(&[1.0, 2.0], 5);
        assert_eq!(out.values(), &[None, None]);
    }

    #[test]
    fn engine_normalizes_windows() {
        let engine = MovingAverageEngine::new(&[25, 7, 0, 7, 99]);
        assert_eq!(engine.windows(), &[7, 25, 99]);
    }

    #[test]
    fn update_rewrites_only_the_tail() {
        let mut closes = vec![1.0, 2.0, 3.0, 4.0];
        let mut engine = MovingAverageEngine::new(&[2]);
        engine.compute_historical(&closes);
        closes[3] = 10.0;
        engine.apply(UpsertOutcome::Updated, &closes);
        assert_eq!(engine.series(2).unwrap(), &sma(&closes, 2));
        assert_eq!(engine.series(2).unwrap().last(), Some(6.5));
    }

    #[test]
    fn eviction_clears_warm_up_boundary() {
        let mut closes = vec![1.0, 2.0, 3.0, 4.0];
        let mut engine = MovingAverageEngine::new(&[3]);
        engine.compute_historical(&closes);
        closes.remove(0);
        closes.push(5.0);
        engine.apply(UpsertOutcome::Appended { evicted: true }, &closes);
        let expected = sma(&closes, 3);
        assert_eq!(engine.series(3).unwrap(), &expected);
        assert_eq!(expected.values(), &[None, None, Some(3.0), Some(4.0)]);
    }
}
