use serde::{Deserialize, Serialize};

/// Value Object - visible window in logical bar-index space.
///
/// Index `0` is the oldest stored bar; `to` may run past the last bar to
/// leave empty space on the right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisibleRange {
    pub from: f64,
    pub to: f64,
}

impl VisibleRange {
    pub fn new(from: f64, to: f64) -> Self {
        if from <= to { Self { from, to } } else { Self { from: to, to: from } }
    }

    pub fn width(&self) -> f64 {
        self.to - self.from
    }

    /// Whole series plus `right_offset` bars of space.
    pub fn fit(bar_count: usize, right_offset: f64) -> Self {
        let last = bar_count.saturating_sub(1) as f64;
        Self::new(0.0, last + right_offset)
    }

    /// Same width, right edge pinned `right_offset` bars past the last bar.
    pub fn pinned_to_latest(&self, bar_count: usize, right_offset: f64) -> Self {
        let to = bar_count.saturating_sub(1) as f64 + right_offset;
        Self::new(to - self.width(), to)
    }

    /// Shift by `delta_bars` (positive moves toward newer bars).
    pub fn pan(&self, delta_bars: f64) -> Self {
        Self::new(self.from + delta_bars, self.to + delta_bars)
    }

    /// Zoom by `factor` (> 1 zooms in) keeping the bar at `anchor_ratio`
    /// of the width fixed on screen.
    pub fn zoom(&self, factor: f64, anchor_ratio: f64) -> Self {
        if factor <= 0.0 || !factor.is_finite() {
            return *self;
        }
        let anchor_ratio = anchor_ratio.clamp(0.0, 1.0);
        let anchor = self.from + self.width() * anchor_ratio;
        let new_width = self.width() / factor;
        let from = anchor - new_width * anchor_ratio;
        Self::new(from, from + new_width)
    }

    pub fn is_finite(&self) -> bool {
        self.from.is_finite() && self.to.is_finite()
    }
}

/// Value Object - the two camera flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportState {
    pub has_user_interacted: bool,
    pub has_fit_once: bool,
}

/// Who moved the visible range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeChangeSource {
    /// Echo of a range the engine itself applied.
    Programmatic,
    /// Pan, zoom or scroll by the user.
    User,
}

/// Instruction for the rendering surface after new data
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "range")]
pub enum ViewportCommand {
    None,
    FitContent(VisibleRange),
    ScrollToRealtime(VisibleRange),
}

impl ViewportCommand {
    pub fn range(&self) -> Option<VisibleRange> {
        match self {
            ViewportCommand::None => None,
            ViewportCommand::FitContent(range) | ViewportCommand::ScrollToRealtime(range) => Some(*range),
        }
    }
}
