use super::value_objects::{RangeChangeSource, ViewportCommand, ViewportState, VisibleRange};
use crate::domain::logging::LogComponent;
use crate::log_debug;

/// Camera policy: fit once per session key, then follow the newest bar until
/// the user moves the view, after which data never moves it again.
#[derive(Debug, Clone)]
pub struct ViewportController {
    state: ViewportState,
    visible: Option<VisibleRange>,
    right_offset: f64,
}

impl ViewportController {
    pub fn new(right_offset: f64) -> Self {
        Self { state: ViewportState::default(), visible: None, right_offset: right_offset.max(0.0) }
    }

    pub fn state(&self) -> ViewportState {
        self.state
    }

    pub fn visible_range(&self) -> Option<VisibleRange> {
        self.visible
    }

    /// Back to `{not-fit, auto}`; called on every session key change.
    pub fn reset(&mut self) {
        self.state = ViewportState::default();
        self.visible = None;
    }

    /// React to the series now holding `bar_count` bars.
    pub fn on_data(&mut self, bar_count: usize) -> ViewportCommand {
        if bar_count == 0 {
            return ViewportCommand::None;
        }

        if !self.state.has_fit_once {
            let range = VisibleRange::fit(bar_count, self.right_offset);
            self.visible = Some(range);
            self.state.has_fit_once = true;
            log_debug!(LogComponent::Domain("Viewport"), "fit to {} bars", bar_count);
            return ViewportCommand::FitContent(range);
        }

        if self.state.has_user_interacted {
            return ViewportCommand::None;
        }

        let current = self.visible.unwrap_or_else(|| VisibleRange::fit(bar_count, self.right_offset));
        let range = current.pinned_to_latest(bar_count, self.right_offset);
        self.visible = Some(range);
        ViewportCommand::ScrollToRealtime(range)
    }

    /// The rendering surface reports a new visible range. Non-finite
    /// ranges are ignored.
    pub fn on_range_changed(&mut self, range: VisibleRange, source: RangeChangeSource) {
        if !range.is_finite() {
            log_debug!(LogComponent::Domain("Viewport"), "ignored non-finite range {:?}", range);
            return;
        }
        if source == RangeChangeSource::User && !self.state.has_user_interacted {
            log_debug!(LogComponent::Domain("Viewport"), "user took control of the view");
            self.state.has_user_interacted = true;
        }
        self.visible = Some(range);
    }

    /// User pan by `delta_bars`. `None` until something is on screen.
    pub fn pan(&mut self, delta_bars: f64) -> Option<VisibleRange> {
        if !delta_bars.is_finite() {
            return None;
        }
        let range = self.visible?.pan(delta_bars);
        self.on_range_changed(range, RangeChangeSource::User);
        Some(range)
    }

    /// User zoom around `anchor_ratio` of the current width.
    pub fn zoom(&mut self, factor: f64, anchor_ratio: f64) -> Option<VisibleRange> {
        let range = self.visible?.zoom(factor, anchor_ratio);
        if !range.is_finite() {
            return None;
        }
        self.on_range_changed(range, RangeChangeSource::User);
        Some(range)
    }
}
