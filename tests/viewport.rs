use live_chart_engine::ChartConfig;
use live_chart_engine::domain::chart::{
    ChartSession, RangeChangeSource, ViewportCommand, ViewportController, ViewportState, VisibleRange,
};
use live_chart_engine::domain::market_data::{
    Bar, LiveBar, OHLCV, Price, SessionKey, Symbol, TimeInterval, Timestamp, Volume,
};
use quickcheck_macros::quickcheck;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen_test::*;

fn bar(minute: u64, close: f64) -> Bar {
    let p = Price::new(close);
    Bar::new(
        Timestamp::from_millis(minute * 60_000),
        Timestamp::from_millis(minute * 60_000 + 59_999),
        OHLCV::new(p, p, p, p, Volume::new(1.0)),
    )
}

fn key(symbol: &str, interval: TimeInterval) -> SessionKey {
    SessionKey::new(Symbol::from(symbol), interval)
}

fn seeded_session(len: u64) -> ChartSession {
    let mut session = ChartSession::new(key("BTCUSDT", TimeInterval::OneMinute), &ChartConfig::default());
    session.load_history((0..len).map(|m| bar(m, 1.0)).collect()).unwrap();
    session
}

#[quickcheck]
fn key_change_always_resets_flags(interacted: bool, extra_bars: u8) -> bool {
    let mut session = seeded_session(20);
    for m in 20..20 + extra_bars as u64 {
        session.apply_live_bar(LiveBar::new(bar(m, 2.0), true));
    }
    if interacted {
        session.on_visible_range_changed(VisibleRange::new(3.0, 9.0), RangeChangeSource::User);
    }
    session.reset(key("ETHUSDT", TimeInterval::OneMinute));
    session.viewport_state() == ViewportState::default() && session.visible_range().is_none()
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), test)]
fn interval_change_is_a_key_change() {
    let mut session = seeded_session(5);
    assert!(session.reset(key("BTCUSDT", TimeInterval::FiveMinutes)));
    assert_eq!(session.viewport_state(), ViewportState::default());
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), test)]
fn user_pan_suppresses_auto_follow_until_key_change() {
    let mut session = seeded_session(50);
    let user_range = VisibleRange::new(10.0, 30.0);
    session.on_visible_range_changed(user_range, RangeChangeSource::User);

    for m in 50..60 {
        let event = session.apply_live_bar(LiveBar::new(bar(m, 3.0), true)).unwrap();
        assert_eq!(event.viewport(), ViewportCommand::None);
    }
    assert_eq!(session.visible_range(), Some(user_range));

    session.reset(key("SOLUSDT", TimeInterval::OneMinute));
    let loaded = session.load_history((0..5).map(|m| bar(m, 1.0)).collect()).unwrap();
    assert!(matches!(loaded.viewport(), ViewportCommand::FitContent(_)));
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), test)]
fn fit_happens_once_then_scroll_keeps_width() {
    let mut vc = ViewportController::new(6.0);
    assert_eq!(vc.on_data(100), ViewportCommand::FitContent(VisibleRange::new(0.0, 105.0)));

    vc.on_range_changed(VisibleRange::new(70.0, 105.0), RangeChangeSource::Programmatic);
    assert_eq!(vc.on_data(101), ViewportCommand::ScrollToRealtime(VisibleRange::new(71.0, 106.0)));
    assert_eq!(vc.on_data(101), ViewportCommand::ScrollToRealtime(VisibleRange::new(71.0, 106.0)));
    assert!(vc.state().has_fit_once);
    assert!(!vc.state().has_user_interacted);
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), test)]
fn camera_math_helpers() {
    let range = VisibleRange::new(10.0, 30.0);
    assert_eq!(range.pan(-5.0), VisibleRange::new(5.0, 25.0));
    assert_eq!(range.zoom(2.0, 0.5), VisibleRange::new(15.0, 25.0));
    assert_eq!(range.zoom(0.0, 0.5), range);
    assert!(!VisibleRange::new(f64::NAN, 4.5).is_finite());
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), test)]
fn non_finite_report_does_not_poison_follow_mode() {
    let mut session = seeded_session(20);
    let fitted = session.visible_range().unwrap();
    session.on_visible_range_changed(VisibleRange::new(f64::NAN, f64::INFINITY), RangeChangeSource::User);
    assert_eq!(session.visible_range(), Some(fitted));
    assert!(!session.viewport_state().has_user_interacted);

    let event = session.apply_live_bar(LiveBar::new(bar(20, 2.0), true)).unwrap();
    let range = event.viewport().range().unwrap();
    assert!(range.is_finite());
    assert_eq!(range, VisibleRange::new(1.0, 26.0));
}
