use live_chart_engine::ChartConfig;
use live_chart_engine::StreamMerger;
use live_chart_engine::domain::chart::ChartSession;
use live_chart_engine::domain::events::ChartEvent;
use live_chart_engine::domain::market_data::{
    Bar, FrameDecoder, OHLCV, Price, SessionKey, Symbol, TimeInterval, Timestamp, Volume,
};
use live_chart_engine::infrastructure::websocket::BinanceKlineDecoder;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen_test::*;

const MINUTE: u64 = 60_000;

fn kline_frame(minute: u64, close: &str, is_final: bool) -> String {
    format!(
        r#"{{"e":"kline","E":1,"s":"BTCUSDT","k":{{"t":{t},"T":{end},"s":"BTCUSDT","i":"1m","o":"100.0","h":"200.0","l":"50.0","c":"{close}","v":"4.5","x":{is_final}}}}}"#,
        t = minute * MINUTE,
        end = minute * MINUTE + MINUTE - 1,
    )
}

fn seeded() -> ChartSession {
    let key = SessionKey::new(Symbol::from("BTCUSDT"), TimeInterval::OneMinute);
    let mut session = ChartSession::new(key, &ChartConfig::default());
    let p = Price::new(100.0);
    let history = (0..3)
        .map(|m| {
            Bar::new(
                Timestamp::from_millis(m * MINUTE),
                Timestamp::from_millis(m * MINUTE + MINUTE - 1),
                OHLCV::new(p, p, p, p, Volume::new(1.0)),
            )
        })
        .collect();
    session.load_history(history).unwrap();
    session
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), test)]
fn parses_kline_message() {
    let live = BinanceKlineDecoder::new().decode(&kline_frame(7, "150.25", true)).unwrap();
    assert!(live.is_final);
    assert_eq!(live.bar.open_time.value(), 7 * MINUTE);
    assert_eq!(live.bar.close_time.value(), 8 * MINUTE - 1);
    assert!((live.bar.ohlcv.close.value() - 150.25).abs() < f64::EPSILON);
    assert!((live.bar.ohlcv.volume.value() - 4.5).abs() < f64::EPSILON);
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), test)]
fn forming_bar_updates_then_closed_bar_appends() {
    let merger = StreamMerger::new(BinanceKlineDecoder::new());
    let mut session = seeded();

    let updated = merger.merge_frame(&mut session, &kline_frame(2, "120", false));
    assert!(matches!(updated, Some(ChartEvent::BarUpdated { .. })));

    let appended = merger.merge_frame(&mut session, &kline_frame(3, "130", true));
    assert!(matches!(appended, Some(ChartEvent::BarAppended { evicted: false, .. })));

    let snapshot = session.snapshot();
    assert_eq!(snapshot.len(), 4);
    assert_eq!(snapshot[2].ohlcv.close, Price::new(120.0));
    assert_eq!(session.last_price(), Some(Price::new(130.0)));
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), test)]
fn bad_frames_do_not_stop_the_stream() {
    let merger = StreamMerger::new(BinanceKlineDecoder::new());
    let mut session = seeded();

    assert!(merger.merge_frame(&mut session, "{").is_none());
    assert!(merger.merge_frame(&mut session, r#"{"result":null,"id":1}"#).is_none());
    assert!(merger.merge_frame(&mut session, &kline_frame(3, "oops", true)).is_none());
    // high below close
    assert!(merger.merge_frame(&mut session, &kline_frame(3, "250", true)).is_none());
    assert!(merger.merge_frame(&mut session, &kline_frame(3, "101", true)).is_some());

    let stats = session.stats();
    assert_eq!(stats.decode_errors, 4);
    assert_eq!(stats.appended, 1);
}
