use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use live_chart_engine::StreamMerger;
use live_chart_engine::domain::chart::ChartSession;
use live_chart_engine::domain::market_data::indicator_engine::recompute;
use live_chart_engine::domain::market_data::{
    Bar, BarSeries, MovingAverageEngine, OHLCV, Price, SessionKey, Symbol, TimeInterval, Timestamp, Volume,
};
use live_chart_engine::infrastructure::websocket::BinanceKlineDecoder;
use live_chart_engine::ChartConfig;
use std::hint::black_box;
use std::time::Duration;

const MINUTE: u64 = 60_000;

/// Wavy synthetic bars, one per minute
fn generate_bars(count: usize) -> Vec<Bar> {
    (0..count)
        .map(|i| {
            let t = i as f64;
            let open = 50_000.0 + (t * 0.01).sin() * 1_000.0 + (t * 0.3).cos() * 50.0;
            let close = open + (t * 0.7).sin() * 80.0;
            let high = open.max(close) + 25.0;
            let low = open.min(close) - 25.0;
            Bar::new(
                Timestamp::from_millis(i as u64 * MINUTE),
                Timestamp::from_millis(i as u64 * MINUTE + MINUTE - 1),
                OHLCV::new(Price::new(open), Price::new(high), Price::new(low), Price::new(close), Volume::new(10.0)),
            )
        })
        .collect()
}

fn bench_upsert_with_indicators(c: &mut Criterion) {
    let mut group = c.benchmark_group("upsert_with_indicators");
    group.measurement_time(Duration::from_secs(5));

    for count in [500usize, 1000, 5000] {
        let bars = generate_bars(count + 200);
        group.bench_with_input(BenchmarkId::new("incremental", count), &count, |b, &count| {
            b.iter(|| {
                let mut series = BarSeries::new(count);
                series.initialize(bars[..count].to_vec(), count).unwrap();
                let mut engine = MovingAverageEngine::new(&[7, 25, 99]);
                engine.compute_historical(&series.closes());
                for bar in &bars[count..] {
                    let outcome = series.upsert(bar.clone(), true);
                    engine.apply(outcome, &series.closes());
                }
                black_box(engine.series(99).and_then(|s| s.last()))
            })
        });
        group.bench_with_input(BenchmarkId::new("full_recompute", count), &count, |b, &count| {
            let closes: Vec<f64> = bars[..count].iter().map(|b| b.ohlcv.close.value()).collect();
            b.iter(|| black_box(recompute(&closes, &[7, 25, 99])))
        });
    }
    group.finish();
}

fn bench_frame_merge(c: &mut Criterion) {
    let merger = StreamMerger::new(BinanceKlineDecoder::new());
    let frames: Vec<String> = (1000..1200u64)
        .map(|m| {
            format!(
                r#"{{"k":{{"t":{},"T":{},"o":"50000","h":"50100","l":"49900","c":"50050","v":"3","x":true}}}}"#,
                m * MINUTE,
                m * MINUTE + MINUTE - 1
            )
        })
        .collect();
    let key = SessionKey::new(Symbol::from("BTCUSDT"), TimeInterval::OneMinute);

    c.bench_function("merge_binance_frames", |b| {
        b.iter(|| {
            let mut session = ChartSession::new(key.clone(), &ChartConfig::default());
            session.load_history(generate_bars(1000)).unwrap();
            for frame in &frames {
                black_box(merger.merge_frame(&mut session, frame));
            }
        })
    });
}

criterion_group!(benches, bench_upsert_with_indicators, bench_frame_merge);
criterion_main!(benches);
