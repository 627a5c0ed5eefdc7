//! Criterion benchmarks for the evaluation hot path.
//!
//! Benchmarks:
//! 1. Individual indicators over growing candle counts
//! 2. Full snapshot (all indicators + last_valid)
//! 3. Engine decision on two snapshots

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use fxsignal_core::components::Indicator;
use fxsignal_core::config::{IndicatorConfig, SignalConfig};
use fxsignal_core::domain::Candle;
use fxsignal_core::indicators::{Atr, Bollinger, Ema, Macd, Rsi};
use fxsignal_core::signal::SignalEngine;
use fxsignal_core::snapshot::compute_snapshot;

// ── Helpers ──────────────────────────────────────────────────────────

fn make_candles(n: usize) -> Vec<Candle> {
    let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    (0..n)
        .map(|i| {
            let close = 1.27 + (i as f64 * 0.1).sin() * 0.01;
            let open = close - 0.0003;
            Candle {
                timestamp: base + chrono::Duration::minutes(15 * i as i64),
                open,
                high: close + 0.0015,
                low: close - 0.0015,
                close,
                volume: 0.0,
            }
        })
        .collect()
}

// ── 1. Indicators ────────────────────────────────────────────────────

fn bench_indicators(c: &mut Criterion) {
    let mut group = c.benchmark_group("indicators");
    let indicators: Vec<Box<dyn Indicator>> = vec![
        Box::new(Ema::new(26)),
        Box::new(Rsi::new(14)),
        Box::new(Macd::histogram(12, 26, 9)),
        Box::new(Atr::new(10)),
        Box::new(Bollinger::upper(20, 2.0)),
    ];

    for n in [100usize, 1_000, 5_000] {
        let candles = make_candles(n);
        for indicator in &indicators {
            group.bench_with_input(
                BenchmarkId::new(indicator.name().to_string(), n),
                &candles,
                |b, candles| {
                    b.iter(|| black_box(indicator.compute(black_box(candles))));
                },
            );
        }
    }
    group.finish();
}

// ── 2. Snapshot ──────────────────────────────────────────────────────

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");
    let config = IndicatorConfig::default();
    for n in [100usize, 500] {
        let candles = make_candles(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &candles, |b, candles| {
            b.iter(|| black_box(compute_snapshot(black_box(candles), &config)));
        });
    }
    group.finish();
}

// ── 3. Decision ──────────────────────────────────────────────────────

fn bench_decide(c: &mut Criterion) {
    let config = SignalConfig::default();
    let engine = SignalEngine::new(&config);
    let candles = make_candles(100);
    let Ok(fast) = compute_snapshot(&candles, &config.indicators) else {
        return;
    };
    let slow = fast;

    c.bench_function("decide", |b| {
        b.iter(|| black_box(engine.decide(black_box(&fast), black_box(&slow), 1.2705)));
    });
}

criterion_group!(benches, bench_indicators, bench_snapshot, bench_decide);
criterion_main!(benches);
