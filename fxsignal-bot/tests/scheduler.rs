//! Scheduler cycles and the stop signal.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use fxsignal_bot::access::AccessStore;
use fxsignal_bot::scheduler::{CycleOutcome, Scheduler};
use fxsignal_bot::transport::RecordingMessenger;
use fxsignal_core::data::{DataError, StaticProvider};
use fxsignal_core::domain::{Candle, Direction, Interval};
use fxsignal_core::SignalConfig;
use std::sync::{Arc, Mutex};
use std::time::Instant;

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, hour, 15, 0).unwrap()
}

/// Rising series with an alternating kick: uptrend on both EMAs, RSI near 60.
fn zigzag(n: usize, minutes: i64, slope: f64) -> Vec<Candle> {
    let base = NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    (0..n)
        .map(|i| {
            let kick = if i % 2 == 0 { 0.001 } else { 0.0 };
            let close = 1.2000 + slope * i as f64 + kick;
            Candle {
                timestamp: base + Duration::minutes(minutes * i as i64),
                open: close,
                high: close + 0.0005,
                low: close - 0.0005,
                close,
                volume: 0.0,
            }
        })
        .collect()
}

/// Uptrend with the live price far below the lower band.
fn buy_provider() -> StaticProvider {
    StaticProvider::new()
        .with_candles(Interval::Min15, zigzag(120, 15, 0.0002))
        .with_candles(Interval::Hour1, zigzag(120, 60, 0.0002))
        .with_price(1.1000)
}

struct Rig {
    scheduler: Scheduler,
    messenger: Arc<RecordingMessenger>,
    store: Arc<Mutex<AccessStore>>,
}

fn rig(provider: StaticProvider, config: SignalConfig) -> Rig {
    let config = Arc::new(config);
    let store = Arc::new(Mutex::new(AccessStore::from_config(&config.bot)));
    {
        let mut s = store.lock().unwrap();
        s.claim_admin(1, "Root", None, at(8)).unwrap();
        for user in [10, 11] {
            let code = s.generate_code(at(8));
            s.redeem_code(user, &code, "Member", None, at(8)).unwrap();
        }
    }
    let messenger = Arc::new(RecordingMessenger::new());
    let scheduler = Scheduler::new(
        Arc::new(provider),
        config,
        store.clone(),
        messenger.clone(),
    );
    Rig {
        scheduler,
        messenger,
        store,
    }
}

fn lenient() -> SignalConfig {
    let mut config = SignalConfig::default();
    config.thresholds.confidence = 20.0;
    config
}

#[test]
fn alerts_every_member_inside_session() {
    let r = rig(buy_provider(), lenient());
    let outcome = r.scheduler.run_cycle(at(9));
    assert_eq!(
        outcome,
        CycleOutcome::Alerted {
            delivered: 3,
            failed: 0
        }
    );
    let sent = r.messenger.sent();
    assert_eq!(sent.len(), 3);
    assert!(sent[0].text.starts_with("🚨 *AUTOMATED SIGNAL ALERT* 🚨"));
    assert!(sent[0].text.contains("🟢 BUY GBP/USD"));
    assert!(sent[0].text.ends_with("_Auto-generated at 09:15:00_"));
}

#[test]
fn nothing_runs_outside_sessions() {
    let provider = buy_provider();
    let r = rig(provider, lenient());
    assert_eq!(r.scheduler.run_cycle(at(3)), CycleOutcome::OutsideSession);
    assert_eq!(r.scheduler.run_cycle(at(22)), CycleOutcome::OutsideSession);
    assert!(r.messenger.sent().is_empty());
}

#[test]
fn hold_sends_nothing() {
    // Confidence never exceeds 100, so nothing clears this threshold.
    let mut config = lenient();
    config.thresholds.confidence = 100.0;
    let r = rig(buy_provider(), config);
    assert_eq!(
        r.scheduler.run_cycle(at(13)),
        CycleOutcome::NoSignal(Direction::Hold)
    );
    assert!(r.messenger.sent().is_empty());
}

#[test]
fn data_error_is_a_failed_cycle() {
    let provider = StaticProvider::new()
        .failing_candles(Interval::Min15, DataError::Timeout { secs: 10 })
        .failing_candles(Interval::Hour1, DataError::Timeout { secs: 10 });
    let r = rig(provider, lenient());
    let outcome = r.scheduler.run_cycle(at(10));
    assert_eq!(outcome, CycleOutcome::NoSignal(Direction::Error));
    assert!(outcome.is_failure());
}

#[test]
fn delivery_failures_are_counted_per_user() {
    let r = rig(buy_provider(), lenient());
    r.messenger.fail_for(11);
    assert_eq!(
        r.scheduler.run_cycle(at(15)),
        CycleOutcome::Alerted {
            delivered: 2,
            failed: 1
        }
    );
    assert!(r.messenger.sent_to(11).is_empty());
}

#[test]
fn expired_members_get_no_alert() {
    let r = rig(buy_provider(), lenient());
    let later = at(9) + Duration::days(31);
    assert_eq!(
        r.scheduler.run_cycle(later),
        CycleOutcome::Alerted {
            delivered: 1,
            failed: 0
        }
    );
    assert_eq!(r.store.lock().unwrap().member_count(), 1);
}

#[test]
fn stop_ends_loop_promptly() {
    let mut config = lenient();
    config.scheduler.interval_secs = 3600;
    config.scheduler.error_backoff_secs = 3600;
    let r = rig(buy_provider(), config);

    let handle = r.scheduler.spawn().unwrap();
    std::thread::sleep(std::time::Duration::from_millis(50));
    let started = Instant::now();
    handle.stop();
    handle.join().unwrap();
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
}
