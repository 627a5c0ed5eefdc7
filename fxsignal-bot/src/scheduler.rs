//! Periodic evaluation during trading sessions, with alert fan-out.
//!
//! Runs on its own named thread. The stop channel is waited on with
//! `recv_timeout`, so `stop()` ends the loop without waiting out the sleep.

use crate::access::AccessStore;
use crate::message::Outgoing;
use crate::render;
use crate::transport::Messenger;
use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use fxsignal_core::config::{SchedulerConfig, SessionWindow};
use fxsignal_core::data::MarketDataProvider;
use fxsignal_core::{generate_signal, Direction, SignalConfig};
use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Local hour windows in which the scheduler evaluates.
#[derive(Debug, Clone, PartialEq)]
pub struct TradingSessions {
    timezone: Tz,
    windows: Vec<SessionWindow>,
}

impl TradingSessions {
    pub fn new(timezone: Tz, windows: Vec<SessionWindow>) -> Self {
        Self { timezone, windows }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.timezone, config.sessions.clone())
    }

    /// Hour of `now` on the sessions' wall clock.
    pub fn local_hour(&self, now: DateTime<Utc>) -> u32 {
        now.with_timezone(&self.timezone).hour()
    }

    /// The first window containing `now`, if any.
    pub fn active_at(&self, now: DateTime<Utc>) -> Option<&SessionWindow> {
        let hour = self.local_hour(now);
        self.windows.iter().find(|w| w.contains_hour(hour))
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.active_at(now).is_some()
    }
}

/// What one scheduler cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    OutsideSession,
    /// Evaluated, nothing to send.
    NoSignal(Direction),
    Alerted { delivered: usize, failed: usize },
}

impl CycleOutcome {
    /// A failed cycle waits the shorter error backoff.
    pub fn is_failure(&self) -> bool {
        match self {
            CycleOutcome::NoSignal(direction) => *direction == Direction::Error,
            CycleOutcome::Alerted { delivered, failed } => *delivered == 0 && *failed > 0,
            CycleOutcome::OutsideSession => false,
        }
    }
}

pub struct Scheduler {
    provider: Arc<dyn MarketDataProvider>,
    config: Arc<SignalConfig>,
    store: Arc<Mutex<AccessStore>>,
    messenger: Arc<dyn Messenger>,
    sessions: TradingSessions,
}

impl Scheduler {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        config: Arc<SignalConfig>,
        store: Arc<Mutex<AccessStore>>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        let sessions = TradingSessions::from_config(&config.scheduler);
        Self {
            provider,
            config,
            store,
            messenger,
            sessions,
        }
    }

    /// One evaluation at `now`: inside a session, run the pipeline and
    /// alert every authorized member on BUY or SELL.
    pub fn run_cycle(&self, now: DateTime<Utc>) -> CycleOutcome {
        let Some(session) = self.sessions.active_at(now) else {
            debug!(hour = self.sessions.local_hour(now), "outside trading sessions");
            return CycleOutcome::OutsideSession;
        };

        let decision = generate_signal(self.provider.as_ref(), &self.config);
        info!(
            session = %session.name,
            direction = %decision.direction,
            entry = decision.entry_price,
            "scheduled evaluation"
        );
        match decision.direction {
            Direction::Buy | Direction::Sell => {}
            Direction::Error => {
                error!(reason = %decision.rationale, "scheduled evaluation failed");
                return CycleOutcome::NoSignal(Direction::Error);
            }
            other => return CycleOutcome::NoSignal(other),
        }

        let recipients = {
            let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
            store.purge_expired(now);
            store.recipients(now)
        };
        let alert = render::automated_alert(&decision, &self.config.symbol, now);

        let (mut delivered, mut failed) = (0usize, 0usize);
        for user in recipients {
            match self.messenger.send(&Outgoing::text(user, alert.clone())) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    error!(user, error = %e, "failed to send signal");
                    failed += 1;
                }
            }
        }
        info!(delivered, failed, "automated alert sent");
        CycleOutcome::Alerted { delivered, failed }
    }

    /// Start the loop on the `fxsignal-scheduler` thread.
    pub fn spawn(self) -> io::Result<SchedulerHandle> {
        let interval = Duration::from_secs(self.config.scheduler.interval_secs);
        let backoff = Duration::from_secs(self.config.scheduler.error_backoff_secs);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("fxsignal-scheduler".into())
            .spawn(move || {
                info!(interval_secs = interval.as_secs(), "scheduler started");
                loop {
                    let outcome = self.run_cycle(Utc::now());
                    let wait = if outcome.is_failure() {
                        warn!(backoff_secs = backoff.as_secs(), "cycle failed, backing off");
                        backoff
                    } else {
                        interval
                    };
                    match stop_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                info!("scheduler stopped");
            })?;

        Ok(SchedulerHandle { stop_tx, thread })
    }
}

pub struct SchedulerHandle {
    stop_tx: Sender<()>,
    thread: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Ask the loop to exit after the current cycle.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(());
    }

    pub fn join(self) -> thread::Result<()> {
        self.thread.join()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}
