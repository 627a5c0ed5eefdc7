//! Process shutdown on Ctrl-C or SIGTERM.
//!
//! The listener runs a private current-thread tokio runtime on the
//! `fxsignal-signals` thread and raises a shared stop flag once. The poll
//! loop checks that flag between long-polls.

use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, info};

/// Raise `stop` on Ctrl-C, or SIGTERM on Unix.
pub fn spawn_signal_listener(stop: Arc<AtomicBool>) -> io::Result<JoinHandle<()>> {
    spawn_listener(stop, wait_for_os_signal)
}

/// Raise `stop` when the future built by `signal` resolves with `Ok`.
///
/// The future is built inside the listener's runtime.
pub fn spawn_listener<F, Fut>(stop: Arc<AtomicBool>, signal: F) -> io::Result<JoinHandle<()>>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = io::Result<()>>,
{
    thread::Builder::new()
        .name("fxsignal-signals".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    error!(error = %e, "signal listener runtime failed to start");
                    return;
                }
            };
            match runtime.block_on(signal()) {
                Ok(()) => {
                    info!("shutdown requested, finishing the current poll");
                    stop.store(true, Ordering::Relaxed);
                }
                Err(e) => error!(error = %e, "signal listener failed"),
            }
        })
}

async fn wait_for_os_signal() -> io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = terminate.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[test]
    fn signal_raises_stop_flag() {
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = oneshot::channel::<()>();
        let listener =
            spawn_listener(stop.clone(), move || async move { rx.await.map_err(io::Error::other) })
                .unwrap();

        assert!(!stop.load(Ordering::Relaxed));
        tx.send(()).unwrap();
        listener.join().unwrap();
        assert!(stop.load(Ordering::Relaxed));
    }

    #[test]
    fn failed_listener_leaves_flag_down() {
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = oneshot::channel::<()>();
        drop(tx);
        let listener =
            spawn_listener(stop.clone(), move || async move { rx.await.map_err(io::Error::other) })
                .unwrap();
        listener.join().unwrap();
        assert!(!stop.load(Ordering::Relaxed));
    }
}
