//! Dispatch workers for incoming messages.
//!
//! Each user is pinned to one worker, so a user's messages are handled in
//! arrival order while a slow evaluation only holds up its own queue. The
//! poll loop never waits on the pipeline.

use crate::command::Dispatcher;
use crate::message::{Incoming, UserId};
use crate::transport::Messenger;
use chrono::Utc;
use std::io;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

pub struct DispatchPool {
    senders: Vec<Sender<Incoming>>,
    threads: Vec<JoinHandle<()>>,
}

impl DispatchPool {
    /// Start `workers` threads (at least one) named `fxsignal-dispatch-N`.
    pub fn spawn(
        workers: usize,
        dispatcher: Arc<Dispatcher>,
        messenger: Arc<dyn Messenger>,
    ) -> io::Result<Self> {
        let workers = workers.max(1);
        let mut senders = Vec::with_capacity(workers);
        let mut threads = Vec::with_capacity(workers);

        for index in 0..workers {
            let (tx, rx) = mpsc::channel::<Incoming>();
            let dispatcher = dispatcher.clone();
            let messenger = messenger.clone();
            let thread = thread::Builder::new()
                .name(format!("fxsignal-dispatch-{index}"))
                .spawn(move || {
                    for message in rx {
                        deliver(&dispatcher, messenger.as_ref(), &message);
                    }
                    debug!(worker = index, "dispatch worker stopped");
                })?;
            senders.push(tx);
            threads.push(thread);
        }

        Ok(Self { senders, threads })
    }

    pub fn workers(&self) -> usize {
        self.senders.len()
    }

    /// Index of the worker that owns `user`'s queue.
    pub fn worker_for(&self, user: UserId) -> usize {
        user.rem_euclid(self.senders.len() as i64) as usize
    }

    /// Queue a message. `false` when the owning worker has died.
    pub fn submit(&self, message: Incoming) -> bool {
        let worker = self.worker_for(message.user_id);
        match self.senders[worker].send(message) {
            Ok(()) => true,
            Err(lost) => {
                error!(worker, user = lost.0.user_id, "dispatch worker is gone, message dropped");
                false
            }
        }
    }

    /// Close every queue, let the workers drain them, and wait.
    ///
    /// Returns the number of workers that panicked.
    pub fn shutdown(self) -> usize {
        drop(self.senders);
        let mut panicked = 0;
        for thread in self.threads {
            if thread.join().is_err() {
                panicked += 1;
            }
        }
        panicked
    }
}

fn deliver(dispatcher: &Dispatcher, messenger: &dyn Messenger, message: &Incoming) {
    for reply in dispatcher.handle(message, Utc::now()) {
        if let Err(e) = messenger.send(&reply) {
            warn!(chat = reply.chat_id, error = %e, "reply not delivered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessStore;
    use crate::transport::RecordingMessenger;
    use fxsignal_core::data::StaticProvider;
    use fxsignal_core::SignalConfig;
    use std::sync::Mutex;

    fn pool(workers: usize) -> (DispatchPool, Arc<RecordingMessenger>) {
        let config = Arc::new(SignalConfig::default());
        let store = Arc::new(Mutex::new(AccessStore::from_config(&config.bot)));
        let messenger = Arc::new(RecordingMessenger::new());
        let dispatcher = Arc::new(Dispatcher::new(
            store,
            Arc::new(StaticProvider::new()),
            config,
            messenger.clone(),
        ));
        let pool = DispatchPool::spawn(workers, dispatcher, messenger.clone()).unwrap();
        (pool, messenger)
    }

    #[test]
    fn users_are_pinned_to_workers() {
        let (pool, _) = pool(4);
        assert_eq!(pool.workers(), 4);
        assert_eq!(pool.worker_for(7), 3);
        assert_eq!(pool.worker_for(8), 0);
        assert_eq!(pool.worker_for(-1), 3);
        assert_eq!(pool.shutdown(), 0);
    }

    #[test]
    fn zero_workers_means_one() {
        let (pool, _) = pool(0);
        assert_eq!(pool.workers(), 1);
        assert_eq!(pool.worker_for(12345), 0);
        pool.shutdown();
    }

    #[test]
    fn shutdown_drains_queued_messages_in_order() {
        let (pool, messenger) = pool(2);
        assert!(pool.submit(Incoming::private(5, "Ann", "/start")));
        assert!(pool.submit(Incoming::private(5, "Ann", "hello")));
        assert_eq!(pool.shutdown(), 0);

        let sent = messenger.sent_to(5);
        assert_eq!(sent.len(), 2);
        assert!(sent[0].text.contains("6-digit access code"));
        // Any text while awaiting a code is a code attempt.
        assert!(sent[1].text.starts_with("❌ *Invalid Access Code*"));
    }
}
