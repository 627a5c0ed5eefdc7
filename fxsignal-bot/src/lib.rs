//! fxsignal bot: the Telegram presentation layer over `fxsignal-core`.
//!
//! This crate provides:
//! - Access store (members, single-use codes, the admin, prompts)
//! - Command parsing and a single permission-checked dispatch table
//! - Markdown renderers for signals, prices and admin views
//! - Telegram long-poll transport behind `Messenger` / `UpdateSource`
//! - Session-aware scheduler that broadcasts automated alerts
//! - Per-user dispatch workers fed by the poll loop
//! - Keep-alive HTTP server and Ctrl-C/SIGTERM shutdown

pub mod access;
pub mod command;
pub mod health;
pub mod message;
pub mod render;
pub mod scheduler;
pub mod shutdown;
pub mod transport;
pub mod workers;

pub use access::{AccessError, AccessStats, AccessStore, ConversationState, Member, Permission, Role};
pub use command::{Command, Dispatcher};
pub use health::{route, spawn_health_server, HealthHandle};
pub use message::{ChatId, Incoming, Keyboard, Outgoing, UserId};
pub use scheduler::{CycleOutcome, Scheduler, SchedulerHandle, TradingSessions};
pub use shutdown::spawn_signal_listener;
pub use transport::{
    run_polling, Messenger, RecordingMessenger, TelegramClient, TransportError, Update,
    UpdateSource,
};
pub use workers::DispatchPool;
