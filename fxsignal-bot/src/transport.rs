//! Telegram Bot API transport and the poll loop.
//!
//! `Messenger` and `UpdateSource` are the seams: the dispatcher and
//! scheduler only ever see these traits, so tests run against
//! `RecordingMessenger` and scripted sources.

use crate::message::{ChatId, Incoming, Keyboard, Outgoing};
use crate::workers::DispatchPool;
use fxsignal_core::config::BotConfig;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const TELEGRAM_API: &str = "https://api.telegram.org";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("telegram api error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("unexpected telegram response: {0}")]
    Decode(String),

    #[error("bot token unavailable: {0}")]
    Token(String),

    #[error("delivery to chat {0} failed")]
    Undeliverable(ChatId),
}

/// Delivers one outgoing message.
pub trait Messenger: Send + Sync {
    fn send(&self, message: &Outgoing) -> Result<(), TransportError>;
}

/// One update from the long-poll feed. `message` is `None` for updates the
/// bot ignores (edits, stickers, channel posts).
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Incoming>,
}

/// Source of updates at or after `offset`.
pub trait UpdateSource {
    fn poll(&self, offset: i64) -> Result<Vec<Update>, TransportError>;
}

// ── Telegram wire types ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawUpdate {
    update_id: i64,
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    chat: RawChat,
    from: Option<RawUser>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: i64,
    first_name: String,
    last_name: Option<String>,
    username: Option<String>,
}

fn unwrap_api<T>(response: ApiResponse<T>) -> Result<T, TransportError> {
    if !response.ok {
        return Err(TransportError::Api {
            code: response.error_code.unwrap_or_default(),
            description: response.description.unwrap_or_default(),
        });
    }
    response
        .result
        .ok_or_else(|| TransportError::Decode("missing result".into()))
}

/// Decode a `getUpdates` body. Non-text messages become `message: None`.
pub fn parse_updates(body: &str) -> Result<Vec<Update>, TransportError> {
    let response: ApiResponse<Vec<RawUpdate>> =
        serde_json::from_str(body).map_err(|e| TransportError::Decode(e.to_string()))?;
    let updates = unwrap_api(response)?
        .into_iter()
        .map(|raw| Update {
            update_id: raw.update_id,
            message: raw.message.and_then(|m| {
                let from = m.from?;
                Some(Incoming {
                    user_id: from.id,
                    chat_id: m.chat.id,
                    first_name: from.first_name,
                    last_name: from.last_name,
                    username: from.username,
                    text: m.text?,
                })
            }),
        })
        .collect();
    Ok(updates)
}

/// Reply markup for a keyboard.
pub fn reply_markup(keyboard: Keyboard) -> Value {
    match keyboard {
        Keyboard::Remove => json!({ "remove_keyboard": true }),
        _ => {
            let rows: Vec<Vec<Value>> = keyboard
                .rows()
                .into_iter()
                .map(|row| row.into_iter().map(|label| json!({ "text": label })).collect())
                .collect();
            json!({ "keyboard": rows, "resize_keyboard": true })
        }
    }
}

/// JSON body of a `sendMessage` call.
pub fn send_message_body(message: &Outgoing) -> Value {
    let mut body = json!({
        "chat_id": message.chat_id,
        "text": message.text,
        "parse_mode": "Markdown",
    });
    if let Some(keyboard) = message.keyboard {
        body["reply_markup"] = reply_markup(keyboard);
    }
    body
}

// ── Telegram client ──────────────────────────────────────────────────

/// Blocking Bot API client.
///
/// The token is part of every request URL, so transport errors are
/// stripped of their URL before they are reported.
pub struct TelegramClient {
    client: reqwest::blocking::Client,
    base_url: String,
    poll_timeout_secs: u64,
}

impl TelegramClient {
    pub fn new(token: &str, poll_timeout_secs: u64) -> Result<Self, TransportError> {
        Self::with_api_url(TELEGRAM_API, token, poll_timeout_secs)
    }

    pub fn with_api_url(
        api_url: &str,
        token: &str,
        poll_timeout_secs: u64,
    ) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs + 10))
            .build()
            .map_err(|e| TransportError::Network(e.without_url().to_string()))?;
        Ok(Self {
            client,
            base_url: format!("{}/bot{token}", api_url.trim_end_matches('/')),
            poll_timeout_secs,
        })
    }

    /// Client for the token named in `config`.
    pub fn from_config(config: &BotConfig) -> Result<Self, TransportError> {
        let token = config
            .token()
            .map_err(|e| TransportError::Token(e.to_string()))?;
        Self::new(&token, config.poll_timeout_secs)
    }

    fn read_body(response: reqwest::blocking::Response) -> Result<String, TransportError> {
        response
            .text()
            .map_err(|e| TransportError::Network(e.without_url().to_string()))
    }
}

impl UpdateSource for TelegramClient {
    fn poll(&self, offset: i64) -> Result<Vec<Update>, TransportError> {
        let response = self
            .client
            .get(format!("{}/getUpdates", self.base_url))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", self.poll_timeout_secs.to_string()),
                ("allowed_updates", r#"["message"]"#.to_string()),
            ])
            .send()
            .map_err(|e| TransportError::Network(e.without_url().to_string()))?;
        parse_updates(&Self::read_body(response)?)
    }
}

impl Messenger for TelegramClient {
    fn send(&self, message: &Outgoing) -> Result<(), TransportError> {
        let response = self
            .client
            .post(format!("{}/sendMessage", self.base_url))
            .json(&send_message_body(message))
            .send()
            .map_err(|e| TransportError::Network(e.without_url().to_string()))?;
        let body = Self::read_body(response)?;
        let parsed: ApiResponse<Value> =
            serde_json::from_str(&body).map_err(|e| TransportError::Decode(e.to_string()))?;
        unwrap_api(parsed).map(|_| ())
    }
}

// ── Test double ──────────────────────────────────────────────────────

/// Records every message; chats marked unreachable fail delivery.
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<Outgoing>>,
    unreachable: Mutex<HashSet<ChatId>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, chat_id: ChatId) {
        self.unreachable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(chat_id);
    }

    pub fn sent(&self) -> Vec<Outgoing> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn sent_to(&self, chat_id: ChatId) -> Vec<Outgoing> {
        self.sent()
            .into_iter()
            .filter(|m| m.chat_id == chat_id)
            .collect()
    }

    pub fn clear(&self) {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Messenger for RecordingMessenger {
    fn send(&self, message: &Outgoing) -> Result<(), TransportError> {
        let unreachable = self
            .unreachable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&message.chat_id);
        if unreachable {
            return Err(TransportError::Undeliverable(message.chat_id));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        Ok(())
    }
}

// ── Poll loop ────────────────────────────────────────────────────────

/// Long-poll `source` until `stop` is set. Every text message is queued on
/// `pool`; the pool's workers dispatch and deliver the replies. Returns the
/// number of messages queued.
///
/// `stop` is checked between polls, so shutdown waits out the current
/// long-poll.
pub fn run_polling(
    source: &dyn UpdateSource,
    pool: &DispatchPool,
    stop: &AtomicBool,
    error_backoff: Duration,
) -> usize {
    let mut offset = 0i64;
    let mut queued = 0usize;
    info!(workers = pool.workers(), "polling for updates");

    while !stop.load(Ordering::Relaxed) {
        let updates = match source.poll(offset) {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "getUpdates failed");
                thread::sleep(error_backoff);
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(message) = update.message else {
                continue;
            };
            debug!(user = message.user_id, update = update.update_id, "message received");
            if pool.submit(message) {
                queued += 1;
            }
        }
    }

    info!(queued, "polling stopped");
    queued
}
