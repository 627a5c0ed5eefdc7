//! Command parsing and the single dispatch table.
//!
//! Every incoming text resolves to exactly one `Command`. The dispatcher
//! checks the sender's role against the command's permission before any
//! handler runs.

use crate::access::{AccessError, AccessStore, ConversationState, Permission, Role};
use crate::message::{
    Incoming, Keyboard, Outgoing, BTN_ADMIN_PANEL, BTN_BACK_TO_MAIN, BTN_BROADCAST,
    BTN_CURRENT_PRICE, BTN_GENERATE_CODE, BTN_GET_SIGNAL, BTN_LIST_USERS, BTN_REMOVE_USER,
    BTN_USAGE_STATS,
};
use crate::render;
use crate::transport::Messenger;
use chrono::{DateTime, Duration, Utc};
use fxsignal_core::config::BotConfig;
use fxsignal_core::data::MarketDataProvider;
use fxsignal_core::{fetch_price, generate_signal, Direction, SignalConfig};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    ClaimAdmin,
    GetSignal,
    CurrentPrice,
    AdminPanel,
    ListUsers,
    GenerateCode,
    UsageStats,
    RemoveUser,
    Broadcast,
    BackToMain,
    SubmitCode(String),
    SubmitRevokeId(String),
    SubmitBroadcast(String),
    Unknown,
}

const BUTTONS: [(&str, Command); 9] = [
    (BTN_GET_SIGNAL, Command::GetSignal),
    (BTN_CURRENT_PRICE, Command::CurrentPrice),
    (BTN_ADMIN_PANEL, Command::AdminPanel),
    (BTN_LIST_USERS, Command::ListUsers),
    (BTN_GENERATE_CODE, Command::GenerateCode),
    (BTN_USAGE_STATS, Command::UsageStats),
    (BTN_REMOVE_USER, Command::RemoveUser),
    (BTN_BROADCAST, Command::Broadcast),
    (BTN_BACK_TO_MAIN, Command::BackToMain),
];

/// Label text without its leading emoji.
fn strip_decoration(label: &str) -> &str {
    label
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .trim()
}

fn is_access_code(text: &str) -> bool {
    text.len() == 6 && text.bytes().all(|b| b.is_ascii_digit())
}

impl Command {
    /// Resolve `text` for a user in `conversation`.
    ///
    /// Slash commands always win. Otherwise a pending prompt claims the
    /// text, then button labels (with or without their emoji), then any
    /// six-digit text as an access code.
    pub fn parse(text: &str, conversation: Option<ConversationState>, bot: &BotConfig) -> Self {
        let text = text.trim();

        if let Some(rest) = text.strip_prefix('/') {
            let name = rest
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .split('@')
                .next()
                .unwrap_or_default()
                .to_ascii_lowercase();
            return match name.as_str() {
                "start" => Command::Start,
                "signal" => Command::GetSignal,
                "price" => Command::CurrentPrice,
                other if bot.admin_commands.iter().any(|c| c.eq_ignore_ascii_case(other)) => {
                    Command::ClaimAdmin
                }
                _ => Command::Unknown,
            };
        }

        match conversation {
            Some(ConversationState::AwaitingCode) => return Command::SubmitCode(text.to_string()),
            Some(ConversationState::AwaitingRevokeId) => {
                return Command::SubmitRevokeId(text.to_string())
            }
            Some(ConversationState::AwaitingBroadcast) => {
                return Command::SubmitBroadcast(text.to_string())
            }
            None => {}
        }

        let bare = strip_decoration(text);
        if let Some((_, command)) = BUTTONS
            .iter()
            .find(|(label, _)| text == *label || bare.eq_ignore_ascii_case(strip_decoration(label)))
        {
            return command.clone();
        }

        if is_access_code(text) {
            return Command::SubmitCode(text.to_string());
        }
        Command::Unknown
    }

    pub fn required_permission(&self) -> Permission {
        match self {
            Command::Start | Command::ClaimAdmin | Command::SubmitCode(_) | Command::Unknown => {
                Permission::Anyone
            }
            Command::GetSignal | Command::CurrentPrice | Command::BackToMain => Permission::Member,
            Command::AdminPanel
            | Command::ListUsers
            | Command::GenerateCode
            | Command::UsageStats
            | Command::RemoveUser
            | Command::Broadcast
            | Command::SubmitRevokeId(_)
            | Command::SubmitBroadcast(_) => Permission::Admin,
        }
    }
}

/// Routes parsed commands to their handlers.
///
/// The store lock is held only while reading or mutating access state,
/// never across a provider fetch or a message delivery.
pub struct Dispatcher {
    store: Arc<Mutex<AccessStore>>,
    provider: Arc<dyn MarketDataProvider>,
    config: Arc<SignalConfig>,
    messenger: Arc<dyn Messenger>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<Mutex<AccessStore>>,
        provider: Arc<dyn MarketDataProvider>,
        config: Arc<SignalConfig>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        Self {
            store,
            provider,
            config,
            messenger,
        }
    }

    fn store(&self) -> MutexGuard<'_, AccessStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bot(&self) -> &BotConfig {
        &self.config.bot
    }

    /// Replies for one incoming message, in delivery order.
    pub fn handle(&self, msg: &Incoming, now: DateTime<Utc>) -> Vec<Outgoing> {
        let (conversation, role) = {
            let mut store = self.store();
            store.purge_expired(now);
            (store.state(msg.user_id), store.role(msg.user_id, now))
        };
        let command = Command::parse(&msg.text, conversation, self.bot());
        debug!(user = msg.user_id, ?role, ?command, "dispatch");

        let permission = command.required_permission();
        if !role.permits(permission) {
            info!(user = msg.user_id, ?command, "command denied");
            let text = match permission {
                Permission::Admin => render::ADMIN_REQUIRED,
                _ => render::ACCESS_DENIED,
            };
            return vec![Outgoing::text(msg.chat_id, text)];
        }

        match command {
            Command::Start => self.start(msg, role, now),
            Command::ClaimAdmin => self.claim_admin(msg, now),
            Command::GetSignal => self.get_signal(msg, now),
            Command::CurrentPrice => self.current_price(msg, now),
            Command::AdminPanel => {
                let stats = self.store().stats(now);
                vec![Outgoing::text(msg.chat_id, render::admin_panel(&stats))
                    .with_keyboard(Keyboard::Admin)]
            }
            Command::ListUsers => {
                let text = render::member_list(&self.store(), now);
                vec![Outgoing::text(msg.chat_id, text)]
            }
            Command::GenerateCode => {
                let code = self.store().generate_code(now);
                info!(admin = msg.user_id, "access code generated");
                vec![Outgoing::text(
                    msg.chat_id,
                    render::code_card(&code, self.bot().code_days, now),
                )]
            }
            Command::UsageStats => {
                let stats = self.store().stats(now);
                vec![Outgoing::text(msg.chat_id, render::stats_card(&stats, now))]
            }
            Command::RemoveUser => {
                self.store()
                    .set_state(msg.user_id, ConversationState::AwaitingRevokeId);
                vec![Outgoing::text(msg.chat_id, render::REMOVE_PROMPT).with_keyboard(Keyboard::Remove)]
            }
            Command::SubmitRevokeId(raw) => self.revoke(msg, &raw),
            Command::Broadcast => {
                self.store()
                    .set_state(msg.user_id, ConversationState::AwaitingBroadcast);
                vec![Outgoing::text(msg.chat_id, render::BROADCAST_PROMPT)
                    .with_keyboard(Keyboard::Remove)]
            }
            Command::SubmitBroadcast(text) => self.broadcast(msg, &text, now),
            Command::BackToMain => vec![Outgoing::text(msg.chat_id, render::MAIN_MENU)
                .with_keyboard(Keyboard::Main {
                    admin: role == Role::Admin,
                })],
            Command::SubmitCode(code) => self.redeem(msg, &code, now),
            Command::Unknown => self.fallback(msg, conversation, role),
        }
    }

    fn start(&self, msg: &Incoming, role: Role, now: DateTime<Utc>) -> Vec<Outgoing> {
        // /start drops any pending prompt.
        let mut store = self.store();
        store.clear_state(msg.user_id);
        if role == Role::Anonymous {
            store.set_state(msg.user_id, ConversationState::AwaitingCode);
            return vec![Outgoing::text(
                msg.chat_id,
                render::code_prompt(&self.bot().admin_contact),
            )];
        }

        let days_left = match role {
            Role::Admin => None,
            _ => store.member(msg.user_id).map(|m| store.days_left(m, now)),
        };
        vec![
            Outgoing::text(msg.chat_id, render::welcome_back(&msg.first_name, days_left))
                .with_keyboard(Keyboard::Main {
                    admin: role == Role::Admin,
                }),
        ]
    }

    fn claim_admin(&self, msg: &Incoming, now: DateTime<Utc>) -> Vec<Outgoing> {
        let claimed = {
            let mut store = self.store();
            store.clear_state(msg.user_id);
            store.claim_admin(msg.user_id, &msg.display_name(), msg.username.as_deref(), now)
        };
        match claimed {
            Ok(()) => {
                info!(user = msg.user_id, "administrator privileges granted");
                vec![Outgoing::text(msg.chat_id, render::admin_granted())
                    .with_keyboard(Keyboard::Admin)]
            }
            Err(e) => {
                warn!(user = msg.user_id, error = %e, "admin claim rejected");
                vec![Outgoing::text(msg.chat_id, render::ADMIN_CLAIM_DENIED)]
            }
        }
    }

    fn get_signal(&self, msg: &Incoming, now: DateTime<Utc>) -> Vec<Outgoing> {
        let decision = generate_signal(self.provider.as_ref(), &self.config);
        match decision.direction {
            Direction::Error => {
                warn!(user = msg.user_id, reason = %decision.rationale, "signal unavailable")
            }
            direction => info!(
                user = msg.user_id,
                %direction,
                entry = decision.entry_price,
                confidence = decision.confidence().unwrap_or_default(),
                "signal requested"
            ),
        }
        let text = render::decision_card(
            &decision,
            &self.config.symbol,
            self.config.risk.risk_reward,
            now,
        );
        vec![Outgoing::text(msg.chat_id, text)]
    }

    fn current_price(&self, msg: &Incoming, now: DateTime<Utc>) -> Vec<Outgoing> {
        let symbol = &self.config.symbol;
        let price = match fetch_price(self.provider.as_ref(), symbol) {
            Ok(price) => price,
            Err(e) => {
                warn!(user = msg.user_id, error = %e, "price unavailable");
                return vec![Outgoing::text(msg.chat_id, render::PRICE_UNAVAILABLE)];
            }
        };
        let reference = self
            .provider
            .fetch_candles(symbol, self.config.fast_interval, 1)
            .ok()
            .and_then(|candles| candles.last().map(|c| c.close));
        vec![Outgoing::text(
            msg.chat_id,
            render::price_card(symbol, price, reference, now),
        )]
    }

    fn revoke(&self, msg: &Incoming, raw: &str) -> Vec<Outgoing> {
        let text = {
            let mut store = self.store();
            store.clear_state(msg.user_id);
            match raw.trim().parse::<i64>() {
                Err(_) => render::REMOVE_INVALID_ID.to_string(),
                Ok(target) => match store.revoke(target) {
                    Ok(member) => {
                        info!(admin = msg.user_id, user = target, "access revoked");
                        render::member_removed(&member.name, target)
                    }
                    Err(AccessError::CannotRevokeAdmin) => render::REMOVE_ADMIN.to_string(),
                    Err(_) => render::REMOVE_NOT_FOUND.to_string(),
                },
            }
        };
        vec![Outgoing::text(msg.chat_id, text).with_keyboard(Keyboard::Admin)]
    }

    fn broadcast(&self, msg: &Incoming, text: &str, now: DateTime<Utc>) -> Vec<Outgoing> {
        let recipients = {
            let mut store = self.store();
            store.clear_state(msg.user_id);
            store.recipients(now)
        };

        let body = render::broadcast_message(text, now);
        let (mut delivered, mut failed) = (0usize, 0usize);
        for user in recipients {
            match self.messenger.send(&Outgoing::text(user, body.clone())) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(user, error = %e, "broadcast not delivered");
                    failed += 1;
                }
            }
        }
        info!(admin = msg.user_id, delivered, failed, "broadcast complete");

        vec![Outgoing::text(msg.chat_id, render::broadcast_report(delivered, failed))
            .with_keyboard(Keyboard::Admin)]
    }

    fn redeem(&self, msg: &Incoming, code: &str, now: DateTime<Utc>) -> Vec<Outgoing> {
        let (redeemed, admin) = {
            let mut store = self.store();
            let redeemed = store
                .redeem_code(
                    msg.user_id,
                    code,
                    &msg.display_name(),
                    msg.username.as_deref(),
                    now,
                )
                .map(|member| (member.added_at, member.is_admin));
            (redeemed, store.admin())
        };

        match redeemed {
            Ok((added_at, is_admin)) => {
                let valid_until = added_at + Duration::days(self.bot().access_days);
                info!(user = msg.user_id, "access code redeemed");
                let mut replies = vec![Outgoing::text(
                    msg.chat_id,
                    render::welcome(&msg.first_name, valid_until, self.bot().access_days),
                )
                .with_keyboard(Keyboard::Main { admin: is_admin })];
                if let Some(admin) = admin.filter(|a| *a != msg.user_id) {
                    replies.push(Outgoing::text(admin, render::new_member_notice(msg, now)));
                }
                replies
            }
            Err(e) => {
                info!(user = msg.user_id, error = %e, "access code rejected");
                vec![Outgoing::text(
                    msg.chat_id,
                    render::invalid_code(&self.bot().admin_contact),
                )]
            }
        }
    }

    fn fallback(
        &self,
        msg: &Incoming,
        conversation: Option<ConversationState>,
        role: Role,
    ) -> Vec<Outgoing> {
        if conversation == Some(ConversationState::AwaitingCode) {
            return vec![Outgoing::text(
                msg.chat_id,
                render::code_prompt(&self.bot().admin_contact),
            )];
        }
        match role {
            Role::Anonymous => vec![Outgoing::text(
                msg.chat_id,
                render::access_required(&self.bot().admin_contact),
            )],
            _ => vec![Outgoing::text(msg.chat_id, render::USE_MENU).with_keyboard(Keyboard::Main {
                admin: role == Role::Admin,
            })],
        }
    }
}
