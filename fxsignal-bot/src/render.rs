//! Markdown cards shown to users.
//!
//! Every function is pure: the caller supplies decisions, store views and
//! `now`. Prices use 5 decimals.

use crate::access::{AccessStats, AccessStore};
use crate::message::{Incoming, UserId};
use chrono::{DateTime, Utc};
use fxsignal_core::signal::RiskLevels;
use fxsignal_core::{Direction, SignalDecision};
use std::fmt::Write as _;

pub const ACCESS_DENIED: &str = "❌ Access denied. Please use /start to authenticate.";
pub const ADMIN_REQUIRED: &str = "❌ Administrator privileges required.";
pub const ADMIN_CLAIM_DENIED: &str = "❌ *Access Denied*\n\nAdministrator privileges required.";
pub const PRICE_UNAVAILABLE: &str = "❌ Could not fetch current price. Please try again later.";
pub const USE_MENU: &str = "🤖 Please use the menu buttons below to navigate the bot.";
pub const MAIN_MENU: &str = "🏠 Main Menu";
pub const NO_MEMBERS: &str = "📭 No authorized users yet.";
pub const REMOVE_PROMPT: &str = "🗑️ *REMOVE USER*\n\nPlease enter the User ID you want to remove:";
pub const REMOVE_NOT_FOUND: &str = "❌ User not found. Please check the User ID and try again.";
pub const REMOVE_INVALID_ID: &str = "❌ Invalid User ID. Please enter a numeric User ID.";
pub const REMOVE_ADMIN: &str = "❌ The administrator cannot be removed.";
pub const BROADCAST_PROMPT: &str =
    "📢 *BROADCAST MESSAGE*\n\nPlease enter the message you want to send to all users:";

const DATE: &str = "%Y-%m-%d";
const DATE_TIME: &str = "%Y-%m-%d %H:%M";
const TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";
const CLOCK: &str = "%H:%M:%S";

/// Escape legacy Markdown control characters in user-supplied text.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// The reply to "Get Signal" for any decision.
pub fn decision_card(
    decision: &SignalDecision,
    symbol: &str,
    risk_reward: f64,
    now: DateTime<Utc>,
) -> String {
    match decision.direction {
        Direction::Error => error_card(decision),
        Direction::Buy | Direction::Sell => signal_card(decision, symbol, risk_reward, now),
        Direction::Hold | Direction::Analyzing => analysis_card(decision, symbol),
    }
}

pub fn error_card(decision: &SignalDecision) -> String {
    format!("❌ *System Error*\n\n{}", decision.rationale)
}

fn direction_emoji(direction: Direction) -> (&'static str, &'static str) {
    if direction == Direction::Buy {
        ("🟢", "🚀")
    } else {
        ("🔴", "📉")
    }
}

pub fn signal_card(
    decision: &SignalDecision,
    symbol: &str,
    risk_reward: f64,
    now: DateTime<Utc>,
) -> String {
    let (dot, arrow) = direction_emoji(decision.direction);
    let levels = RiskLevels {
        entry: decision.entry_price,
        stop_loss: decision.stop_loss,
        take_profit: decision.take_profit,
    };
    let dir = decision.direction;
    let price = decision.entry_price;

    let mut text = String::new();
    let _ = writeln!(text, "{arrow} *{dot} {dir} SIGNAL {dot}* {arrow}\n");
    let _ = writeln!(text, "📊 *Pair:* `{symbol}`");
    let _ = writeln!(text, "💰 *Current Price:* `{price:.5}`");
    let _ = writeln!(text, "🎯 *Entry:* `{price:.5}`");
    let _ = writeln!(text, "🛑 *Stop Loss:* `{:.5}`", decision.stop_loss);
    let _ = writeln!(text, "🎯 *Take Profit:* `{:.5}`", decision.take_profit);
    let _ = writeln!(text, "📏 *Pip Risk:* `{:.1}` pips", levels.pip_risk());
    let _ = writeln!(text, "⚖️ *Risk/Reward:* `1:{risk_reward}`\n");
    let _ = writeln!(text, "📈 *Strategy Analysis:*\n{}\n", decision.rationale);
    let _ = write!(text, "⏰ *Signal generated:* {}", now.format(TIMESTAMP));
    text
}

pub fn analysis_card(decision: &SignalDecision, symbol: &str) -> String {
    format!(
        "🟡 *MARKET ANALYSIS* 🟡\n\n\
         📊 *Pair:* `{symbol}`\n\
         💰 *Price:* `{:.5}`\n\n\
         📈 *Market Condition:*\n{}\n\n\
         💡 *Trading Advice:*\n\
         • Wait for clearer signals\n\
         • Monitor key levels\n\
         • Prepare for breakout",
        decision.entry_price, decision.rationale
    )
}

/// Scheduler broadcast for a BUY or SELL decision.
pub fn automated_alert(decision: &SignalDecision, symbol: &str, now: DateTime<Utc>) -> String {
    let (dot, _) = direction_emoji(decision.direction);
    format!(
        "🚨 *AUTOMATED SIGNAL ALERT* 🚨\n\n\
         {dot} {} {symbol}\n\
         • Entry: `{:.5}`\n\
         • SL: `{:.5}`\n\
         • TP: `{:.5}`\n\n\
         *Strategy:*\n{}\n\n\
         _Auto-generated at {}_",
        decision.direction,
        decision.entry_price,
        decision.stop_loss,
        decision.take_profit,
        decision.rationale,
        now.format(CLOCK)
    )
}

/// Trend label for a percentage change.
pub fn trend_label(change_percent: f64) -> &'static str {
    if change_percent > 0.5 {
        "🚀 Strong Uptrend"
    } else if change_percent > 0.1 {
        "📈 Moderate Uptrend"
    } else if change_percent < -0.5 {
        "📉 Strong Downtrend"
    } else if change_percent < -0.1 {
        "🔻 Moderate Downtrend"
    } else {
        "↔️ Sideways Movement"
    }
}

/// Live price card. `reference` is the last candle close the change is
/// measured against; without one the change and trend lines are omitted.
pub fn price_card(symbol: &str, price: f64, reference: Option<f64>, now: DateTime<Utc>) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "💰 *LIVE PRICE UPDATE*\n");
    let _ = writeln!(text, "📊 *Pair:* {symbol}");
    let _ = writeln!(text, "💵 *Price:* `{price:.5}`");
    if let Some(reference) = reference.filter(|r| r.is_finite() && *r != 0.0) {
        let change = price - reference;
        let change_percent = change / reference * 100.0;
        let dot = if change >= 0.0 { "🟢" } else { "🔴" };
        let _ = writeln!(text, "📈 *Change:* {dot} {change:+.4} ({change_percent:+.2}%)");
        let _ = writeln!(text, "🎯 *Trend:* {}", trend_label(change_percent));
    }
    let _ = write!(text, "\n⏰ *Last update:* {}", now.format(CLOCK));
    text
}

pub fn admin_granted() -> String {
    "👑 *Administrator Privileges Granted!*\n\n\
     You now have access to the admin panel with:\n\
     • User management\n• Access code generation\n• System statistics\n\
     • Broadcast messages"
        .to_string()
}

pub fn admin_panel(stats: &AccessStats) -> String {
    format!(
        "👑 *ADMINISTRATOR PANEL*\n\n\
         *Available Actions:*\n\n\
         👥 *List Users* - View all authorized users\n\
         🔑 *Generate Code* - Create new access codes\n\
         📊 *Usage Stats* - View system statistics\n\
         🗑️ *Remove User* - Remove user access\n\
         📢 *Broadcast* - Send message to all users\n\n\
         *System Info:*\n\
         • Total Users: {}\n\
         • Active Codes: {}\n\
         • Server Status: ONLINE\n\n\
         ⚡ *Admin Privileges Active*",
        stats.total_members, stats.active_codes
    )
}

pub fn code_card(code: &str, code_days: i64, now: DateTime<Utc>) -> String {
    format!(
        "🔑 *NEW ACCESS CODE GENERATED*\n\n\
         *Code:* `{code}`\n\
         *Expires:* {code_days} days\n\
         *Uses:* 1 user\n\n\
         💡 *Instructions:*\n\
         Share this code with users you want to authorize. \
         They can enter it during the /start process.\n\n\
         ⏰ Generated: {}",
        now.format(DATE_TIME)
    )
}

pub fn member_list(store: &AccessStore, now: DateTime<Utc>) -> String {
    if store.member_count() == 0 {
        return NO_MEMBERS.to_string();
    }
    let mut text = String::new();
    let _ = writeln!(text, "👥 *AUTHORIZED USERS*\n");
    let _ = writeln!(text, "Total Users: {}\n", store.member_count());
    let _ = writeln!(text, "*User List:*");
    for (id, member) in store.members() {
        let badge = if member.is_admin { "👑 ADMIN" } else { "⭐ USER" };
        let _ = writeln!(
            text,
            "{badge} - {} `{id}` ({} days left)",
            escape_markdown(&member.name),
            store.days_left(member, now)
        );
    }
    let _ = write!(text, "\n⏰ Updated: {}", now.format(DATE_TIME));
    text
}

pub fn stats_card(stats: &AccessStats, now: DateTime<Utc>) -> String {
    format!(
        "📊 *SYSTEM STATISTICS*\n\n\
         👥 *Users:* {} total\n\
         ✅ *Active:* {} users\n\
         🆕 *New Today:* {} users\n\
         🔑 *Active Codes:* {}\n\n\
         ⏰ *Report generated:* {}",
        stats.total_members,
        stats.active_members,
        stats.new_today,
        stats.active_codes,
        now.format(DATE_TIME)
    )
}

pub fn member_removed(name: &str, user: UserId) -> String {
    format!(
        "✅ *USER REMOVED*\n\nName: {}\nUser ID: {user}\nAccess revoked successfully.",
        escape_markdown(name)
    )
}

pub fn broadcast_message(text: &str, now: DateTime<Utc>) -> String {
    format!("📢 *ADMIN BROADCAST*\n\n{text}\n\n_Sent: {}_", now.format(DATE_TIME))
}

pub fn broadcast_report(delivered: usize, failed: usize) -> String {
    format!(
        "✅ *BROADCAST COMPLETE*\n\n\
         • Successful: {delivered} users\n\
         • Failed: {failed} users\n\
         • Total: {} users",
        delivered + failed
    )
}

pub fn welcome(first_name: &str, valid_until: DateTime<Utc>, access_days: i64) -> String {
    format!(
        "🎉 *Welcome to the signal desk!*\n\n\
         ✅ *Access Granted*\n\
         👤 User: {}\n\
         📅 Valid until: {}\n\
         ⏰ {access_days} days premium access\n\n\
         *What you get:*\n\
         • 📊 Professional trading signals\n\
         • 💰 Real-time market analysis\n\
         • ⚡ Fast execution alerts\n\
         • 📈 Multi-timeframe analysis\n\
         • 🔒 Risk management guidance\n\n\
         _Start by getting your first signal!_",
        escape_markdown(first_name),
        valid_until.format(DATE)
    )
}

pub fn welcome_back(first_name: &str, days_left: Option<i64>) -> String {
    let access = match days_left {
        Some(days) => format!("📅 Access: {days} days left"),
        None => "👑 Administrator access".to_string(),
    };
    format!(
        "👋 *Welcome back, {}!*\n\n{access}\n\nUse the menu below to get signals.",
        escape_markdown(first_name)
    )
}

pub fn new_member_notice(msg: &Incoming, now: DateTime<Utc>) -> String {
    let username = msg
        .username
        .as_deref()
        .map(|u| format!("@{}", escape_markdown(u)))
        .unwrap_or_else(|| "N/A".to_string());
    format!(
        "👤 *New User Registered*\n\n\
         Name: {}\n\
         Username: {username}\n\
         User ID: {}\n\
         Date: {}",
        escape_markdown(&msg.first_name),
        msg.user_id,
        now.format(DATE_TIME)
    )
}

pub fn code_prompt(admin_contact: &str) -> String {
    format!(
        "🔒 *Access Required*\n\nPlease enter your 6-digit access code.\n\n\
         If you don't have a code, contact {admin_contact} for assistance."
    )
}

pub fn invalid_code(admin_contact: &str) -> String {
    format!(
        "❌ *Invalid Access Code*\n\nThe code you entered is invalid or has expired.\n\n\
         Please check your code or contact {admin_contact} for assistance."
    )
}

pub fn access_required(admin_contact: &str) -> String {
    format!(
        "🔒 *Access Required*\n\nPlease use /start to begin the authentication process.\n\n\
         Contact {admin_contact} if you need an access code."
    )
}
