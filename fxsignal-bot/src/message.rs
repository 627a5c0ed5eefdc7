//! Chat messages in and out of the bot, independent of the transport.

use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type ChatId = i64;

/// A text message received from a user.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Incoming {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub text: String,
}

impl Incoming {
    /// A private-chat message (chat id equals user id).
    pub fn private(user_id: UserId, first_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user_id,
            chat_id: user_id,
            first_name: first_name.into(),
            last_name: None,
            username: None,
            text: text.into(),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// First and last name joined, as shown in admin listings.
    pub fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

/// Reply keyboard attached to an outgoing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Keyboard {
    Main { admin: bool },
    Admin,
    /// Hide any keyboard while waiting for free-text input.
    Remove,
}

pub const BTN_GET_SIGNAL: &str = "📊 Get Signal";
pub const BTN_CURRENT_PRICE: &str = "💰 Current Price";
pub const BTN_ADMIN_PANEL: &str = "👑 Admin Panel";
pub const BTN_LIST_USERS: &str = "👥 List Users";
pub const BTN_GENERATE_CODE: &str = "🔑 Generate Code";
pub const BTN_USAGE_STATS: &str = "📊 Usage Stats";
pub const BTN_REMOVE_USER: &str = "🗑️ Remove User";
pub const BTN_BROADCAST: &str = "📢 Broadcast";
pub const BTN_BACK_TO_MAIN: &str = "⬅️ Back to Main";

impl Keyboard {
    /// Button rows, top to bottom. Empty for `Remove`.
    pub fn rows(&self) -> Vec<Vec<&'static str>> {
        match self {
            Keyboard::Main { admin } => {
                let mut rows = vec![vec![BTN_GET_SIGNAL, BTN_CURRENT_PRICE]];
                if *admin {
                    rows.push(vec![BTN_ADMIN_PANEL]);
                }
                rows
            }
            Keyboard::Admin => vec![
                vec![BTN_LIST_USERS, BTN_GENERATE_CODE],
                vec![BTN_USAGE_STATS, BTN_REMOVE_USER],
                vec![BTN_BROADCAST, BTN_BACK_TO_MAIN],
            ],
            Keyboard::Remove => Vec::new(),
        }
    }
}

/// A message to deliver to one chat.
#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub chat_id: ChatId,
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

impl Outgoing {
    pub fn text(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_sees_extra_main_row() {
        assert_eq!(Keyboard::Main { admin: false }.rows().len(), 1);
        let rows = Keyboard::Main { admin: true }.rows();
        assert_eq!(rows[1], vec![BTN_ADMIN_PANEL]);
    }

    #[test]
    fn admin_keyboard_has_six_buttons() {
        let n: usize = Keyboard::Admin.rows().iter().map(Vec::len).sum();
        assert_eq!(n, 6);
        assert!(Keyboard::Remove.rows().is_empty());
    }

    #[test]
    fn display_name_joins_last_name() {
        let mut msg = Incoming::private(7, "Ada", "hi");
        assert_eq!(msg.display_name(), "Ada");
        msg.last_name = Some("Lovelace".into());
        assert_eq!(msg.display_name(), "Ada Lovelace");
    }
}
