//! Access store: members, single-use codes, the admin, conversation state.
//!
//! All lifecycle checks take `now` explicitly so expiry is testable without a
//! clock. The store is shared as `Arc<Mutex<AccessStore>>` between the poll
//! loop and the scheduler.

use crate::message::UserId;
use chrono::{DateTime, Duration, Utc};
use fxsignal_core::config::BotConfig;
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

pub const CODE_MIN: u32 = 100_000;
pub const CODE_MAX: u32 = 999_999;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("access code {0} does not exist")]
    InvalidCode(String),

    #[error("access code {0} has expired")]
    CodeExpired(String),

    #[error("administrator already assigned")]
    AdminTaken,

    #[error("user {0} is not authorized")]
    UnknownUser(UserId),

    #[error("the administrator cannot be removed")]
    CannotRevokeAdmin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub username: Option<String>,
    pub added_at: DateTime<Utc>,
    pub is_admin: bool,
}

/// What a free-text message from this user should be read as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    AwaitingCode,
    AwaitingRevokeId,
    AwaitingBroadcast,
}

/// Capability needed to run a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Permission {
    Anyone,
    Member,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Anonymous,
    Member,
    Admin,
}

impl Role {
    pub fn permits(self, permission: Permission) -> bool {
        match permission {
            Permission::Anyone => true,
            Permission::Member => matches!(self, Role::Member | Role::Admin),
            Permission::Admin => self == Role::Admin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccessStats {
    pub total_members: usize,
    pub active_members: usize,
    pub new_today: usize,
    pub active_codes: usize,
}

#[derive(Debug, Clone)]
pub struct AccessStore {
    members: BTreeMap<UserId, Member>,
    codes: BTreeMap<String, DateTime<Utc>>,
    admin: Option<UserId>,
    states: HashMap<UserId, ConversationState>,
    access_days: i64,
    code_days: i64,
}

impl AccessStore {
    pub fn new(access_days: i64, code_days: i64) -> Self {
        Self {
            members: BTreeMap::new(),
            codes: BTreeMap::new(),
            admin: None,
            states: HashMap::new(),
            access_days,
            code_days,
        }
    }

    pub fn from_config(config: &BotConfig) -> Self {
        Self::new(config.access_days, config.code_days)
    }

    pub fn admin(&self) -> Option<UserId> {
        self.admin
    }

    pub fn is_admin(&self, user: UserId) -> bool {
        self.admin == Some(user)
    }

    /// First claimant becomes admin; the existing admin may claim again.
    pub fn claim_admin(
        &mut self,
        user: UserId,
        name: &str,
        username: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), AccessError> {
        match self.admin {
            Some(existing) if existing != user => return Err(AccessError::AdminTaken),
            _ => {}
        }
        self.admin = Some(user);
        let member = self.members.entry(user).or_insert_with(|| Member {
            name: name.to_string(),
            username: username.map(str::to_string),
            added_at: now,
            is_admin: true,
        });
        member.is_admin = true;
        Ok(())
    }

    /// Create a fresh six-digit code valid for `code_days`.
    pub fn generate_code(&mut self, now: DateTime<Utc>) -> String {
        self.generate_code_with(&mut rand::thread_rng(), now)
    }

    pub fn generate_code_with<R: Rng + ?Sized>(&mut self, rng: &mut R, now: DateTime<Utc>) -> String {
        let code = loop {
            let candidate = rng.gen_range(CODE_MIN..=CODE_MAX).to_string();
            if !self.codes.contains_key(&candidate) {
                break candidate;
            }
        };
        self.codes
            .insert(code.clone(), now + Duration::days(self.code_days));
        code
    }

    pub fn code_expiry(&self, code: &str) -> Option<DateTime<Utc>> {
        self.codes.get(code).copied()
    }

    /// Consume `code` and grant membership. Expired codes are dropped.
    pub fn redeem_code(
        &mut self,
        user: UserId,
        code: &str,
        name: &str,
        username: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<&Member, AccessError> {
        let expires_at = self
            .codes
            .remove(code)
            .ok_or_else(|| AccessError::InvalidCode(code.to_string()))?;
        if now >= expires_at {
            return Err(AccessError::CodeExpired(code.to_string()));
        }

        let is_admin = self.is_admin(user);
        self.members.insert(
            user,
            Member {
                name: name.to_string(),
                username: username.map(str::to_string),
                added_at: now,
                is_admin,
            },
        );
        self.states.remove(&user);
        self.members
            .get(&user)
            .ok_or(AccessError::UnknownUser(user))
    }

    pub fn member(&self, user: UserId) -> Option<&Member> {
        self.members.get(&user)
    }

    pub fn members(&self) -> impl Iterator<Item = (UserId, &Member)> {
        self.members.iter().map(|(id, m)| (*id, m))
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn access_expires_at(&self, member: &Member) -> DateTime<Utc> {
        member.added_at + Duration::days(self.access_days)
    }

    /// Whole days of access left, never negative.
    pub fn days_left(&self, member: &Member, now: DateTime<Utc>) -> i64 {
        (self.access_expires_at(member) - now).num_days().max(0)
    }

    pub fn is_authorized(&self, user: UserId, now: DateTime<Utc>) -> bool {
        if self.is_admin(user) {
            return true;
        }
        self.members
            .get(&user)
            .is_some_and(|m| now < self.access_expires_at(m))
    }

    pub fn role(&self, user: UserId, now: DateTime<Utc>) -> Role {
        if self.is_admin(user) {
            Role::Admin
        } else if self.is_authorized(user, now) {
            Role::Member
        } else {
            Role::Anonymous
        }
    }

    /// Users who should receive broadcasts and automated alerts.
    pub fn recipients(&self, now: DateTime<Utc>) -> Vec<UserId> {
        self.members
            .keys()
            .copied()
            .filter(|id| self.is_authorized(*id, now))
            .collect()
    }

    pub fn revoke(&mut self, user: UserId) -> Result<Member, AccessError> {
        if self.is_admin(user) {
            return Err(AccessError::CannotRevokeAdmin);
        }
        self.states.remove(&user);
        self.members
            .remove(&user)
            .ok_or(AccessError::UnknownUser(user))
    }

    /// Drop expired members (never the admin) and expired codes.
    /// Returns `(members_removed, codes_removed)`.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> (usize, usize) {
        let expired: Vec<UserId> = self
            .members
            .iter()
            .filter(|(id, m)| !self.is_admin(**id) && now >= self.access_expires_at(m))
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            self.members.remove(id);
            self.states.remove(id);
        }

        let before = self.codes.len();
        self.codes.retain(|_, expires_at| now < *expires_at);
        (expired.len(), before - self.codes.len())
    }

    pub fn state(&self, user: UserId) -> Option<ConversationState> {
        self.states.get(&user).copied()
    }

    pub fn set_state(&mut self, user: UserId, state: ConversationState) {
        self.states.insert(user, state);
    }

    pub fn clear_state(&mut self, user: UserId) {
        self.states.remove(&user);
    }

    pub fn stats(&self, now: DateTime<Utc>) -> AccessStats {
        let today = now.date_naive();
        AccessStats {
            total_members: self.members.len(),
            active_members: self
                .members
                .keys()
                .filter(|id| self.is_authorized(**id, now))
                .count(),
            new_today: self
                .members
                .values()
                .filter(|m| m.added_at.date_naive() == today)
                .count(),
            active_codes: self.codes.values().filter(|e| now < **e).count(),
        }
    }
}
