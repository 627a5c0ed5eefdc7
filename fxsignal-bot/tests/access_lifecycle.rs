//! Access store lifecycle: grant, expire, revoke.

use chrono::{DateTime, Duration, TimeZone, Utc};
use fxsignal_bot::access::{AccessError, AccessStore, ConversationState, Role};
use proptest::prelude::*;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

fn store() -> AccessStore {
    AccessStore::new(30, 30)
}

#[test]
fn code_is_single_use() {
    let mut store = store();
    let code = store.generate_code(t0());

    let member = store.redeem_code(10, &code, "Ann", Some("ann"), t0()).unwrap();
    assert_eq!(member.name, "Ann");
    assert!(!member.is_admin);
    assert_eq!(store.role(10, t0()), Role::Member);

    assert_eq!(
        store.redeem_code(11, &code, "Bob", None, t0()),
        Err(AccessError::InvalidCode(code.clone()))
    );
    assert_eq!(store.role(11, t0()), Role::Anonymous);
}

#[test]
fn expired_code_is_rejected_and_dropped() {
    let mut store = store();
    let code = store.generate_code(t0());
    let late = t0() + Duration::days(30);

    assert_eq!(
        store.redeem_code(10, &code, "Ann", None, late),
        Err(AccessError::CodeExpired(code.clone()))
    );
    assert_eq!(store.code_expiry(&code), None);
    assert_eq!(store.role(10, late), Role::Anonymous);
}

#[test]
fn membership_expires_after_access_days() {
    let mut store = store();
    let code = store.generate_code(t0());
    store.redeem_code(10, &code, "Ann", None, t0()).unwrap();

    assert!(store.is_authorized(10, t0() + Duration::days(29)));
    assert!(!store.is_authorized(10, t0() + Duration::days(30)));
    assert_eq!(store.role(10, t0() + Duration::days(31)), Role::Anonymous);
}

#[test]
fn purge_removes_expired_members_and_codes() {
    let mut store = store();
    let used = store.generate_code(t0());
    store.redeem_code(10, &used, "Ann", None, t0()).unwrap();
    let _unused = store.generate_code(t0());
    let fresh_day = t0() + Duration::days(20);
    let fresh = store.generate_code(fresh_day);

    let (members, codes) = store.purge_expired(t0() + Duration::days(35));
    assert_eq!((members, codes), (1, 1));
    assert!(store.member(10).is_none());
    assert!(store.code_expiry(&fresh).is_some());
}

#[test]
fn admin_claim_is_first_come() {
    let mut store = store();
    assert_eq!(store.admin(), None);
    store.claim_admin(1, "Root", Some("root"), t0()).unwrap();
    assert_eq!(store.admin(), Some(1));
    assert!(store.member(1).unwrap().is_admin);

    // The admin may claim again; nobody else may.
    assert!(store.claim_admin(1, "Root", None, t0()).is_ok());
    assert_eq!(
        store.claim_admin(2, "Eve", None, t0()),
        Err(AccessError::AdminTaken)
    );
    assert_eq!(store.role(2, t0()), Role::Anonymous);
}

#[test]
fn existing_member_promoted_by_claim() {
    let mut store = store();
    let code = store.generate_code(t0());
    store.redeem_code(5, &code, "Ann", None, t0()).unwrap();
    store.claim_admin(5, "Ann", None, t0()).unwrap();
    assert_eq!(store.role(5, t0()), Role::Admin);
    assert!(store.member(5).unwrap().is_admin);
}

#[test]
fn revoke_removes_member() {
    let mut store = store();
    let code = store.generate_code(t0());
    store.redeem_code(10, &code, "Ann", None, t0()).unwrap();
    store.set_state(10, ConversationState::AwaitingCode);

    let removed = store.revoke(10).unwrap();
    assert_eq!(removed.name, "Ann");
    assert_eq!(store.role(10, t0()), Role::Anonymous);
    assert_eq!(store.state(10), None);
    assert_eq!(store.revoke(10), Err(AccessError::UnknownUser(10)));
}

#[test]
fn stats_count_members_and_codes() {
    let mut store = store();
    store.claim_admin(1, "Root", None, t0() - Duration::days(3)).unwrap();
    let code = store.generate_code(t0());
    store.redeem_code(10, &code, "Ann", None, t0()).unwrap();
    store.generate_code(t0());
    store.generate_code(t0());

    let stats = store.stats(t0());
    assert_eq!(stats.total_members, 2);
    assert_eq!(stats.active_members, 2);
    assert_eq!(stats.new_today, 1);
    assert_eq!(stats.active_codes, 2);
}

#[test]
fn recipients_are_authorized_members() {
    let mut store = store();
    store.claim_admin(1, "Root", None, t0() - Duration::days(90)).unwrap();
    let old = store.generate_code(t0() - Duration::days(40));
    store
        .redeem_code(10, &old, "Old", None, t0() - Duration::days(40))
        .unwrap();
    let code = store.generate_code(t0());
    store.redeem_code(11, &code, "New", None, t0()).unwrap();

    assert_eq!(store.recipients(t0()), vec![1, 11]);
}

proptest! {
    #[test]
    fn codes_are_always_six_digits(n in 1usize..40) {
        let mut store = store();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..n {
            let code = store.generate_code(t0());
            prop_assert_eq!(code.len(), 6);
            prop_assert!(code.bytes().all(|b| b.is_ascii_digit()));
            prop_assert!(!code.starts_with('0'));
            prop_assert!(seen.insert(code));
        }
    }

    #[test]
    fn unknown_codes_never_grant_access(code in "[0-9]{6}") {
        let mut store = store();
        prop_assert!(store.redeem_code(9, &code, "X", None, t0()).is_err());
        prop_assert_eq!(store.role(9, t0()), Role::Anonymous);
    }
}
