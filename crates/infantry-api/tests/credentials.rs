/// Credential Engine against an in-memory store: setup, authentication,
/// uniqueness and the password/token/role/active lifecycle.
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use infantry_api::{Credentials, EngineError};
use infantry_db::Database;
use infantry_types::api::NewCredential;
use infantry_types::models::Role;

fn engine() -> Credentials {
    Credentials::new(Arc::new(Database::open_in_memory().unwrap()))
}

fn new_cred(user_id: Uuid, username: &str, password: &str) -> NewCredential {
    NewCredential {
        user_id: Some(user_id),
        username: Some(username.to_string()),
        password: Some(password.to_string()),
        role: None,
    }
}

#[test]
fn setup_then_authenticate() {
    let creds = engine();
    let user = Uuid::new_v4();

    let created = creds.setup(new_cred(user, "Alice", "pw1")).unwrap();
    assert_eq!(created.user_id, user);
    assert_eq!(created.username, "alice");
    assert!(created.active);
    assert_eq!(created.role, Role::Normal);
    assert_eq!(created.tokens.len(), 1);
    assert!(!created.id.is_nil());

    assert!(creds.authenticate(user, "pw1").unwrap());
    assert!(!creds.authenticate(user, "pw2").unwrap());
    assert!(!creds.authenticate(user, "PW1").unwrap());
}

#[test]
fn setup_requires_every_field() {
    let creds = engine();
    let user = Uuid::new_v4();

    let mut req = new_cred(user, "bob", "pw");
    req.user_id = None;
    assert!(matches!(creds.setup(req), Err(EngineError::MissingField("user_id"))));

    let mut req = new_cred(user, "bob", "pw");
    req.username = Some("   ".into());
    assert!(matches!(creds.setup(req), Err(EngineError::MissingField("username"))));

    let mut req = new_cred(user, "bob", "pw");
    req.password = None;
    assert!(matches!(creds.setup(req), Err(EngineError::MissingField("password"))));

    assert!(creds.is_username_available("bob").unwrap());
}

#[test]
fn setup_honours_requested_role() {
    let creds = engine();
    let mut req = new_cred(Uuid::new_v4(), "carol", "pw");
    req.role = Some(Role::PartnerAdmin);
    assert_eq!(creds.setup(req).unwrap().role, Role::PartnerAdmin);
}

#[test]
fn usernames_differing_in_case_conflict() {
    let creds = engine();

    let first = creds.setup(new_cred(Uuid::new_v4(), "Alice", "pw"));
    let second = creds.setup(new_cred(Uuid::new_v4(), "ALICE", "pw"));

    assert!(first.is_ok());
    assert!(matches!(second, Err(EngineError::Conflict(_))));
}

#[test]
fn one_credential_per_user() {
    let creds = engine();
    let user = Uuid::new_v4();

    creds.setup(new_cred(user, "dave", "pw")).unwrap();
    assert!(matches!(
        creds.setup(new_cred(user, "dave2", "pw")),
        Err(EngineError::Conflict(_))
    ));
}

#[test]
fn change_password_sets_and_clears_flag() {
    let creds = engine();
    let user = Uuid::new_v4();
    creds.setup(new_cred(user, "erin", "old")).unwrap();

    let updated = creds.change_password(user, "new", true).unwrap();
    assert!(updated.change_required());
    assert!(creds.get(user).unwrap().change_required());
    assert!(creds.authenticate(user, "new").unwrap());
    assert!(!creds.authenticate(user, "old").unwrap());

    let updated = creds.change_password(user, "newer", false).unwrap();
    assert!(!updated.change_required());
    assert!(!creds.get(user).unwrap().change_required());

    assert!(matches!(
        creds.change_password(user, "", false),
        Err(EngineError::EmptyField("password"))
    ));
    assert!(creds.authenticate(user, "newer").unwrap());
}

#[test]
fn rotate_token_keeps_at_least_one_fresh_token() {
    let creds = engine();
    let user = Uuid::new_v4();
    let created = creds.setup(new_cred(user, "frank", "pw")).unwrap();
    let initial = created.tokens[0].clone();

    let mut seen: HashSet<String> = created.tokens.iter().cloned().collect();
    let mut revoke = Some(initial.clone());
    for _ in 0..5 {
        let updated = creds.rotate_token(user, revoke.as_deref()).unwrap();
        assert!(!updated.tokens.is_empty());

        let newest = updated.tokens.last().unwrap().clone();
        assert!(seen.insert(newest.clone()), "token reissued");
        if let Some(r) = &revoke {
            assert!(!updated.tokens.contains(r));
        }
        revoke = Some(newest);
    }

    let stored = creds.get(user).unwrap();
    assert_eq!(stored.tokens.len(), 1);
    assert!(!stored.tokens.contains(&initial));
}

#[test]
fn role_changes_are_validated() {
    let creds = engine();
    let user = Uuid::new_v4();
    creds.setup(new_cred(user, "gina", "pw")).unwrap();

    assert_eq!(creds.change_role(user, Role::Admin).unwrap().role, Role::Admin);
    assert_eq!(
        creds.change_role_named(user, "celebrity").unwrap().role,
        Role::Celebrity
    );
    assert!(matches!(
        creds.change_role_named(user, "overlord"),
        Err(EngineError::InvalidField { field: "role", .. })
    ));
    assert_eq!(creds.get(user).unwrap().role, Role::Celebrity);
}

#[test]
fn toggle_active_gates_login_only() {
    let creds = engine();
    let user = Uuid::new_v4();
    creds.setup(new_cred(user, "hank", "pw")).unwrap();

    assert!(!creds.toggle_active(user).unwrap().active);
    // authenticate itself does not look at `active`
    assert!(creds.authenticate(user, "pw").unwrap());
    assert!(matches!(creds.login("hank", "pw"), Err(EngineError::Inactive)));

    assert!(creds.toggle_active(user).unwrap().active);
    assert_eq!(creds.login("HANK", "pw").unwrap().user_id, user);
}

#[test]
fn login_rejects_bad_credentials_uniformly() {
    let creds = engine();
    creds.setup(new_cred(Uuid::new_v4(), "ivy", "pw")).unwrap();

    assert!(matches!(creds.login("ivy", "nope"), Err(EngineError::Unauthorized)));
    assert!(matches!(creds.login("nobody", "pw"), Err(EngineError::Unauthorized)));
}

#[test]
fn unknown_username_costs_a_full_verification() {
    let creds = engine();
    creds.setup(new_cred(Uuid::new_v4(), "ivy", "pw")).unwrap();
    // Warm up both paths once.
    let _ = creds.login("ivy", "nope");
    let _ = creds.login("nobody", "pw");

    let time = |username: &str| {
        let start = Instant::now();
        for _ in 0..3 {
            assert!(matches!(
                creds.login(username, "nope"),
                Err(EngineError::Unauthorized)
            ));
        }
        start.elapsed()
    };
    let known = time("ivy");
    let unknown = time("nobody");

    // Same Argon2 parameters on both paths; only a lookup-only fast path
    // could be an order of magnitude quicker.
    assert!(
        unknown * 5 >= known,
        "unknown username took {:?}, wrong password took {:?}",
        unknown,
        known
    );
}

#[test]
fn lookups_by_unknown_user_are_not_found() {
    let creds = engine();
    let ghost = Uuid::new_v4();

    assert!(matches!(creds.get(ghost), Err(EngineError::NotFound(_))));
    assert!(matches!(creds.toggle_active(ghost), Err(EngineError::NotFound(_))));
    assert!(matches!(
        creds.change_username(ghost, "x"),
        Err(EngineError::NotFound(_))
    ));
    assert!(matches!(creds.rotate_token(ghost, None), Err(EngineError::NotFound(_))));
}

#[test]
fn end_to_end_username_change() {
    let creds = engine();
    let u1 = Uuid::new_v4();

    creds.setup(new_cred(u1, "Alice", "pw1")).unwrap();
    assert!(creds.authenticate(u1, "pw1").unwrap());

    let updated = creds.change_username(u1, "alice2").unwrap();
    assert_eq!(updated.username, "alice2");

    assert!(!creds.is_username_available("Alice2").unwrap());
    assert!(creds.is_username_available("alice3").unwrap());
    assert!(creds.is_username_available("alice").unwrap());
}

#[test]
fn change_username_to_taken_name_conflicts() {
    let creds = engine();
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    creds.setup(new_cred(a, "jack", "pw")).unwrap();
    creds.setup(new_cred(b, "jill", "pw")).unwrap();

    assert!(matches!(
        creds.change_username(b, "Jack"),
        Err(EngineError::Conflict(_))
    ));
    assert!(matches!(
        creds.change_username(b, " "),
        Err(EngineError::EmptyField("username"))
    ));
    assert_eq!(creds.get(b).unwrap().username, "jill");
}
