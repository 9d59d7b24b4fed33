//! Caveat validation semantics over full macaroons.
//!
//! Exercises the ordered validation pass: scope narrowing, monotonic
//! delegation timestamps, TTL anchoring, tightest-wins expiration, the
//! delegatee caps and the sticky app restriction.

use macaroon_core::{
    Caveat, CaveatType, Context, DelegateeKind, Error, Macaroon, Scope, ValidationResult,
    ValidationState,
};

/// Build a caveat into owned storage so tests can hold arbitrary sequences.
fn owned(build: impl FnOnce(&mut [u8]) -> Caveat<'_>) -> Vec<u8> {
    let mut buf = [0u8; 64];
    let caveat = build(&mut buf);
    caveat.as_bytes().to_vec()
}

fn scope(s: Scope) -> Vec<u8> {
    owned(|buf| Caveat::build_scope(s, buf).unwrap())
}

fn timestamp(ts: u32) -> Vec<u8> {
    owned(|buf| Caveat::build_delegation_timestamp(ts, buf).unwrap())
}

fn expiration(ts: u32) -> Vec<u8> {
    owned(|buf| Caveat::build_expiration_absolute(ts, buf).unwrap())
}

fn ttl_1_hour() -> Vec<u8> {
    owned(|buf| Caveat::build_ttl_1_hour(buf).unwrap())
}

fn delegatee_user(id: &[u8]) -> Vec<u8> {
    owned(|buf| Caveat::build_delegatee_user(id, buf).unwrap())
}

fn delegatee_app(id: &[u8]) -> Vec<u8> {
    owned(|buf| Caveat::build_delegatee_app(id, buf).unwrap())
}

fn delegatee_service(id: &[u8]) -> Vec<u8> {
    owned(|buf| Caveat::build_delegatee_service(id, buf).unwrap())
}

const ROOT_KEY: &[u8] = b"validation-root-key!";

fn validate<'a>(storage: &'a [Vec<u8>], ctx: &Context<'_>) -> Result<ValidationResult<'a>, Error> {
    let caveats: Vec<Caveat<'_>> = storage.iter().map(|b| Caveat::from_bytes(b)).collect();
    let macaroon = Macaroon::create_from_root_key(ROOT_KEY, ctx, &caveats)?;
    macaroon.validate(ROOT_KEY, ctx)
}

#[test]
fn scope_narrowing_is_order_independent() {
    let ctx = Context::new(0);

    let forward_storage = [scope(Scope::Manager), scope(Scope::Viewer)];
    let backward_storage = [scope(Scope::Viewer), scope(Scope::Manager)];
    let forward = validate(&forward_storage, &ctx).unwrap();
    let backward = validate(&backward_storage, &ctx).unwrap();

    assert_eq!(forward.granted_scope(), Scope::Viewer);
    assert_eq!(backward.granted_scope(), Scope::Viewer);
}

#[test]
fn scope_never_widens() {
    let ctx = Context::new(0);
    let storage = [scope(Scope::Viewer), scope(Scope::Owner), scope(Scope::User)];
    let result = validate(&storage, &ctx).unwrap();
    assert_eq!(result.granted_scope(), Scope::Viewer);
}

#[test]
fn intermediate_scope_values_snap_narrower() {
    // raw scope 10 sits between Manager (8) and User (14); the wire allows
    // it even though no constructor emits it
    let raw_scope = vec![0x01, 0x0A];
    let ctx = Context::new(0);
    let storage = [raw_scope];
    let result = validate(&storage, &ctx).unwrap();
    assert_eq!(result.granted_scope(), Scope::User);
}

#[test]
fn scope_past_viewer_collapses_to_sentinel() {
    let raw_scope = vec![0x01, 0x18, 0x7F]; // scope 127
    let ctx = Context::new(0);
    let storage = [raw_scope];
    let result = validate(&storage, &ctx).unwrap();
    assert_eq!(result.granted_scope(), Scope::LowestPossible);
}

#[test]
fn scope_beyond_lowest_possible_is_rejected() {
    let raw_scope = vec![0x01, 0x18, 0x80]; // scope 128
    let ctx = Context::new(0);
    assert_eq!(
        validate(&[raw_scope], &ctx),
        Err(Error::ScopeOutOfRange(128))
    );
}

#[test]
fn no_scope_caveat_grants_owner() {
    let ctx = Context::new(0);
    let storage = [expiration(1000)];
    let result = validate(&storage, &ctx).unwrap();
    assert_eq!(result.granted_scope(), Scope::Owner);
}

#[test]
fn ttl_requires_preceding_timestamp() {
    let ctx = Context::new(100);
    assert_eq!(
        validate(&[ttl_1_hour()], &ctx),
        Err(Error::MissingDelegationTimestamp)
    );
}

#[test]
fn ttl_expires_one_hour_after_timestamp() {
    // issued 500, window 3600: last valid second is 4100
    let expired_ctx = Context::new(500 + 3601);
    assert_eq!(
        validate(&[timestamp(500), ttl_1_hour()], &expired_ctx),
        Err(Error::CaveatExpired {
            expiration: 4100,
            now: 4101
        })
    );

    let live_ctx = Context::new(500 + 3600);
    let storage = [timestamp(500), ttl_1_hour()];
    let result = validate(&storage, &live_ctx).unwrap();
    assert_eq!(result.expiration_time(), 4100);
}

#[test]
fn ttl_saturates_instead_of_wrapping() {
    // a timestamp near the end of u32 time must not wrap the TTL window
    // around to a tiny expiration
    let ctx = Context::new(u32::MAX);
    let storage = [timestamp(u32::MAX - 100), ttl_1_hour()];
    let result = validate(&storage, &ctx).unwrap();
    assert_eq!(result.expiration_time(), u32::MAX);
}

#[test]
fn ttl_24_hour_window() {
    let ctx = Context::new(1000);
    let storage = [
        timestamp(1000),
        owned(|buf| Caveat::build_ttl_24_hour(buf).unwrap()),
    ];
    let result = validate(&storage, &ctx).unwrap();
    assert_eq!(result.expiration_time(), 1000 + 86_400);
}

#[test]
fn delegation_timestamps_must_not_move_backwards() {
    let ctx = Context::new(0);
    assert_eq!(
        validate(&[timestamp(500), timestamp(400)], &ctx),
        Err(Error::TimestampRollback {
            previous: 500,
            current: 400
        })
    );
    // forward (and equal) re-stamping is fine
    assert!(validate(&[timestamp(400), timestamp(400)], &ctx).is_ok());
    assert!(validate(&[timestamp(400), timestamp(500)], &ctx).is_ok());
}

#[test]
fn expiration_is_tightest_wins() {
    let ctx = Context::new(100);
    let storage = [expiration(1000), expiration(800)];
    let result = validate(&storage, &ctx).unwrap();
    assert_eq!(result.expiration_time(), 800);

    let storage = [expiration(800), expiration(1000)];
    let result = validate(&storage, &ctx).unwrap();
    assert_eq!(result.expiration_time(), 800);
}

#[test]
fn absolute_expiration_in_the_past_fails() {
    let ctx = Context::new(801);
    assert_eq!(
        validate(&[expiration(800)], &ctx),
        Err(Error::CaveatExpired {
            expiration: 800,
            now: 801
        })
    );
}

#[test]
fn delegatees_record_the_issued_time() {
    let ctx = Context::new(0);
    let storage = [
        timestamp(300),
        delegatee_user(b"alice"),
        timestamp(500),
        delegatee_app(b"app-1"),
    ];
    let result = validate(&storage, &ctx).unwrap();

    let delegatees = result.delegatees();
    assert_eq!(delegatees.len(), 2);
    assert_eq!(delegatees[0].id, b"alice");
    assert_eq!(delegatees[0].kind, DelegateeKind::User);
    assert_eq!(delegatees[0].timestamp, 300);
    assert_eq!(delegatees[1].id, b"app-1");
    assert_eq!(delegatees[1].timestamp, 500);
}

#[test]
fn delegatee_requires_preceding_timestamp() {
    let ctx = Context::new(0);
    assert_eq!(
        validate(&[delegatee_user(b"alice")], &ctx),
        Err(Error::MissingDelegationTimestamp)
    );
}

#[test]
fn second_app_or_service_delegatee_fails() {
    let ctx = Context::new(0);
    assert_eq!(
        validate(
            &[timestamp(1), delegatee_app(b"a"), delegatee_app(b"b")],
            &ctx
        ),
        Err(Error::DuplicateDelegatee { kind: "app" })
    );
    assert_eq!(
        validate(
            &[timestamp(1), delegatee_service(b"s1"), delegatee_service(b"s2")],
            &ctx
        ),
        Err(Error::DuplicateDelegatee { kind: "service" })
    );
    // a second user is fine
    assert!(validate(
        &[timestamp(1), delegatee_user(b"alice"), delegatee_user(b"bob")],
        &ctx
    )
    .is_ok());
}

#[test]
fn eleventh_delegatee_fails() {
    let ctx = Context::new(0);
    let mut storage = vec![timestamp(1)];
    for i in 0..10u8 {
        storage.push(delegatee_user(&[i]));
    }
    assert!(validate(&storage, &ctx).is_ok(), "ten delegatees are allowed");

    storage.push(delegatee_user(b"one-too-many"));
    assert_eq!(
        validate(&storage, &ctx),
        Err(Error::TooManyDelegatees { max: 10 })
    );
}

#[test]
fn app_commands_only_is_sticky() {
    let ctx = Context::new(0);
    let storage = [
        owned(|buf| Caveat::build_app_commands_only(buf).unwrap()),
        scope(Scope::User),
    ];
    let result = validate(&storage, &ctx).unwrap();
    assert!(result.app_commands_only());
}

#[test]
fn lan_session_id_is_attached() {
    let ctx = Context::new(0);
    let storage = [owned(|buf| {
        Caveat::build_lan_session_id(b"lan-session-7", buf).unwrap()
    })];
    let result = validate(&storage, &ctx).unwrap();
    assert_eq!(result.lan_session_id(), Some(&b"lan-session-7"[..]));
}

#[test]
fn identity_caveats_are_inert() {
    let ctx = Context::new(0);
    let storage = [
        owned(|buf| Caveat::build_nonce(b"nonce", buf).unwrap()),
        owned(|buf| Caveat::build_client_authorization_token(b"cat", buf).unwrap()),
        owned(|buf| Caveat::build_server_authentication_token(b"sat", buf).unwrap()),
    ];
    let result = validate(&storage, &ctx).unwrap();
    assert_eq!(result.granted_scope(), Scope::Owner);
    assert_eq!(result.expiration_time(), u32::MAX);
    assert!(!result.app_commands_only());
}

#[test]
fn unknown_caveat_type_fails_validation_not_deserialization() {
    let ctx = Context::new(0);
    let unknown = vec![0x02]; // tag 2 is unassigned
    let caveats = [Caveat::from_bytes(&unknown)];
    let macaroon = Macaroon::create_from_root_key(ROOT_KEY, &ctx, &caveats).unwrap();

    let wire = macaroon.to_vec().unwrap();
    let restored = Macaroon::deserialize(&wire).unwrap();
    assert_eq!(
        restored.validate(ROOT_KEY, &ctx),
        Err(Error::UnknownCaveatType(2))
    );
}

#[test]
fn scope_may_precede_its_delegation_timestamp() {
    // ordering beyond the MAC chain and the timestamp preconditions is
    // deliberately permissive
    let ctx = Context::new(0);
    let storage = [scope(Scope::User), timestamp(100)];
    let result = validate(&storage, &ctx).unwrap();
    assert_eq!(result.granted_scope(), Scope::User);
}

#[test]
fn validate_equals_manual_fold() {
    let ctx = Context::new(600);
    let storage = [
        timestamp(500),
        scope(Scope::Manager),
        ttl_1_hour(),
        delegatee_user(b"alice"),
    ];
    let caveats: Vec<Caveat<'_>> = storage.iter().map(|b| Caveat::from_bytes(b)).collect();
    let macaroon = Macaroon::create_from_root_key(ROOT_KEY, &ctx, &caveats).unwrap();
    let from_macaroon = macaroon.validate(ROOT_KEY, &ctx).unwrap();

    let mut state = ValidationState::new();
    let mut manual = ValidationResult::new();
    for caveat in &caveats {
        caveat.validate(&ctx, &mut state, &mut manual).unwrap();
    }

    assert_eq!(from_macaroon, manual);
    assert_eq!(from_macaroon.granted_scope(), Scope::Manager);
    assert_eq!(from_macaroon.expiration_time(), 4100);
}

#[test]
fn caveat_type_is_visible_on_deserialized_tokens() {
    let ctx = Context::new(0);
    let storage = [scope(Scope::User), timestamp(9)];
    let caveats: Vec<Caveat<'_>> = storage.iter().map(|b| Caveat::from_bytes(b)).collect();
    let wire = Macaroon::create_from_root_key(ROOT_KEY, &ctx, &caveats)
        .unwrap()
        .to_vec()
        .unwrap();

    let restored = Macaroon::deserialize(&wire).unwrap();
    let types: Vec<CaveatType> = restored
        .caveats()
        .iter()
        .map(|c| c.caveat_type().unwrap())
        .collect();
    assert_eq!(types, vec![CaveatType::Scope, CaveatType::DelegationTimestamp]);
}
