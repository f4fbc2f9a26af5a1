use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sea_orm::{ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use tokio::sync::Mutex;
use palisade_common::{PalisadeConfig, RateAction, Secret, SecurityProfile};
use palisade_core::db::populate_db;
use palisade_core::{
    cleanup_expired_at, CsrfCheck, EndpointRequirements, GateRejection, IpBlocklist, NewUserRequest,
    RateLimiter, RequestContext, SecurityEventLog, SecurityGate, SuspiciousActivityDetector,
};
use palisade_db_entities::{BlockedIp, PasswordHistory, User, UserRoleAssignment};
use palisade_db_migrations::migrate_database;

const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

fn test_ip() -> IpAddr {
    "203.0.113.7".parse().unwrap()
}

fn test_config() -> PalisadeConfig {
    PalisadeConfig::for_profile(
        SecurityProfile::Strict,
        Secret::new("an-integration-test-secret-of-32b".to_owned()),
    )
}

async fn test_db() -> Arc<Mutex<DatabaseConnection>> {
    // A single connection keeps every query on the same in-memory db
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).sqlx_logging(false);
    let db = Database::connect(opt).await.unwrap();
    migrate_database(&db).await.unwrap();
    populate_db(&db).await.unwrap();
    Arc::new(Mutex::new(db))
}

async fn test_gate() -> SecurityGate {
    SecurityGate::new(test_db().await, test_config())
}

fn ctx() -> RequestContext {
    RequestContext::anonymous(test_ip(), "test-agent")
}

fn new_user() -> NewUserRequest {
    NewUserRequest {
        username: "alice".to_owned(),
        email: "alice@example.com".to_owned(),
        password: Secret::new("Correct-Horse-17".to_owned()),
    }
}

#[tokio::test]
async fn rate_limit_allows_up_to_max_then_denies() {
    let db = test_db().await;
    let limiter = RateLimiter::new(db, test_config().rate_limits, QUERY_TIMEOUT);
    let ip = test_ip();
    let now = Utc::now();

    // Strict login quota is 5 per 900 s
    for _ in 0..5 {
        assert!(limiter.allow_at(RateAction::Login, "alice", &ip, now).await.unwrap());
        limiter.record_at(RateAction::Login, "alice", &ip, now).await.unwrap();
    }
    assert!(!limiter.allow_at(RateAction::Login, "alice", &ip, now).await.unwrap());

    // A different action from the same IP is unaffected
    assert!(limiter.allow_at(RateAction::ApiCall, "alice", &ip, now).await.unwrap());

    // Once the window has passed the quota is fresh
    let later = now + chrono::Duration::seconds(901);
    assert!(limiter.allow_at(RateAction::Login, "alice", &ip, later).await.unwrap());
}

#[tokio::test]
async fn rate_limit_counts_identifier_across_ips() {
    let db = test_db().await;
    let limiter = RateLimiter::new(db, test_config().rate_limits, QUERY_TIMEOUT);
    let now = Utc::now();

    for i in 0..5 {
        let ip: IpAddr = format!("203.0.113.{i}").parse().unwrap();
        limiter.record_at(RateAction::Login, "alice", &ip, now).await.unwrap();
    }
    let fresh_ip: IpAddr = "198.51.100.1".parse().unwrap();
    assert!(!limiter.allow_at(RateAction::Login, "alice", &fresh_ip, now).await.unwrap());
}

#[tokio::test]
async fn blocklist_expires_and_upsert_extends() {
    let db = test_db().await;
    let events = SecurityEventLog::new(db.clone(), QUERY_TIMEOUT);
    let blocklist = IpBlocklist::new(db.clone(), events, QUERY_TIMEOUT);
    let ip = test_ip();
    let now = Utc::now();

    assert!(!blocklist.is_blocked_at(&ip, now).await.unwrap());
    blocklist
        .block_at(&ip, Duration::from_secs(600), "manual", now)
        .await
        .unwrap();
    assert!(blocklist.is_blocked_at(&ip, now).await.unwrap());
    assert!(!blocklist
        .is_blocked_at(&ip, now + chrono::Duration::seconds(601))
        .await
        .unwrap());

    // Re-blocking replaces the row instead of adding a second one
    blocklist
        .block_at(&ip, Duration::from_secs(7200), "extended", now)
        .await
        .unwrap();
    let active = blocklist.list_blocked_at(now).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].reason, "extended");
    assert!(blocklist
        .is_blocked_at(&ip, now + chrono::Duration::seconds(3600))
        .await
        .unwrap());

    blocklist.unblock(&ip).await.unwrap();
    assert!(!blocklist.is_blocked_at(&ip, now).await.unwrap());
}

#[tokio::test]
async fn detector_flags_failed_login_burst_and_auto_blocks() {
    let db = test_db().await;
    let config = test_config();
    let events = SecurityEventLog::new(db.clone(), QUERY_TIMEOUT);
    let blocklist = IpBlocklist::new(db.clone(), events.clone(), QUERY_TIMEOUT);
    let detector =
        SuspiciousActivityDetector::new(events.clone(), blocklist.clone(), config.detection);
    let ip = test_ip();
    let now = Utc::now();

    use palisade_common::{EventKind, Severity};
    use palisade_core::NewSecurityEvent;
    for _ in 0..11 {
        events
            .record_at(
                NewSecurityEvent {
                    kind: EventKind::LoginFailed,
                    details: String::new(),
                    user_id: None,
                    remote_ip: ip,
                    user_agent: String::new(),
                    severity: Severity::Medium,
                },
                now,
            )
            .await
            .unwrap();
    }

    assert!(detector.detect_at(&ip, None, now).await.unwrap());
    // Tripping the detector blocks the IP
    assert!(blocklist.is_blocked_at(&ip, now).await.unwrap());

    // A quiet IP is not flagged
    let other: IpAddr = "198.51.100.9".parse().unwrap();
    assert!(!detector.detect_at(&other, None, now).await.unwrap());
}

#[tokio::test]
async fn registration_creates_user_with_role_and_history() {
    let db = test_db().await;
    let gate = SecurityGate::new(db.clone(), test_config());
    let user = gate.register(&new_user(), &ctx()).await.unwrap();
    assert_eq!(user.username, "alice");
    assert!(user.is_active);
    // The stored hash is never the raw password
    assert_ne!(user.password_hash, "Correct-Horse-17");

    let db = db.lock().await;
    let assignments = UserRoleAssignment::Entity::find()
        .filter(UserRoleAssignment::Column::UserId.eq(user.id))
        .count(&*db)
        .await
        .unwrap();
    assert_eq!(assignments, 1);
    let history = PasswordHistory::Entity::find()
        .filter(PasswordHistory::Column::UserId.eq(user.id))
        .count(&*db)
        .await
        .unwrap();
    assert_eq!(history, 1);
}

#[tokio::test]
async fn registration_rejects_weak_password_with_all_violations() {
    let gate = test_gate().await;
    let request = NewUserRequest {
        password: Secret::new("alice1".to_owned()),
        ..new_user()
    };
    match gate.register(&request, &ctx()).await {
        Err(GateRejection::InvalidInput(details)) => {
            assert!(details.len() >= 3, "{details:?}");
        }
        other => panic!("expected InvalidInput, got {other:?}"),
    }
}

#[tokio::test]
async fn registration_rejects_duplicates() {
    let gate = test_gate().await;
    gate.register(&new_user(), &ctx()).await.unwrap();

    let same_email = NewUserRequest {
        username: "alice2".to_owned(),
        ..new_user()
    };
    match gate.register(&same_email, &ctx()).await {
        Err(rejection @ GateRejection::InvalidInput(_)) => assert_eq!(rejection.status(), 400),
        other => panic!("expected InvalidInput, got {other:?}"),
    }
}

#[tokio::test]
async fn login_succeeds_and_updates_last_login() {
    let gate = test_gate().await;
    let user = gate.register(&new_user(), &ctx()).await.unwrap();
    assert!(user.last_login_at.is_none());

    let tokens = gate.login("alice", "Correct-Horse-17", &ctx()).await.unwrap();
    assert_eq!(tokens.expires_in_seconds, 900);
    assert!(!tokens.access_token.expose_secret().is_empty());

    // Email works as the login identifier too
    gate.login("alice@example.com", "Correct-Horse-17", &ctx())
        .await
        .unwrap();
}

#[tokio::test]
async fn login_is_enumeration_resistant() {
    let gate = test_gate().await;
    gate.register(&new_user(), &ctx()).await.unwrap();

    let unknown = gate.login("nobody", "Correct-Horse-17", &ctx()).await;
    let wrong_password = gate.login("alice", "Wrong-Horse-17", &ctx()).await;

    let (Err(a), Err(b)) = (unknown, wrong_password) else {
        panic!("both logins must fail");
    };
    assert_eq!(a.status(), 401);
    assert_eq!(b.status(), 401);
    assert_eq!(a.message(), b.message());
}

#[tokio::test]
async fn sixth_login_attempt_is_rate_limited_even_with_correct_password() {
    let gate = test_gate().await;
    gate.register(&new_user(), &ctx()).await.unwrap();
    let now = Utc::now();

    for _ in 0..5 {
        let result = gate.login_at("alice", "Wrong-Horse-17", &ctx(), now).await;
        assert_eq!(result.unwrap_err().status(), 401);
    }
    let result = gate.login_at("alice", "Correct-Horse-17", &ctx(), now).await;
    match result {
        Err(rejection @ GateRejection::RateLimited) => assert_eq!(rejection.status(), 429),
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test]
async fn authorize_request_accepts_access_token_and_rejects_refresh() {
    let gate = test_gate().await;
    gate.register(&new_user(), &ctx()).await.unwrap();
    let tokens = gate.login("alice", "Correct-Horse-17", &ctx()).await.unwrap();

    let authorized = gate
        .authorize_request(
            &ctx(),
            &EndpointRequirements::default(),
            Some(tokens.access_token.expose_secret()),
        )
        .await
        .unwrap();
    assert_eq!(authorized.user.username, "alice");
    assert!(authorized.claims.roles.contains(&"user".to_owned()));

    let refused = gate
        .authorize_request(
            &ctx(),
            &EndpointRequirements::default(),
            Some(tokens.refresh_token.expose_secret()),
        )
        .await;
    assert_eq!(refused.unwrap_err().status(), 401);

    let missing = gate
        .authorize_request(&ctx(), &EndpointRequirements::default(), None)
        .await;
    assert_eq!(missing.unwrap_err().status(), 401);
}

#[tokio::test]
async fn authorize_request_enforces_roles_and_csrf() {
    let gate = test_gate().await;
    gate.register(&new_user(), &ctx()).await.unwrap();
    let tokens = gate.login("alice", "Correct-Horse-17", &ctx()).await.unwrap();
    let token = tokens.access_token.expose_secret();

    let admin_only = EndpointRequirements {
        required_roles: vec!["admin".to_owned()],
        csrf: CsrfCheck::NotRequired,
    };
    let refused = gate.authorize_request(&ctx(), &admin_only, Some(token)).await;
    assert_eq!(refused.unwrap_err().status(), 403);

    let csrf_failed = EndpointRequirements {
        required_roles: vec![],
        csrf: CsrfCheck::Failed,
    };
    let refused = gate.authorize_request(&ctx(), &csrf_failed, Some(token)).await;
    match refused {
        Err(rejection @ GateRejection::CsrfFailed) => assert_eq!(rejection.status(), 403),
        other => panic!("expected CsrfFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn blocked_ip_is_refused_before_anything_else() {
    let gate = test_gate().await;
    gate.blocklist()
        .block(&test_ip(), Duration::from_secs(3600), "test")
        .await
        .unwrap();

    let refused = gate
        .authorize_request(&ctx(), &EndpointRequirements::default(), None)
        .await;
    match refused {
        Err(rejection @ GateRejection::IpBlocked) => assert_eq!(rejection.status(), 403),
        other => panic!("expected IpBlocked, got {other:?}"),
    }
}

#[tokio::test]
async fn refresh_mints_a_new_access_token() {
    let gate = test_gate().await;
    gate.register(&new_user(), &ctx()).await.unwrap();
    let tokens = gate.login("alice", "Correct-Horse-17", &ctx()).await.unwrap();

    let refreshed = gate.refresh(tokens.refresh_token.expose_secret()).await.unwrap();
    let authorized = gate
        .authorize_request(
            &ctx(),
            &EndpointRequirements::default(),
            Some(refreshed.access_token.expose_secret()),
        )
        .await
        .unwrap();
    assert_eq!(authorized.user.username, "alice");

    assert_eq!(
        gate.refresh("not-a-token").await.unwrap_err().status(),
        401
    );
}

#[tokio::test]
async fn cleanup_removes_only_expired_rows() {
    let db = test_db().await;
    let config = test_config();
    let events = SecurityEventLog::new(db.clone(), QUERY_TIMEOUT);
    let blocklist = IpBlocklist::new(db.clone(), events.clone(), QUERY_TIMEOUT);
    let limiter = RateLimiter::new(db.clone(), config.rate_limits.clone(), QUERY_TIMEOUT);
    let ip = test_ip();
    let now = Utc::now();

    blocklist
        .block_at(&ip, Duration::from_secs(60), "short", now - chrono::Duration::hours(1))
        .await
        .unwrap();
    limiter
        .record_at(RateAction::Login, "alice", &ip, now - chrono::Duration::days(2))
        .await
        .unwrap();
    limiter.record_at(RateAction::Login, "alice", &ip, now).await.unwrap();

    let stats = cleanup_expired_at(
        &db,
        &config.rate_limits,
        config.store.retention_days,
        QUERY_TIMEOUT,
        now,
    )
    .await
    .unwrap();

    assert_eq!(stats.expired_blocks, 1);
    assert_eq!(stats.stale_rate_attempts, 1);
    // Events within retention stay put (block_at wrote some)
    assert_eq!(stats.aged_out_events, 0);

    let db = db.lock().await;
    let blocks = BlockedIp::Entity::find().count(&*db).await.unwrap();
    assert_eq!(blocks, 0);
}

#[tokio::test]
async fn rejected_requests_leave_an_audit_trail() {
    let gate = test_gate().await;
    gate.register(&new_user(), &ctx()).await.unwrap();
    let now = Utc::now();

    let _ = gate.login_at("alice", "Wrong-Horse-17", &ctx(), now).await;
    let failed = gate
        .events()
        .count_kind_for_ip_since(
            &test_ip(),
            palisade_common::EventKind::LoginFailed,
            now - chrono::Duration::seconds(60),
        )
        .await
        .unwrap();
    assert_eq!(failed, 1);
}

#[tokio::test]
async fn authorization_refusals_are_audited() {
    let gate = test_gate().await;
    let now = Utc::now();
    let since = now - chrono::Duration::seconds(60);

    // Garbage bearer token
    let refused = gate
        .authorize_request_at(
            &ctx(),
            &EndpointRequirements::default(),
            Some("not-a-jwt"),
            now,
        )
        .await;
    assert!(matches!(refused, Err(GateRejection::Unauthenticated)));
    let invalid = gate
        .events()
        .count_kind_for_ip_since(&test_ip(), palisade_common::EventKind::InvalidToken, since)
        .await
        .unwrap();
    assert_eq!(invalid, 1);

    // Missing token is audited the same way
    let refused = gate
        .authorize_request_at(&ctx(), &EndpointRequirements::default(), None, now)
        .await;
    assert!(matches!(refused, Err(GateRejection::Unauthenticated)));
    let invalid = gate
        .events()
        .count_kind_for_ip_since(&test_ip(), palisade_common::EventKind::InvalidToken, since)
        .await
        .unwrap();
    assert_eq!(invalid, 2);

    // A refused blocked-IP request leaves its own trail
    gate.blocklist()
        .block(&test_ip(), Duration::from_secs(3600), "test")
        .await
        .unwrap();
    let refused = gate
        .authorize_request_at(&ctx(), &EndpointRequirements::default(), None, now)
        .await;
    assert!(matches!(refused, Err(GateRejection::IpBlocked)));
    let blocked = gate
        .events()
        .count_kind_for_ip_since(&test_ip(), palisade_common::EventKind::BlockedAccess, since)
        .await
        .unwrap();
    assert_eq!(blocked, 1);
}

#[allow(dead_code)]
fn assert_send<T: Send>() {}

#[test]
fn services_types_are_send() {
    assert_send::<SecurityGate>();
    assert_send::<User::Model>();
}
