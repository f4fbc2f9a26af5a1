use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use tokio::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;
use palisade_common::consts::BUILTIN_USER_ROLE_NAME;
use palisade_common::helpers::hash::{hash_password, verify_password_hash};
use palisade_common::{
    validate_password, EventKind, PalisadeConfig, PalisadeError, Secret, Severity,
};
use palisade_db_entities::{PasswordHistory, Role, User, UserRoleAssignment};

use crate::blocklist::IpBlocklist;
use crate::detection::SuspiciousActivityDetector;
use crate::events::{NewSecurityEvent, SecurityEventLog};
use crate::helpers::bounded;
use crate::rate_limiting::RateLimiter;
use crate::tokens::{TokenClaims, TokenIssuer, TokenKind};
use palisade_common::RateAction;

const LOGIN_FAILED_MESSAGE: &str = "Invalid credentials";

// Well-formed Argon2id hash of no real password, with the same cost
// parameters as stored hashes. Verified for unknown usernames so a
// login attempt costs the same whether or not the account exists.
const UNKNOWN_USER_HASH: &str =
    "$argon2id$v=19$m=65536,t=4,p=3$c29tZXNhbHRzb21lc2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Per-request facts the transport layer has already resolved.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub ip: IpAddr,
    pub user_agent: String,
    /// Rate-limit key for anonymous traffic; the IP string unless the
    /// caller knows something better.
    pub identifier: String,
}

impl RequestContext {
    pub fn anonymous(ip: IpAddr, user_agent: impl Into<String>) -> Self {
        Self {
            ip,
            user_agent: user_agent.into(),
            identifier: ip.to_string(),
        }
    }
}

/// What an endpoint demands of a request before its handler runs.
#[derive(Debug, Clone, Default)]
pub struct EndpointRequirements {
    pub required_roles: Vec<String>,
    pub csrf: CsrfCheck,
}

/// Outcome of the transport layer's CSRF verification against the
/// session. The gate never sees the session itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CsrfCheck {
    #[default]
    NotRequired,
    Verified,
    Failed,
}

#[derive(Debug, Clone)]
pub struct AuthorizedUser {
    pub user: User::Model,
    pub claims: TokenClaims,
}

#[derive(Debug, Clone)]
pub struct LoginTokens {
    pub access_token: Secret<String>,
    pub refresh_token: Secret<String>,
    pub expires_in_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct NewUserRequest {
    pub username: String,
    pub email: String,
    pub password: Secret<String>,
}

/// Policy verdicts, distinct from infrastructure errors. Each maps to a
/// fixed HTTP status and a client-safe message.
#[derive(Debug)]
pub enum GateRejection {
    IpBlocked,
    RateLimited,
    CsrfFailed,
    Unauthenticated,
    AccountInactive,
    PasswordExpired,
    Forbidden,
    InvalidInput(Vec<String>),
    Internal(PalisadeError),
}

impl GateRejection {
    pub fn status(&self) -> u16 {
        match self {
            Self::IpBlocked | Self::CsrfFailed | Self::AccountInactive | Self::PasswordExpired => {
                403
            }
            Self::RateLimited => 429,
            Self::Unauthenticated => 401,
            Self::Forbidden => 403,
            Self::InvalidInput(_) => 400,
            Self::Internal(_) => 500,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::IpBlocked => "Access denied".to_owned(),
            Self::RateLimited => "Too many requests".to_owned(),
            Self::CsrfFailed => "CSRF verification failed".to_owned(),
            Self::Unauthenticated => LOGIN_FAILED_MESSAGE.to_owned(),
            Self::AccountInactive => "Account is inactive".to_owned(),
            Self::PasswordExpired => "Password has expired".to_owned(),
            Self::Forbidden => "Insufficient permissions".to_owned(),
            Self::InvalidInput(_) => "Validation failed".to_owned(),
            Self::Internal(_) => "Internal error".to_owned(),
        }
    }
}

impl From<PalisadeError> for GateRejection {
    fn from(e: PalisadeError) -> Self {
        Self::Internal(e)
    }
}

/// Front door for every protected request: blocklist, anomaly detection,
/// rate limiting, CSRF, bearer auth and role checks run in a fixed order,
/// terminal on the first failure. Also owns the login and registration
/// flows since they share the same components.
#[derive(Clone)]
pub struct SecurityGate {
    db: Arc<Mutex<DatabaseConnection>>,
    config: PalisadeConfig,
    rate_limiter: RateLimiter,
    events: SecurityEventLog,
    blocklist: IpBlocklist,
    detector: SuspiciousActivityDetector,
    tokens: Arc<TokenIssuer>,
    query_timeout: Duration,
}

impl SecurityGate {
    pub fn new(db: Arc<Mutex<DatabaseConnection>>, config: PalisadeConfig) -> Self {
        let query_timeout = config.query_timeout();
        let events = SecurityEventLog::new(db.clone(), query_timeout);
        let blocklist = IpBlocklist::new(db.clone(), events.clone(), query_timeout);
        let detector = SuspiciousActivityDetector::new(
            events.clone(),
            blocklist.clone(),
            config.detection.clone(),
        );
        let rate_limiter =
            RateLimiter::new(db.clone(), config.rate_limits.clone(), query_timeout);
        let tokens = Arc::new(TokenIssuer::new(&config.jwt));
        Self {
            db,
            config,
            rate_limiter,
            events,
            blocklist,
            detector,
            tokens,
            query_timeout,
        }
    }

    pub fn events(&self) -> &SecurityEventLog {
        &self.events
    }

    pub fn blocklist(&self) -> &IpBlocklist {
        &self.blocklist
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn config(&self) -> &PalisadeConfig {
        &self.config
    }

    pub async fn authorize_request(
        &self,
        ctx: &RequestContext,
        requirements: &EndpointRequirements,
        bearer_token: Option<&str>,
    ) -> Result<AuthorizedUser, GateRejection> {
        self.authorize_request_at(ctx, requirements, bearer_token, Utc::now())
            .await
    }

    /// The full decision procedure. Store failures on the block, anomaly
    /// and rate checks fail closed: an unreachable store means the
    /// request is not authorized.
    pub async fn authorize_request_at(
        &self,
        ctx: &RequestContext,
        requirements: &EndpointRequirements,
        bearer_token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<AuthorizedUser, GateRejection> {
        if self.blocklist.is_blocked_at(&ctx.ip, now).await? {
            self.record_rejection(ctx, EventKind::BlockedAccess, Severity::Medium, None)
                .await;
            return Err(GateRejection::IpBlocked);
        }

        if self.detector.detect_at(&ctx.ip, None, now).await? {
            return Err(GateRejection::RateLimited);
        }

        if !self
            .rate_limiter
            .allow_at(RateAction::ApiCall, &ctx.identifier, &ctx.ip, now)
            .await?
        {
            self.record_rejection(ctx, EventKind::RateLimitExceeded, Severity::Medium, None)
                .await;
            return Err(GateRejection::RateLimited);
        }
        self.rate_limiter
            .record_at(RateAction::ApiCall, &ctx.identifier, &ctx.ip, now)
            .await?;

        if requirements.csrf == CsrfCheck::Failed {
            self.record_rejection(ctx, EventKind::CsrfFailure, Severity::Medium, None)
                .await;
            return Err(GateRejection::CsrfFailed);
        }

        let Some(claims) = bearer_token.and_then(|token| self.tokens.verify(token, TokenKind::Access))
        else {
            self.record_rejection(ctx, EventKind::InvalidToken, Severity::Medium, None)
                .await;
            return Err(GateRejection::Unauthenticated);
        };

        let Some(user) = self
            .find_user_by_id(claims.sub)
            .await?
            .filter(|u| u.is_active)
        else {
            self.record_rejection(ctx, EventKind::InvalidToken, Severity::Medium, None)
                .await;
            return Err(GateRejection::Unauthenticated);
        };

        if !requirements.required_roles.is_empty()
            && !requirements
                .required_roles
                .iter()
                .any(|r| claims.roles.contains(r))
        {
            self.record_rejection(
                ctx,
                EventKind::UnauthorizedAccess,
                Severity::Medium,
                Some(user.id),
            )
            .await;
            return Err(GateRejection::Forbidden);
        }

        self.events
            .record_or_warn(NewSecurityEvent {
                kind: EventKind::ApiAccess,
                details: String::new(),
                user_id: Some(user.id),
                remote_ip: ctx.ip,
                user_agent: ctx.user_agent.clone(),
                severity: Severity::Low,
            })
            .await;

        Ok(AuthorizedUser { user, claims })
    }

    pub async fn login(
        &self,
        username_or_email: &str,
        password: &str,
        ctx: &RequestContext,
    ) -> Result<LoginTokens, GateRejection> {
        self.login_at(username_or_email, password, ctx, Utc::now())
            .await
    }

    /// The rate limit is checked and the attempt recorded before the
    /// password is ever looked at, so attempt N+1 costs an attacker the
    /// same whether or not they found the right password.
    pub async fn login_at(
        &self,
        username_or_email: &str,
        password: &str,
        ctx: &RequestContext,
        now: DateTime<Utc>,
    ) -> Result<LoginTokens, GateRejection> {
        if !self
            .rate_limiter
            .allow_at(RateAction::Login, username_or_email, &ctx.ip, now)
            .await?
        {
            self.record_rejection(ctx, EventKind::RateLimitExceeded, Severity::Medium, None)
                .await;
            return Err(GateRejection::RateLimited);
        }
        self.rate_limiter
            .record_at(RateAction::Login, username_or_email, &ctx.ip, now)
            .await?;

        let user = self.find_user_by_name_or_email(username_or_email).await?;

        // Unknown account and wrong password produce the same response
        // and burn the same KDF work.
        let verified = match &user {
            Some(user) => verify_password_hash(password, &user.password_hash)?,
            None => verify_password_hash(password, UNKNOWN_USER_HASH)?,
        };
        let Some(user) = user.filter(|_| verified) else {
            self.events
                .record_or_warn(NewSecurityEvent {
                    kind: EventKind::LoginFailed,
                    details: format!("failed login for {username_or_email:?}"),
                    user_id: None,
                    remote_ip: ctx.ip,
                    user_agent: ctx.user_agent.clone(),
                    severity: Severity::Medium,
                })
                .await;
            return Err(GateRejection::Unauthenticated);
        };

        if !user.is_active {
            self.record_rejection(ctx, EventKind::LoginInactive, Severity::High, Some(user.id))
                .await;
            return Err(GateRejection::AccountInactive);
        }

        let password_age = now.signed_duration_since(user.password_updated_at);
        if password_age > chrono::Duration::days(self.config.password.max_age_days) {
            self.record_rejection(
                ctx,
                EventKind::PasswordExpired,
                Severity::Medium,
                Some(user.id),
            )
            .await;
            return Err(GateRejection::PasswordExpired);
        }

        let roles = {
            let db = self.db.lock().await;
            bounded(self.query_timeout, user.role_names(&*db)).await?
        };

        {
            let db = self.db.lock().await;
            let mut active: User::ActiveModel = user.clone().into();
            active.last_login_at = Set(Some(now));
            bounded(self.query_timeout, active.update(&*db)).await?;
        }

        let access_token =
            self.tokens
                .mint_at(user.id, &user.username, &roles, TokenKind::Access, now)?;
        let refresh_token =
            self.tokens
                .mint_at(user.id, &user.username, &roles, TokenKind::Refresh, now)?;

        info!(username = %user.username, ip = %ctx.ip, "login succeeded");
        self.events
            .record_or_warn(NewSecurityEvent {
                kind: EventKind::LoginSuccess,
                details: String::new(),
                user_id: Some(user.id),
                remote_ip: ctx.ip,
                user_agent: ctx.user_agent.clone(),
                severity: Severity::Low,
            })
            .await;

        Ok(LoginTokens {
            access_token,
            refresh_token,
            expires_in_seconds: self.tokens.access_ttl_seconds(),
        })
    }

    pub async fn register(
        &self,
        request: &NewUserRequest,
        ctx: &RequestContext,
    ) -> Result<User::Model, GateRejection> {
        self.register_at(request, ctx, Utc::now()).await
    }

    pub async fn register_at(
        &self,
        request: &NewUserRequest,
        ctx: &RequestContext,
        now: DateTime<Utc>,
    ) -> Result<User::Model, GateRejection> {
        if !self
            .rate_limiter
            .allow_at(RateAction::Register, &request.email, &ctx.ip, now)
            .await?
        {
            self.record_rejection(ctx, EventKind::RateLimitExceeded, Severity::Medium, None)
                .await;
            return Err(GateRejection::RateLimited);
        }
        self.rate_limiter
            .record_at(RateAction::Register, &request.email, &ctx.ip, now)
            .await?;

        let violations = validate_password(
            request.password.expose_secret(),
            self.config.password.min_length,
            Some(&request.username),
            Some(&request.email),
        );
        if !violations.is_empty() {
            self.record_rejection(ctx, EventKind::WeakPassword, Severity::Low, None)
                .await;
            return Err(GateRejection::InvalidInput(
                violations.iter().map(|v| format!("Password {v}")).collect(),
            ));
        }

        let taken = {
            let db = self.db.lock().await;
            bounded(
                self.query_timeout,
                User::Entity::find()
                    .filter(
                        User::Column::Username
                            .eq(&request.username)
                            .or(User::Column::Email.eq(&request.email)),
                    )
                    .one(&*db),
            )
            .await?
        };
        if taken.is_some() {
            self.record_rejection(
                ctx,
                EventKind::DuplicateRegistration,
                Severity::Medium,
                None,
            )
            .await;
            return Err(GateRejection::InvalidInput(vec![
                "Username or email is already registered".to_owned(),
            ]));
        }

        let password_hash = hash_password(request.password.expose_secret())?;

        // User, default role assignment and the first password-history
        // row commit together or not at all.
        let created = {
            let db = self.db.lock().await;
            let username = request.username.clone();
            let email = request.email.clone();
            bounded(
                self.query_timeout,
                db.transaction::<_, User::Model, PalisadeError>(move |txn| {
                    Box::pin(async move {
                        let user = User::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            username: Set(username),
                            email: Set(email),
                            password_hash: Set(password_hash.clone()),
                            is_active: Set(true),
                            password_updated_at: Set(now),
                            last_login_at: Set(None),
                            created_at: Set(now),
                        }
                        .insert(txn)
                        .await?;

                        let role = Role::Entity::find()
                            .filter(Role::Column::Name.eq(BUILTIN_USER_ROLE_NAME))
                            .one(txn)
                            .await?
                            .ok_or_else(|| {
                                PalisadeError::RoleNotFound(BUILTIN_USER_ROLE_NAME.to_owned())
                            })?;
                        UserRoleAssignment::ActiveModel {
                            user_id: Set(user.id),
                            role_id: Set(role.id),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await?;

                        PasswordHistory::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            user_id: Set(user.id),
                            password_hash: Set(password_hash),
                            created_at: Set(now),
                        }
                        .insert(txn)
                        .await?;

                        Ok(user)
                    })
                }),
            )
            .await
        };

        let user = match created {
            Ok(user) => user,
            Err(e) => {
                error!(username = %request.username, error = %e, "registration failed");
                self.record_rejection(ctx, EventKind::RegistrationError, Severity::High, None)
                    .await;
                return Err(GateRejection::Internal(e));
            }
        };

        info!(username = %user.username, "user registered");
        self.events
            .record_or_warn(NewSecurityEvent {
                kind: EventKind::RegistrationSuccess,
                details: String::new(),
                user_id: Some(user.id),
                remote_ip: ctx.ip,
                user_agent: ctx.user_agent.clone(),
                severity: Severity::Low,
            })
            .await;

        Ok(user)
    }

    /// Exchange a still-valid refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<LoginTokens, GateRejection> {
        self.refresh_at(refresh_token, Utc::now()).await
    }

    pub async fn refresh_at(
        &self,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> Result<LoginTokens, GateRejection> {
        let claims = self
            .tokens
            .verify(refresh_token, TokenKind::Refresh)
            .ok_or(GateRejection::Unauthenticated)?;

        let user = self
            .find_user_by_id(claims.sub)
            .await?
            .filter(|u| u.is_active)
            .ok_or(GateRejection::Unauthenticated)?;

        let roles = {
            let db = self.db.lock().await;
            bounded(self.query_timeout, user.role_names(&*db)).await?
        };

        let access_token =
            self.tokens
                .mint_at(user.id, &user.username, &roles, TokenKind::Access, now)?;
        Ok(LoginTokens {
            access_token,
            refresh_token: Secret::new(refresh_token.to_owned()),
            expires_in_seconds: self.tokens.access_ttl_seconds(),
        })
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User::Model>, PalisadeError> {
        let db = self.db.lock().await;
        bounded(self.query_timeout, User::Entity::find_by_id(id).one(&*db)).await
    }

    async fn find_user_by_name_or_email(
        &self,
        username_or_email: &str,
    ) -> Result<Option<User::Model>, PalisadeError> {
        let db = self.db.lock().await;
        bounded(
            self.query_timeout,
            User::Entity::find()
                .filter(
                    User::Column::Username
                        .eq(username_or_email)
                        .or(User::Column::Email.eq(username_or_email)),
                )
                .one(&*db),
        )
        .await
    }

    async fn record_rejection(
        &self,
        ctx: &RequestContext,
        kind: EventKind,
        severity: Severity,
        user_id: Option<Uuid>,
    ) {
        self.events
            .record_or_warn(NewSecurityEvent {
                kind,
                details: String::new(),
                user_id,
                remote_ip: ctx.ip,
                user_agent: ctx.user_agent.clone(),
                severity,
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use palisade_common::helpers::hash::verify_password_hash;

    use super::UNKNOWN_USER_HASH;

    // The decoy must stay parseable: a parse error would surface as a
    // 500 on every unknown-username login.
    #[test]
    fn unknown_user_hash_parses_and_never_verifies() {
        assert!(!verify_password_hash("Correct-Horse-17", UNKNOWN_USER_HASH).unwrap());
        assert!(!verify_password_hash("", UNKNOWN_USER_HASH).unwrap());
    }
}
