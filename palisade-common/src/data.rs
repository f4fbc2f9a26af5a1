use serde::{Deserialize, Serialize};

/// Closed set of rate-limited operations. New actions must be added here
/// and given a quota in every profile; there is no default bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateAction {
    Login,
    Register,
    OtpRequest,
    ApiCall,
    PasswordReset,
    FileUpload,
}

impl RateAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Register => "register",
            Self::OtpRequest => "otp_request",
            Self::ApiCall => "api_call",
            Self::PasswordReset => "password_reset",
            Self::FileUpload => "file_upload",
        }
    }

    pub fn all() -> [RateAction; 6] {
        [
            Self::Login,
            Self::Register,
            Self::OtpRequest,
            Self::ApiCall,
            Self::PasswordReset,
            Self::FileUpload,
        ]
    }
}

impl std::fmt::Display for RateAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event severity, ordered: low < medium < high < critical.
/// High and critical trigger an operational alert when recorded.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Security events written by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ApiAccess,
    LoginSuccess,
    LoginFailed,
    LoginInactive,
    PasswordExpired,
    RateLimitExceeded,
    UnauthorizedAccess,
    SuspiciousActivity,
    IpBlocked,
    BlockedAccess,
    InvalidToken,
    CsrfFailure,
    WeakPassword,
    DuplicateRegistration,
    RegistrationError,
    RegistrationSuccess,
    UploadRejected,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiAccess => "api_access",
            Self::LoginSuccess => "login_success",
            Self::LoginFailed => "login_failed",
            Self::LoginInactive => "login_inactive",
            Self::PasswordExpired => "password_expired",
            Self::RateLimitExceeded => "rate_limit_exceeded",
            Self::UnauthorizedAccess => "unauthorized_access",
            Self::SuspiciousActivity => "suspicious_activity",
            Self::IpBlocked => "ip_blocked",
            Self::BlockedAccess => "blocked_access",
            Self::InvalidToken => "invalid_token",
            Self::CsrfFailure => "csrf_failure",
            Self::WeakPassword => "weak_password",
            Self::DuplicateRegistration => "duplicate_registration",
            Self::RegistrationError => "registration_error",
            Self::RegistrationSuccess => "registration_success",
            Self::UploadRejected => "upload_rejected",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
