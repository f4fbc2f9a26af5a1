mod defaults;

use std::time::Duration;

use defaults::*;
use serde::Deserialize;

use crate::{PalisadeError, RateAction, Secret};

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SecurityProfile {
    Strict,
    Relaxed,
}

impl SecurityProfile {
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Strict)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct RateQuota {
    pub max_attempts: u32,
    pub window_seconds: u64,
}

impl RateQuota {
    pub const fn new(max_attempts: u32, window_seconds: u64) -> Self {
        Self {
            max_attempts,
            window_seconds,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

/// Per-action quotas. Defaults per profile are deployment starting points,
/// not load-tested limits; every value is overridable.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub login: RateQuota,
    pub register: RateQuota,
    pub otp_request: RateQuota,
    pub api_call: RateQuota,
    pub password_reset: RateQuota,
    pub file_upload: RateQuota,
}

impl RateLimitConfig {
    pub fn strict() -> Self {
        Self {
            login: RateQuota::new(5, 900),
            register: RateQuota::new(3, 3600),
            otp_request: RateQuota::new(3, 600),
            api_call: RateQuota::new(100, 3600),
            password_reset: RateQuota::new(3, 3600),
            file_upload: RateQuota::new(10, 3600),
        }
    }

    pub fn relaxed() -> Self {
        Self {
            login: RateQuota::new(10, 900),
            register: RateQuota::new(5, 3600),
            otp_request: RateQuota::new(5, 600),
            api_call: RateQuota::new(1000, 3600),
            password_reset: RateQuota::new(5, 3600),
            file_upload: RateQuota::new(50, 3600),
        }
    }

    pub fn quota(&self, action: RateAction) -> RateQuota {
        match action {
            RateAction::Login => self.login,
            RateAction::Register => self.register,
            RateAction::OtpRequest => self.otp_request,
            RateAction::ApiCall => self.api_call,
            RateAction::PasswordReset => self.password_reset,
            RateAction::FileUpload => self.file_upload,
        }
    }

    /// The retention sweep must keep rows at least this long.
    pub fn longest_window(&self) -> Duration {
        RateAction::all()
            .iter()
            .map(|a| self.quota(*a).window())
            .max()
            .unwrap_or(Duration::from_secs(3600))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PasswordPolicyConfig {
    pub min_length: usize,
    /// Logins with a password older than this are rejected.
    pub max_age_days: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "_default_max_upload_bytes")]
    pub max_size_bytes: u64,
    #[serde(default = "_default_true")]
    pub scan_content: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CsrfConfig {
    #[serde(default = "_default_csrf_ttl_seconds")]
    pub token_ttl_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    pub secret: Secret<String>,
    #[serde(default = "_default_access_ttl_seconds")]
    pub access_ttl_seconds: u64,
    #[serde(default = "_default_refresh_ttl_seconds")]
    pub refresh_ttl_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectionConfig {
    #[serde(default = "_default_request_flood_threshold")]
    pub request_flood_threshold: u64,
    #[serde(default = "_default_request_flood_window_seconds")]
    pub request_flood_window_seconds: u64,
    #[serde(default = "_default_failed_login_threshold")]
    pub failed_login_threshold: u64,
    #[serde(default = "_default_failed_login_window_seconds")]
    pub failed_login_window_seconds: u64,
    /// How long an IP tripping the detector stays blocked.
    #[serde(default = "_default_auto_block_duration_seconds")]
    pub auto_block_duration_seconds: u64,
    #[serde(default = "_default_true")]
    pub auto_block: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "_default_database_url")]
    pub database_url: Secret<String>,
    #[serde(default = "_default_query_timeout_seconds")]
    pub query_timeout_seconds: u64,
    #[serde(default = "_default_retention_days")]
    pub retention_days: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "_default_http_listen")]
    pub listen: String,
    #[serde(default = "_default_uploads_dir")]
    pub uploads_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PalisadeConfig {
    pub profile: SecurityProfile,
    pub store: StoreConfig,
    pub http: HttpConfig,
    pub rate_limits: RateLimitConfig,
    pub password: PasswordPolicyConfig,
    pub uploads: UploadConfig,
    pub csrf: CsrfConfig,
    pub jwt: JwtConfig,
    pub detection: DetectionConfig,
}

impl PalisadeConfig {
    /// Profile-dependent defaults with a caller-supplied JWT secret.
    pub fn for_profile(profile: SecurityProfile, jwt_secret: Secret<String>) -> Self {
        let strict = profile.is_strict();
        Self {
            profile,
            store: StoreConfig {
                database_url: _default_database_url(),
                query_timeout_seconds: _default_query_timeout_seconds(),
                retention_days: _default_retention_days(),
            },
            http: HttpConfig {
                listen: _default_http_listen(),
                uploads_dir: _default_uploads_dir(),
            },
            rate_limits: if strict {
                RateLimitConfig::strict()
            } else {
                RateLimitConfig::relaxed()
            },
            password: PasswordPolicyConfig {
                min_length: if strict { 12 } else { 8 },
                max_age_days: if strict { 90 } else { 365 },
            },
            uploads: UploadConfig {
                max_size_bytes: _default_max_upload_bytes(),
                // Content scanning is mandatory in strict mode.
                scan_content: true,
            },
            csrf: CsrfConfig {
                token_ttl_seconds: _default_csrf_ttl_seconds(),
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                access_ttl_seconds: _default_access_ttl_seconds(),
                refresh_ttl_seconds: _default_refresh_ttl_seconds(),
            },
            detection: DetectionConfig {
                request_flood_threshold: _default_request_flood_threshold(),
                request_flood_window_seconds: _default_request_flood_window_seconds(),
                failed_login_threshold: _default_failed_login_threshold(),
                failed_login_window_seconds: _default_failed_login_window_seconds(),
                auto_block_duration_seconds: _default_auto_block_duration_seconds(),
                auto_block: true,
            },
        }
    }

    /// Configuration comes from the environment, not files:
    /// `PALISADE_STRICT` selects the profile, `PALISADE_JWT_SECRET` is
    /// required, the rest override individual defaults.
    pub fn from_env() -> Result<Self, PalisadeError> {
        let strict = std::env::var("PALISADE_STRICT")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let profile = if strict {
            SecurityProfile::Strict
        } else {
            SecurityProfile::Relaxed
        };

        let jwt_secret = std::env::var("PALISADE_JWT_SECRET").map_err(|_| {
            PalisadeError::InvalidConfig("PALISADE_JWT_SECRET is not set".to_owned())
        })?;
        if jwt_secret.len() < 32 {
            return Err(PalisadeError::InvalidConfig(
                "PALISADE_JWT_SECRET must be at least 32 bytes".to_owned(),
            ));
        }

        let mut config = Self::for_profile(profile, Secret::new(jwt_secret));

        if let Ok(url) = std::env::var("PALISADE_DATABASE_URL") {
            config.store.database_url = Secret::new(url);
        }
        if let Ok(listen) = std::env::var("PALISADE_HTTP_LISTEN") {
            config.http.listen = listen;
        }
        if let Ok(dir) = std::env::var("PALISADE_UPLOADS_DIR") {
            config.http.uploads_dir = dir;
        }
        if let Ok(days) = std::env::var("PALISADE_RETENTION_DAYS") {
            config.store.retention_days = days.parse().map_err(|_| {
                PalisadeError::InvalidConfig("PALISADE_RETENTION_DAYS must be a number".to_owned())
            })?;
        }

        Ok(config)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.store.query_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_profile_tightens_quotas() {
        let strict = RateLimitConfig::strict();
        let relaxed = RateLimitConfig::relaxed();
        assert!(strict.login.max_attempts < relaxed.login.max_attempts);
        assert!(strict.api_call.max_attempts < relaxed.api_call.max_attempts);
        assert_eq!(strict.login.window_seconds, relaxed.login.window_seconds);
    }

    #[test]
    fn longest_window_covers_all_actions() {
        let config = RateLimitConfig::strict();
        let longest = config.longest_window();
        for action in RateAction::all() {
            assert!(config.quota(action).window() <= longest);
        }
    }

    #[test]
    fn profile_defaults() {
        let strict =
            PalisadeConfig::for_profile(SecurityProfile::Strict, Secret::new("x".repeat(32)));
        assert_eq!(strict.password.min_length, 12);
        assert!(strict.uploads.scan_content);

        let relaxed =
            PalisadeConfig::for_profile(SecurityProfile::Relaxed, Secret::new("x".repeat(32)));
        assert_eq!(relaxed.password.min_length, 8);
    }
}
