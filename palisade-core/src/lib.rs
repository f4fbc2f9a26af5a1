pub mod db;
mod helpers;
mod services;
pub use services::Services;
mod rate_limiting;
pub use rate_limiting::RateLimiter;
mod events;
pub use events::{NewSecurityEvent, SecurityEventLog};
mod blocklist;
pub use blocklist::IpBlocklist;
mod detection;
pub use detection::SuspiciousActivityDetector;
mod csrf;
pub use csrf::CsrfState;
mod tokens;
pub use tokens::{TokenClaims, TokenIssuer, TokenKind};
mod upload;
pub use upload::{extension_of, sniff_mime, FileUpload, FileUploadValidator, UploadViolation};
mod gate;
pub use gate::{
    AuthorizedUser, CsrfCheck, EndpointRequirements, GateRejection, LoginTokens, NewUserRequest,
    RequestContext, SecurityGate,
};
mod sweep;
pub use sweep::{cleanup_expired_at, CleanupStats};
