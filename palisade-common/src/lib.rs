pub mod consts;
mod error;
pub use error::PalisadeError;
mod config;
pub use config::*;
mod data;
pub use data::{EventKind, RateAction, Severity};
mod types;
pub use types::*;
mod client_ip;
pub use client_ip::{resolve_client_ip, TRUSTED_IP_HEADERS};
pub mod helpers;
mod password_policy;
pub use password_policy::{validate_password, PasswordViolation};
