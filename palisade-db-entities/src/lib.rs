#![allow(non_snake_case)]

pub mod BlockedIp;
pub mod PasswordHistory;
pub mod RateLimitAttempt;
pub mod Role;
pub mod SecurityEvent;
pub mod User;
pub mod UserRoleAssignment;
