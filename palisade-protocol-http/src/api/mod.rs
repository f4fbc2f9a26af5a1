pub mod auth;
pub mod csrf;
pub mod upload;
