use crate::Secret;

pub(crate) const fn _default_true() -> bool {
    true
}

#[inline]
pub(crate) fn _default_database_url() -> Secret<String> {
    Secret::new("sqlite:data/db".to_owned())
}

#[inline]
pub(crate) fn _default_http_listen() -> String {
    "0.0.0.0:8787".to_owned()
}

#[inline]
pub(crate) fn _default_uploads_dir() -> String {
    "./data/uploads".to_owned()
}

pub(crate) const fn _default_query_timeout_seconds() -> u64 {
    5
}

pub(crate) const fn _default_retention_days() -> u32 {
    30
}

pub(crate) const fn _default_csrf_ttl_seconds() -> u64 {
    3600
}

pub(crate) const fn _default_access_ttl_seconds() -> u64 {
    60 * 15
}

pub(crate) const fn _default_refresh_ttl_seconds() -> u64 {
    60 * 60 * 24 * 7
}

pub(crate) const fn _default_max_upload_bytes() -> u64 {
    5 * 1024 * 1024
}

pub(crate) const fn _default_request_flood_threshold() -> u64 {
    50
}

pub(crate) const fn _default_request_flood_window_seconds() -> u64 {
    60
}

pub(crate) const fn _default_failed_login_threshold() -> u64 {
    10
}

pub(crate) const fn _default_failed_login_window_seconds() -> u64 {
    300
}

pub(crate) const fn _default_auto_block_duration_seconds() -> u64 {
    3600
}
