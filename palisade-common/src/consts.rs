pub const BUILTIN_ADMIN_ROLE_NAME: &str = "admin";
pub const BUILTIN_USER_ROLE_NAME: &str = "user";

pub const CSRF_HEADER_NAME: &str = "x-csrf-token";
pub const CSRF_FORM_FIELD: &str = "csrf_token";
