use poem::session::Session;
use poem::Request;
use palisade_common::resolve_client_ip;
use palisade_core::{CsrfState, RequestContext};

pub static SESSION_COOKIE_NAME: &str = "palisade-session";
static CSRF_SESSION_KEY: &str = "csrf";

pub trait SessionExt {
    fn get_csrf_state(&self) -> CsrfState;
    fn set_csrf_state(&self, state: &CsrfState);
}

impl SessionExt for Session {
    fn get_csrf_state(&self) -> CsrfState {
        self.get(CSRF_SESSION_KEY).unwrap_or_default()
    }

    fn set_csrf_state(&self, state: &CsrfState) {
        self.set(CSRF_SESSION_KEY, state);
    }
}

/// The resolved client address and user agent for one request. `None`
/// when neither a trusted header nor the socket peer yields an address.
pub fn request_context(req: &Request) -> Option<RequestContext> {
    let peer = req.remote_addr().as_socket_addr().map(|a| a.ip());
    let ip = resolve_client_ip(req.headers(), peer)?;
    let user_agent = req
        .headers()
        .get(http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_owned();
    Some(RequestContext::anonymous(ip, user_agent))
}
