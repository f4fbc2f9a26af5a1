use poem::session::Session;
use poem_openapi::payload::Json;
use poem_openapi::{Object, OpenApi};

use crate::common::SessionExt;

pub struct Api;

#[derive(Object)]
struct CsrfTokenResponse {
    csrf_token: String,
}

#[OpenApi]
impl Api {
    /// Issues a fresh anti-forgery token bound to the session. Any
    /// previously issued token stops verifying.
    #[oai(path = "/csrf-token", method = "get", operation_id = "get_csrf_token")]
    async fn get_csrf_token(&self, session: &Session) -> poem::Result<Json<CsrfTokenResponse>> {
        let mut state = session.get_csrf_state();
        let token = state.issue();
        session.set_csrf_state(&state);
        Ok(Json(CsrfTokenResponse {
            csrf_token: token.expose_secret().clone(),
        }))
    }
}
