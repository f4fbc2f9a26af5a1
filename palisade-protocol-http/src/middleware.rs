use std::time::Duration;

use http::{Method, StatusCode};
use poem::session::Session;
use poem::web::FromRequest;
use poem::{Endpoint, IntoResponse, Middleware, Request, Response};
use serde::Deserialize;
use palisade_common::consts::{CSRF_FORM_FIELD, CSRF_HEADER_NAME};
use palisade_core::{CsrfCheck, EndpointRequirements, Services};

use crate::common::{request_context, SessionExt};
use crate::error::rejection_response;

/// Runs the full authorization procedure in front of the wrapped
/// endpoint. On success the verified user is available to handlers via
/// `Request::extensions` as an `AuthorizedUser`.
pub struct GateMiddleware {
    required_roles: Vec<String>,
}

impl GateMiddleware {
    pub fn new() -> Self {
        Self {
            required_roles: vec![],
        }
    }

    pub fn requiring_roles<I: IntoIterator<Item = S>, S: Into<String>>(roles: I) -> Self {
        Self {
            required_roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for GateMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

pub struct GateMiddlewareEndpoint<E: Endpoint> {
    inner: E,
    required_roles: Vec<String>,
}

impl<E: Endpoint> Middleware<E> for GateMiddleware {
    type Output = GateMiddlewareEndpoint<E>;

    fn transform(&self, inner: E) -> Self::Output {
        GateMiddlewareEndpoint {
            inner,
            required_roles: self.required_roles.clone(),
        }
    }
}

#[derive(Deserialize)]
struct TokenQueryParams {
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct TokenBodyParams {
    access_token: Option<String>,
}

fn is_state_changing(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn bearer_from_headers(req: &Request) -> Option<String> {
    for value in req.headers().get_all(http::header::AUTHORIZATION) {
        let value = value.to_str().unwrap_or("");
        if let Some((scheme, token)) = value.split_once(' ') {
            if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
                return Some(token.to_owned());
            }
        }
    }
    None
}

impl<E: Endpoint> Endpoint for GateMiddlewareEndpoint<E> {
    type Output = Response;

    async fn call(&self, mut req: Request) -> poem::Result<Self::Output> {
        let session: &Session = <&Session>::from_request_without_body(&req).await?;
        let session = session.clone();
        let services = req
            .data::<Services>()
            .cloned()
            .ok_or_else(|| poem::Error::from_status(StatusCode::INTERNAL_SERVER_ERROR))?;

        let Some(ctx) = request_context(&req) else {
            return Err(poem::Error::from_string(
                "could not determine client address",
                StatusCode::BAD_REQUEST,
            ));
        };

        let mut bearer = bearer_from_headers(&req);
        if bearer.is_none() {
            let query = req.uri().query().unwrap_or("");
            bearer = serde_urlencoded::from_str::<TokenQueryParams>(query)
                .ok()
                .and_then(|p| p.access_token);
        }

        // The fallbacks below need the body; it is restored untouched for
        // the inner endpoint.
        let state_changing = is_state_changing(req.method());
        let content_type = req.content_type().unwrap_or("").to_owned();
        let mut form_fields: Vec<(String, String)> = vec![];
        if state_changing || bearer.is_none() {
            let bytes = req
                .take_body()
                .into_bytes()
                .await
                .map_err(|_| poem::Error::from_status(StatusCode::BAD_REQUEST))?;
            if content_type.starts_with("application/x-www-form-urlencoded") {
                form_fields = serde_urlencoded::from_bytes(&bytes).unwrap_or_default();
            } else if content_type.starts_with("application/json") {
                if bearer.is_none() {
                    if let Ok(body) = serde_json::from_slice::<TokenBodyParams>(&bytes) {
                        bearer = body.access_token;
                    }
                }
            }
            req.set_body(bytes);
        }

        let csrf = if !state_changing {
            CsrfCheck::NotRequired
        } else {
            let candidate = req
                .headers()
                .get(CSRF_HEADER_NAME)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
                .or_else(|| {
                    form_fields
                        .iter()
                        .find(|(name, _)| name == CSRF_FORM_FIELD)
                        .map(|(_, value)| value.clone())
                });
            match candidate {
                None => CsrfCheck::Failed,
                Some(candidate) => {
                    let ttl = Duration::from_secs(services.config.csrf.token_ttl_seconds);
                    let mut state = session.get_csrf_state();
                    let verified = state.verify(&candidate, ttl);
                    session.set_csrf_state(&state);
                    if verified {
                        CsrfCheck::Verified
                    } else {
                        CsrfCheck::Failed
                    }
                }
            }
        };

        let requirements = EndpointRequirements {
            required_roles: self.required_roles.clone(),
            csrf,
        };

        match services
            .gate
            .authorize_request(&ctx, &requirements, bearer.as_deref())
            .await
        {
            Ok(authorized) => {
                req.extensions_mut().insert(authorized);
                self.inner
                    .call(req)
                    .await
                    .map(IntoResponse::into_response)
            }
            Err(rejection) => Ok(rejection_response(rejection)),
        }
    }
}
