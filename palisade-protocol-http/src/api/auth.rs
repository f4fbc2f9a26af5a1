use poem::session::Session;
use poem::web::Data;
use poem::Request;
use poem_openapi::payload::Json;
use poem_openapi::{Object, OpenApi};
use uuid::Uuid;
use palisade_common::Secret;
use palisade_core::{NewUserRequest, Services};

use crate::common::request_context;
use crate::error::rejection_error;

pub struct Api;

#[derive(Object)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Object)]
struct RegisterRequest {
    username: String,
    email: String,
    password: String,
}

#[derive(Object)]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Object)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    token_type: String,
    expires_in: u64,
}

#[derive(Object)]
struct RegisteredUser {
    id: Uuid,
    username: String,
    email: String,
}

#[derive(Object)]
struct LogoutResponse {
    success: bool,
}

fn context(req: &Request) -> poem::Result<palisade_core::RequestContext> {
    request_context(req).ok_or_else(|| {
        poem::Error::from_string(
            "could not determine client address",
            http::StatusCode::BAD_REQUEST,
        )
    })
}

#[OpenApi]
impl Api {
    #[oai(path = "/auth/login", method = "post", operation_id = "login")]
    async fn login(
        &self,
        req: &Request,
        services: Data<&Services>,
        body: Json<LoginRequest>,
    ) -> poem::Result<Json<TokenResponse>> {
        let ctx = context(req)?;
        let tokens = services
            .gate
            .login(&body.username, &body.password, &ctx)
            .await
            .map_err(rejection_error)?;
        Ok(Json(TokenResponse {
            access_token: tokens.access_token.expose_secret().clone(),
            refresh_token: tokens.refresh_token.expose_secret().clone(),
            token_type: "bearer".to_owned(),
            expires_in: tokens.expires_in_seconds,
        }))
    }

    #[oai(path = "/auth/logout", method = "post", operation_id = "logout")]
    async fn logout(&self, session: &Session) -> poem::Result<Json<LogoutResponse>> {
        session.clear();
        Ok(Json(LogoutResponse { success: true }))
    }

    #[oai(path = "/auth/register", method = "post", operation_id = "register")]
    async fn register(
        &self,
        req: &Request,
        services: Data<&Services>,
        body: Json<RegisterRequest>,
    ) -> poem::Result<Json<RegisteredUser>> {
        let ctx = context(req)?;
        let user = services
            .gate
            .register(
                &NewUserRequest {
                    username: body.username.clone(),
                    email: body.email.clone(),
                    password: Secret::new(body.password.clone()),
                },
                &ctx,
            )
            .await
            .map_err(rejection_error)?;
        Ok(Json(RegisteredUser {
            id: user.id,
            username: user.username,
            email: user.email,
        }))
    }

    #[oai(path = "/auth/refresh", method = "post", operation_id = "refresh")]
    async fn refresh(
        &self,
        services: Data<&Services>,
        body: Json<RefreshRequest>,
    ) -> poem::Result<Json<TokenResponse>> {
        let tokens = services
            .gate
            .refresh(&body.refresh_token)
            .await
            .map_err(rejection_error)?;
        Ok(Json(TokenResponse {
            access_token: tokens.access_token.expose_secret().clone(),
            refresh_token: tokens.refresh_token.expose_secret().clone(),
            token_type: "bearer".to_owned(),
            expires_in: tokens.expires_in_seconds,
        }))
    }
}
