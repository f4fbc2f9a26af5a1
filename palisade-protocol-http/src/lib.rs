mod api;
mod common;
mod error;
mod middleware;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use poem::listener::TcpListener;
use poem::session::{CookieConfig, MemoryStorage, ServerSession};
use poem::{EndpointExt, Route, Server};
use poem_openapi::OpenApiService;
use tracing::*;
use palisade_core::Services;

pub use crate::common::SessionExt;
pub use crate::middleware::GateMiddleware;

#[derive(Clone)]
pub struct HttpGateServer {
    services: Services,
}

impl HttpGateServer {
    pub fn new(services: &Services) -> Self {
        Self {
            services: services.clone(),
        }
    }

    pub async fn run(self, address: SocketAddr) -> Result<()> {
        let version = env!("CARGO_PKG_VERSION");

        let public_api = OpenApiService::new(
            (api::auth::Api, api::csrf::Api),
            "Palisade",
            version,
        )
        .server("/api");

        let upload_api = OpenApiService::new(api::upload::Api, "Palisade uploads", version)
            .server("/api/upload");

        let app = Route::new()
            .nest("/api", public_api)
            .nest(
                "/api/upload",
                upload_api.with(GateMiddleware::new()),
            )
            .with(ServerSession::new(
                CookieConfig::default().name(common::SESSION_COOKIE_NAME),
                MemoryStorage::new(),
            ))
            .data(self.services);

        info!(?address, "Listening");
        Server::new(TcpListener::bind(address))
            .run(app)
            .await
            .context("HTTP server failed")
    }
}
