use std::net::ToSocketAddrs;

use anyhow::Result;
use tracing::*;
use palisade_common::PalisadeConfig;
use palisade_core::Services;
use palisade_protocol_http::HttpGateServer;

pub(crate) async fn command() -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    info!(%version, "Palisade");

    let config = PalisadeConfig::from_env()?;
    let services = Services::new(config.clone()).await?;
    services.start_retention_sweep();

    let address = config
        .http
        .listen
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| anyhow::anyhow!("failed to resolve the listen address"))?;

    let server = HttpGateServer::new(&services).run(address);
    tokio::select! {
        result = server => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    }
}
