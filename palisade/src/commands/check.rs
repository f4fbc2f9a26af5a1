use anyhow::Result;
use tracing::*;
use palisade_common::PalisadeConfig;
use palisade_core::db::connect_to_db;

pub(crate) async fn command() -> Result<()> {
    let config = PalisadeConfig::from_env()?;
    connect_to_db(&config).await?;
    info!("No problems found");
    Ok(())
}
