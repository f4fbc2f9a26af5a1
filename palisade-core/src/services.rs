use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sea_orm::DatabaseConnection;
use tokio::sync::Mutex;
use tracing::error;
use palisade_common::{PalisadeConfig, PalisadeError};

use crate::db::{connect_to_db, populate_db};
use crate::gate::SecurityGate;
use crate::sweep::cleanup_expired_at;
use crate::upload::FileUploadValidator;

const SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 3600);

/// Everything a request handler needs, built once at startup and cloned
/// into handlers. No globals.
#[derive(Clone)]
pub struct Services {
    pub db: Arc<Mutex<DatabaseConnection>>,
    pub config: PalisadeConfig,
    pub gate: SecurityGate,
    pub upload_validator: FileUploadValidator,
}

impl Services {
    pub async fn new(config: PalisadeConfig) -> Result<Self, PalisadeError> {
        let db = connect_to_db(&config).await?;
        populate_db(&db).await?;
        let db = Arc::new(Mutex::new(db));

        let gate = SecurityGate::new(db.clone(), config.clone());
        let upload_validator = FileUploadValidator::new(config.uploads.clone());

        Ok(Self {
            db,
            config,
            gate,
            upload_validator,
        })
    }

    /// Daily retention sweep. Failures are logged and the loop keeps
    /// going; stale rows only delay deletion, they never affect
    /// correctness of the read paths.
    pub fn start_retention_sweep(&self) {
        let db = self.db.clone();
        let rate_limits = self.config.rate_limits.clone();
        let retention_days = self.config.store.retention_days;
        let query_timeout = self.config.query_timeout();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Err(e) = cleanup_expired_at(
                    &db,
                    &rate_limits,
                    retention_days,
                    query_timeout,
                    Utc::now(),
                )
                .await
                {
                    error!(error = %e, "retention sweep failed");
                }
            }
        });
    }
}
