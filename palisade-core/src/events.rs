use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};
use tokio::sync::Mutex;
use tracing::{error, warn};
use uuid::Uuid;
use palisade_common::{EventKind, PalisadeError, Severity};
use palisade_db_entities::SecurityEvent;

use crate::helpers::bounded;

#[derive(Clone, Debug)]
pub struct NewSecurityEvent {
    pub kind: EventKind,
    pub details: String,
    pub user_id: Option<Uuid>,
    pub remote_ip: IpAddr,
    pub user_agent: String,
    pub severity: Severity,
}

/// Durable append-only ledger of security-relevant events. High and
/// critical severities additionally raise an operational alert.
#[derive(Clone)]
pub struct SecurityEventLog {
    db: Arc<Mutex<DatabaseConnection>>,
    query_timeout: Duration,
}

impl SecurityEventLog {
    pub fn new(db: Arc<Mutex<DatabaseConnection>>, query_timeout: Duration) -> Self {
        Self { db, query_timeout }
    }

    pub async fn record(&self, event: NewSecurityEvent) -> Result<(), PalisadeError> {
        self.record_at(event, Utc::now()).await
    }

    pub async fn record_at(
        &self,
        event: NewSecurityEvent,
        now: DateTime<Utc>,
    ) -> Result<(), PalisadeError> {
        if event.severity >= Severity::High {
            warn!(
                event = %event.kind,
                ip = %event.remote_ip,
                severity = %event.severity,
                details = %event.details,
                "security alert"
            );
        }

        let db = self.db.lock().await;
        let record = SecurityEvent::ActiveModel {
            id: Set(Uuid::new_v4()),
            event: Set(event.kind.as_str().to_owned()),
            details: Set(event.details),
            user_id: Set(event.user_id),
            remote_ip: Set(event.remote_ip.to_string()),
            user_agent: Set(event.user_agent),
            severity: Set(event.severity.as_str().to_owned()),
            timestamp: Set(now),
        };
        bounded(self.query_timeout, record.insert(&*db)).await?;
        Ok(())
    }

    /// Record an event on a rejection path. The rejection must still be
    /// returned even if the ledger itself is unreachable, so failures go
    /// to the operational log instead of propagating.
    pub async fn record_or_warn(&self, event: NewSecurityEvent) {
        let kind = event.kind;
        if let Err(e) = self.record(event).await {
            error!(event = %kind, error = %e, "failed to write security event");
        }
    }

    /// Events from one IP since the cutoff, any kind.
    pub async fn count_for_ip_since(
        &self,
        ip: &IpAddr,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, PalisadeError> {
        let db = self.db.lock().await;
        bounded(
            self.query_timeout,
            SecurityEvent::Entity::find()
                .filter(SecurityEvent::Column::RemoteIp.eq(ip.to_string()))
                .filter(SecurityEvent::Column::Timestamp.gte(cutoff))
                .count(&*db),
        )
        .await
    }

    /// Events of one kind from one IP since the cutoff.
    pub async fn count_kind_for_ip_since(
        &self,
        ip: &IpAddr,
        kind: EventKind,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, PalisadeError> {
        let db = self.db.lock().await;
        bounded(
            self.query_timeout,
            SecurityEvent::Entity::find()
                .filter(SecurityEvent::Column::RemoteIp.eq(ip.to_string()))
                .filter(SecurityEvent::Column::Event.eq(kind.as_str()))
                .filter(SecurityEvent::Column::Timestamp.gte(cutoff))
                .count(&*db),
        )
        .await
    }
}
