use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, Set,
};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;
use palisade_common::{EventKind, PalisadeError, Severity};
use palisade_db_entities::BlockedIp;

use crate::events::{NewSecurityEvent, SecurityEventLog};
use crate::helpers::bounded;

/// Durable set of temporarily blocked IPs. A row whose `blocked_until`
/// has passed is treated as absent; physical removal is left to the
/// retention sweep.
#[derive(Clone)]
pub struct IpBlocklist {
    db: Arc<Mutex<DatabaseConnection>>,
    events: SecurityEventLog,
    query_timeout: Duration,
}

impl IpBlocklist {
    pub fn new(
        db: Arc<Mutex<DatabaseConnection>>,
        events: SecurityEventLog,
        query_timeout: Duration,
    ) -> Self {
        Self {
            db,
            events,
            query_timeout,
        }
    }

    pub async fn is_blocked(&self, ip: &IpAddr) -> Result<bool, PalisadeError> {
        self.is_blocked_at(ip, Utc::now()).await
    }

    pub async fn is_blocked_at(
        &self,
        ip: &IpAddr,
        now: DateTime<Utc>,
    ) -> Result<bool, PalisadeError> {
        let db = self.db.lock().await;
        let count = bounded(
            self.query_timeout,
            BlockedIp::Entity::find()
                .filter(BlockedIp::Column::IpAddress.eq(ip.to_string()))
                .filter(BlockedIp::Column::BlockedUntil.gt(now))
                .count(&*db),
        )
        .await?;
        Ok(count > 0)
    }

    pub async fn block(
        &self,
        ip: &IpAddr,
        duration: Duration,
        reason: &str,
    ) -> Result<(), PalisadeError> {
        self.block_at(ip, duration, reason, Utc::now()).await
    }

    /// Single atomic upsert on the unique IP column: re-blocking an
    /// already-blocked IP replaces the reason and resets the expiry
    /// instead of racing a second row into existence.
    pub async fn block_at(
        &self,
        ip: &IpAddr,
        duration: Duration,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), PalisadeError> {
        let blocked_until = now + chrono::Duration::from_std(duration).unwrap_or_default();

        {
            let db = self.db.lock().await;
            let record = BlockedIp::ActiveModel {
                id: Set(Uuid::new_v4()),
                ip_address: Set(ip.to_string()),
                reason: Set(reason.to_owned()),
                blocked_until: Set(blocked_until),
                created_at: Set(now),
            };
            bounded(
                self.query_timeout,
                BlockedIp::Entity::insert(record)
                    .on_conflict(
                        OnConflict::column(BlockedIp::Column::IpAddress)
                            .update_columns([
                                BlockedIp::Column::Reason,
                                BlockedIp::Column::BlockedUntil,
                            ])
                            .to_owned(),
                    )
                    .exec(&*db),
            )
            .await?;
        }

        info!(ip = %ip, until = %blocked_until, reason = reason, "IP blocked");

        self.events
            .record_at(
                NewSecurityEvent {
                    kind: EventKind::IpBlocked,
                    details: format!("blocked for {}s: {reason}", duration.as_secs()),
                    user_id: None,
                    remote_ip: *ip,
                    user_agent: String::new(),
                    severity: Severity::High,
                },
                now,
            )
            .await?;

        Ok(())
    }

    /// Admin: lift a block early.
    pub async fn unblock(&self, ip: &IpAddr) -> Result<(), PalisadeError> {
        let db = self.db.lock().await;
        bounded(
            self.query_timeout,
            BlockedIp::Entity::delete_many()
                .filter(BlockedIp::Column::IpAddress.eq(ip.to_string()))
                .exec(&*db),
        )
        .await?;
        info!(ip = %ip, "IP unblocked");
        Ok(())
    }

    /// Currently active blocks, for operators.
    pub async fn list_blocked_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<BlockedIp::Model>, PalisadeError> {
        let db = self.db.lock().await;
        bounded(
            self.query_timeout,
            BlockedIp::Entity::find()
                .filter(BlockedIp::Column::BlockedUntil.gt(now))
                .all(&*db),
        )
        .await
    }
}
