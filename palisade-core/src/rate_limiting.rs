use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;
use palisade_common::{PalisadeError, RateAction, RateLimitConfig};
use palisade_db_entities::RateLimitAttempt;

use crate::helpers::bounded;

/// Sliding-window limiter over durable per-attempt rows. Counting and
/// recording are separate statements, so two concurrent requests can both
/// pass `allow` before either records; the limit is approximate by a
/// small bounded amount under heavy concurrency.
#[derive(Clone)]
pub struct RateLimiter {
    db: Arc<Mutex<DatabaseConnection>>,
    config: RateLimitConfig,
    query_timeout: Duration,
}

impl RateLimiter {
    pub fn new(
        db: Arc<Mutex<DatabaseConnection>>,
        config: RateLimitConfig,
        query_timeout: Duration,
    ) -> Self {
        Self {
            db,
            config,
            query_timeout,
        }
    }

    pub async fn allow(
        &self,
        action: RateAction,
        identifier: &str,
        ip: &IpAddr,
    ) -> Result<bool, PalisadeError> {
        self.allow_at(action, identifier, ip, Utc::now()).await
    }

    /// True only if BOTH the per-IP and per-identifier counts are
    /// strictly below the action's maximum within its window.
    pub async fn allow_at(
        &self,
        action: RateAction,
        identifier: &str,
        ip: &IpAddr,
        now: DateTime<Utc>,
    ) -> Result<bool, PalisadeError> {
        let quota = self.config.quota(action);
        let cutoff = now - chrono::Duration::seconds(quota.window_seconds as i64);
        let max = quota.max_attempts as u64;

        let db = self.db.lock().await;

        let ip_count: u64 = bounded(
            self.query_timeout,
            RateLimitAttempt::Entity::find()
                .filter(RateLimitAttempt::Column::RemoteIp.eq(ip.to_string()))
                .filter(RateLimitAttempt::Column::Action.eq(action.as_str()))
                .filter(RateLimitAttempt::Column::Timestamp.gte(cutoff))
                .count(&*db),
        )
        .await?;
        if ip_count >= max {
            debug!(action = %action, ip = %ip, count = ip_count, "IP rate limit reached");
            return Ok(false);
        }

        let identifier_count: u64 = bounded(
            self.query_timeout,
            RateLimitAttempt::Entity::find()
                .filter(RateLimitAttempt::Column::Identifier.eq(identifier))
                .filter(RateLimitAttempt::Column::Action.eq(action.as_str()))
                .filter(RateLimitAttempt::Column::Timestamp.gte(cutoff))
                .count(&*db),
        )
        .await?;
        if identifier_count >= max {
            debug!(
                action = %action,
                identifier = identifier,
                count = identifier_count,
                "identifier rate limit reached"
            );
            return Ok(false);
        }

        Ok(true)
    }

    pub async fn record(
        &self,
        action: RateAction,
        identifier: &str,
        ip: &IpAddr,
    ) -> Result<(), PalisadeError> {
        self.record_at(action, identifier, ip, Utc::now()).await
    }

    /// One row per attempt; rows are never mutated, only inserted here
    /// and eventually pruned by the retention sweep.
    pub async fn record_at(
        &self,
        action: RateAction,
        identifier: &str,
        ip: &IpAddr,
        now: DateTime<Utc>,
    ) -> Result<(), PalisadeError> {
        let db = self.db.lock().await;
        let record = RateLimitAttempt::ActiveModel {
            id: Set(Uuid::new_v4()),
            identifier: Set(identifier.to_owned()),
            remote_ip: Set(ip.to_string()),
            action: Set(action.as_str().to_owned()),
            timestamp: Set(now),
        };
        bounded(self.query_timeout, record.insert(&*db)).await?;
        Ok(())
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }
}
