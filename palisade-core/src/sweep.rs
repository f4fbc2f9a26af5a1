use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tokio::sync::Mutex;
use tracing::info;
use palisade_common::{PalisadeError, RateLimitConfig};
use palisade_db_entities::{BlockedIp, RateLimitAttempt, SecurityEvent};

use crate::helpers::bounded;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupStats {
    pub expired_blocks: u64,
    pub stale_rate_attempts: u64,
    pub aged_out_events: u64,
}

/// One retention pass. Deletes only rows no read path can see anymore:
/// blocks past expiry, rate attempts outside every window, events past
/// retention. Safe to run under live traffic.
pub async fn cleanup_expired_at(
    db: &Arc<Mutex<DatabaseConnection>>,
    rate_limits: &RateLimitConfig,
    retention_days: u32,
    query_timeout: Duration,
    now: DateTime<Utc>,
) -> Result<CleanupStats, PalisadeError> {
    let db = db.lock().await;

    let expired_blocks = bounded(
        query_timeout,
        BlockedIp::Entity::delete_many()
            .filter(BlockedIp::Column::BlockedUntil.lte(now))
            .exec(&*db),
    )
    .await?
    .rows_affected;

    let rate_cutoff = now
        - chrono::Duration::from_std(rate_limits.longest_window())
            .unwrap_or(chrono::Duration::hours(1));
    let stale_rate_attempts = bounded(
        query_timeout,
        RateLimitAttempt::Entity::delete_many()
            .filter(RateLimitAttempt::Column::Timestamp.lt(rate_cutoff))
            .exec(&*db),
    )
    .await?
    .rows_affected;

    let event_cutoff = now - chrono::Duration::days(retention_days as i64);
    let aged_out_events = bounded(
        query_timeout,
        SecurityEvent::Entity::delete_many()
            .filter(SecurityEvent::Column::Timestamp.lt(event_cutoff))
            .exec(&*db),
    )
    .await?
    .rows_affected;

    let stats = CleanupStats {
        expired_blocks,
        stale_rate_attempts,
        aged_out_events,
    };
    if stats != CleanupStats::default() {
        info!(
            blocks = stats.expired_blocks,
            rate_attempts = stats.stale_rate_attempts,
            events = stats.aged_out_events,
            "retention sweep removed rows"
        );
    }
    Ok(stats)
}
