use std::net::IpAddr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;
use palisade_common::{DetectionConfig, EventKind, PalisadeError, Severity};

use crate::blocklist::IpBlocklist;
use crate::events::{NewSecurityEvent, SecurityEventLog};

/// Coarse, count-based anomaly heuristics over the event ledger.
/// Deliberately not adaptive: fixed windows keep the checks auditable
/// and O(1) per request.
#[derive(Clone)]
pub struct SuspiciousActivityDetector {
    events: SecurityEventLog,
    blocklist: IpBlocklist,
    config: DetectionConfig,
}

impl SuspiciousActivityDetector {
    pub fn new(
        events: SecurityEventLog,
        blocklist: IpBlocklist,
        config: DetectionConfig,
    ) -> Self {
        Self {
            events,
            blocklist,
            config,
        }
    }

    pub async fn detect(
        &self,
        ip: &IpAddr,
        user_id: Option<Uuid>,
    ) -> Result<bool, PalisadeError> {
        self.detect_at(ip, user_id, Utc::now()).await
    }

    pub async fn detect_at(
        &self,
        ip: &IpAddr,
        user_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<bool, PalisadeError> {
        let flood_cutoff =
            now - chrono::Duration::seconds(self.config.request_flood_window_seconds as i64);
        let request_count = self.events.count_for_ip_since(ip, flood_cutoff).await?;
        if request_count > self.config.request_flood_threshold {
            self.flag(
                ip,
                user_id,
                format!(
                    "{request_count} events in {}s",
                    self.config.request_flood_window_seconds
                ),
                now,
            )
            .await?;
            return Ok(true);
        }

        let login_cutoff =
            now - chrono::Duration::seconds(self.config.failed_login_window_seconds as i64);
        let failed_logins = self
            .events
            .count_kind_for_ip_since(ip, EventKind::LoginFailed, login_cutoff)
            .await?;
        if failed_logins > self.config.failed_login_threshold {
            self.flag(
                ip,
                user_id,
                format!(
                    "{failed_logins} failed logins in {}s",
                    self.config.failed_login_window_seconds
                ),
                now,
            )
            .await?;
            return Ok(true);
        }

        Ok(false)
    }

    async fn flag(
        &self,
        ip: &IpAddr,
        user_id: Option<Uuid>,
        details: String,
        now: DateTime<Utc>,
    ) -> Result<(), PalisadeError> {
        warn!(ip = %ip, details = %details, "suspicious activity detected");
        self.events
            .record_at(
                NewSecurityEvent {
                    kind: EventKind::SuspiciousActivity,
                    details: details.clone(),
                    user_id,
                    remote_ip: *ip,
                    user_agent: String::new(),
                    severity: Severity::High,
                },
                now,
            )
            .await?;

        if self.config.auto_block {
            self.blocklist
                .block_at(
                    ip,
                    Duration::from_secs(self.config.auto_block_duration_seconds),
                    &format!("suspicious activity: {details}"),
                    now,
                )
                .await?;
        }
        Ok(())
    }
}
