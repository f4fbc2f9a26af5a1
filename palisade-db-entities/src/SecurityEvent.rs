use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::Serialize;
use uuid::Uuid;

/// Append-only security ledger. Rows are never updated; the retention
/// sweep is the only deleter.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "security_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Event kind: "login_failed", "api_access", ...
    pub event: String,

    #[sea_orm(column_type = "Text")]
    pub details: String,

    pub user_id: Option<Uuid>,

    pub remote_ip: String,

    pub user_agent: String,

    /// "low", "medium", "high" or "critical"
    pub severity: String,

    pub timestamp: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
