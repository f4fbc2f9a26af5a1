use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "rate_limit_attempts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Rate-limit key for the principal: bearer-token subject, or the
    /// client IP when no principal exists yet
    pub identifier: String,

    /// Client IP the attempt came from
    pub remote_ip: String,

    /// Action name: "login", "register", "api_call", ...
    pub action: String,

    /// When the attempt occurred
    pub timestamp: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
