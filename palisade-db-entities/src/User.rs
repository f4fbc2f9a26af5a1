use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub username: String,

    #[sea_orm(unique)]
    pub email: String,

    #[serde(skip_serializing)]
    pub password_hash: String,

    pub is_active: bool,

    /// Used for password-age expiry checks at login
    pub password_updated_at: DateTime<Utc>,

    pub last_login_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl Related<super::Role::Entity> for Entity {
    fn to() -> RelationDef {
        super::UserRoleAssignment::Relation::Role.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::UserRoleAssignment::Relation::User.def().rev())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn role_names<C: ConnectionTrait>(
        &self,
        db: &C,
    ) -> Result<Vec<String>, DbErr> {
        Ok(self
            .find_related(super::Role::Entity)
            .all(db)
            .await?
            .into_iter()
            .map(|r| r.name)
            .collect())
    }
}
