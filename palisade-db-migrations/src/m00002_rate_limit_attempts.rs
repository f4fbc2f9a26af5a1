use sea_orm::Schema;
use sea_orm_migration::prelude::*;

pub mod rate_limit_attempt {
    use chrono::{DateTime, Utc};
    use sea_orm::entity::prelude::*;
    use uuid::Uuid;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "rate_limit_attempts")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        pub identifier: String,
        pub remote_ip: String,
        pub action: String,
        pub timestamp: DateTime<Utc>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m00002_rate_limit_attempts"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let builder = manager.get_database_backend();
        let schema = Schema::new(builder);

        manager
            .create_table(schema.create_table_from_entity(rate_limit_attempt::Entity))
            .await?;

        // Composite index for "attempts from IP for action in window"
        manager
            .create_index(
                Index::create()
                    .table(rate_limit_attempt::Entity)
                    .name("idx_rate_limit_attempts_ip_action_timestamp")
                    .col(Alias::new("remote_ip"))
                    .col(Alias::new("action"))
                    .col(Alias::new("timestamp"))
                    .to_owned(),
            )
            .await?;

        // Composite index for "attempts by identifier for action in window"
        manager
            .create_index(
                Index::create()
                    .table(rate_limit_attempt::Entity)
                    .name("idx_rate_limit_attempts_identifier_action_timestamp")
                    .col(Alias::new("identifier"))
                    .col(Alias::new("action"))
                    .col(Alias::new("timestamp"))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .table(rate_limit_attempt::Entity)
                    .name("idx_rate_limit_attempts_identifier_action_timestamp")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .table(rate_limit_attempt::Entity)
                    .name("idx_rate_limit_attempts_ip_action_timestamp")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(rate_limit_attempt::Entity).to_owned())
            .await?;
        Ok(())
    }
}
