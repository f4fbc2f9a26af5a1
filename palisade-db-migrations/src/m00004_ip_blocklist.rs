use sea_orm::Schema;
use sea_orm_migration::prelude::*;

pub mod blocked_ip {
    use chrono::{DateTime, Utc};
    use sea_orm::entity::prelude::*;
    use uuid::Uuid;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "blocked_ips")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        #[sea_orm(unique)]
        pub ip_address: String,
        pub reason: String,
        pub blocked_until: DateTime<Utc>,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m00004_ip_blocklist"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let builder = manager.get_database_backend();
        let schema = Schema::new(builder);

        manager
            .create_table(schema.create_table_from_entity(blocked_ip::Entity))
            .await?;

        // For the retention sweep over expired blocks
        manager
            .create_index(
                Index::create()
                    .table(blocked_ip::Entity)
                    .name("idx_blocked_ips_blocked_until")
                    .col(Alias::new("blocked_until"))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .table(blocked_ip::Entity)
                    .name("idx_blocked_ips_blocked_until")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(blocked_ip::Entity).to_owned())
            .await?;
        Ok(())
    }
}
