use sea_orm::DatabaseConnection;
use sea_orm_migration::prelude::*;
use sea_orm_migration::MigrationTrait;

mod m00001_users_and_roles;
mod m00002_rate_limit_attempts;
mod m00003_security_events;
mod m00004_ip_blocklist;
mod m00005_password_history;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m00001_users_and_roles::Migration),
            Box::new(m00002_rate_limit_attempts::Migration),
            Box::new(m00003_security_events::Migration),
            Box::new(m00004_ip_blocklist::Migration),
            Box::new(m00005_password_history::Migration),
        ]
    }
}

pub async fn migrate_database(connection: &DatabaseConnection) -> Result<(), DbErr> {
    Migrator::up(connection, None).await
}
