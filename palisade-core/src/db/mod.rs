use std::time::Duration;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};
use tracing::*;
use uuid::Uuid;
use palisade_common::consts::{BUILTIN_ADMIN_ROLE_NAME, BUILTIN_USER_ROLE_NAME};
use palisade_common::{PalisadeConfig, PalisadeError};
use palisade_db_entities::Role;
use palisade_db_migrations::migrate_database;

pub async fn connect_to_db(config: &PalisadeConfig) -> Result<DatabaseConnection, PalisadeError> {
    let mut url = config.store.database_url.expose_secret().clone();
    if url.starts_with("sqlite:") && !url.contains(":memory:") && !url.contains("mode=") {
        // Create the database file on first run
        url.push_str("?mode=rwc");
    }

    let mut opt = ConnectOptions::new(url);
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(8))
        .sqlx_logging(false);

    let connection = Database::connect(opt).await?;

    migrate_database(&connection).await?;
    Ok(connection)
}

/// Seed the built-in roles. Idempotent; runs on every start.
pub async fn populate_db(db: &DatabaseConnection) -> Result<(), PalisadeError> {
    for (name, description) in [
        (BUILTIN_USER_ROLE_NAME, "Default role for registered users"),
        (BUILTIN_ADMIN_ROLE_NAME, "Full administrative access"),
    ] {
        let existing = Role::Entity::find()
            .filter(Role::Column::Name.eq(name))
            .one(db)
            .await?;
        if existing.is_none() {
            let values = Role::ActiveModel {
                id: Set(Uuid::new_v4()),
                name: Set(name.to_owned()),
                description: Set(description.to_owned()),
            };
            values.insert(db).await?;
            info!(role = name, "Created built-in role");
        }
    }
    Ok(())
}
