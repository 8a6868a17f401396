use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection, DbErr};
use tracing::info;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://dico.db?mode=rwc";

pub async fn connect_to_database(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

pub async fn connect_to_memory_database() -> Result<DatabaseConnection, DbErr> {
    Database::connect("sqlite::memory:").await
}

/// Connect and bring the schema up to date.
pub async fn connect_and_migrate(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = connect_to_database(database_url).await?;
    Migrator::up(&db, None).await?;
    info!("Database schema is up to date");
    Ok(db)
}
