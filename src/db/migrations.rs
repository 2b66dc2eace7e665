use sqlx::{Pool, Postgres};
use tracing::info;

/// Run all pending database migrations
///
/// Migrations are embedded from the migrations directory at compile time.
/// sqlx records applied versions, so running this repeatedly is safe.
pub async fn run_migrations(pool: &Pool<Postgres>) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Running database migrations...");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await?;

    info!("Database migrations completed successfully");
    Ok(())
}
