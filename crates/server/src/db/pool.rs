use sqlx::postgres::{PgPool, PgPoolOptions};

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Create the job tables shared with the analysis worker.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    analysis_worker::db::run_migrations(pool).await
}
