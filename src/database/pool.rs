use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};

use super::error::{Error, QueryError};

pub async fn setup_pool(database_url: &str) -> Result<Pool<Postgres>, Error> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(QueryError::from)?;

    Ok(pool)
}

/// Applies the embedded migrations; the unique indexes they create are the
/// authoritative guard behind every duplicate-relation check in `actions`.
pub async fn run_migrations(pool: &Pool<Postgres>) -> Result<(), Error> {
    sqlx::migrate!()
        .run(pool)
        .await
        .map_err(|e| QueryError::new(format!("{e}")))?;

    Ok(())
}
