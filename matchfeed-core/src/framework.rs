use sqlx::PgPool;

/// Runs SQL query objects against a connection pool.
#[derive(Debug, Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}
