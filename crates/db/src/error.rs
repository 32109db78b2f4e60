use thiserror::Error;

/// Infrastructure errors from the job store.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("failed to prepare {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// A write kept hitting SQLite lock contention past the retry bound.
    #[error("database stayed locked through {attempts} attempts of {op}")]
    Contended { op: &'static str, attempts: u32 },
}
