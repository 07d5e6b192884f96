use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("database connection error: {0}")]
    Connection(String),

    #[error("database query error: {0}")]
    Query(String),

    #[error("database migration error: {0}")]
    Migration(String),

    /// A create-if-absent insert lost to a unique index. Callers decide
    /// whether this means "seat taken" or "user already booked".
    #[error("unique constraint violated: {0}")]
    Conflict(String),
}
