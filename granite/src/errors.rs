use substrate::error::DbError;

/// Errors surfaced by the relational layer.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Storage(#[from] DbError),

    /// The aggregate operator cannot be computed over the given field type.
    #[error("unsupported aggregate: {0}")]
    InvalidAggregate(String),

    #[error("{0}")]
    Generic(String),
}

impl From<std::io::Error> for ExecutionError {
    fn from(err: std::io::Error) -> Self {
        ExecutionError::Storage(DbError::Io(err))
    }
}

pub type Result<T> = std::result::Result<T, ExecutionError>;
