use crate::PageId;

/// Errors surfaced by the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A lock wait exceeded its deadline, or the transaction was aborted
    /// explicitly. The caller must complete the transaction with abort.
    #[error("transaction aborted")]
    TransactionAborted,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The requested page lies past the end of the heap file.
    #[error("page {0} is out of range")]
    PageOutOfRange(PageId),

    /// Every slot on the page is in use.
    #[error("no free slot on page")]
    PageFull,

    /// The tuple is not stored on the page it names.
    #[error("tuple is not on this page")]
    NotOnPage,

    /// Every cached page is dirty, so nothing can be evicted.
    #[error("buffer pool is full of dirty pages")]
    CacheFull,

    #[error("no such element: {0}")]
    NoSuchElement(String),

    #[error("{0}")]
    Generic(String),
}

pub type Result<T> = std::result::Result<T, DbError>;
