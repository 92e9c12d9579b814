use thiserror::Error;

/// Crate-wide error type.
///
/// Every fallible operation in biframe reports through this enum. Errors are
/// raised synchronously at the point of detection and never silently
/// recovered; operations either succeed and return a new or mutated value,
/// or fail without partially mutating visible state.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("duplicate column name: {0}")]
    DuplicateColumnName(String),

    #[error("length mismatch: expected {expected}, actual {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("index out of bounds: index {index}, size {size}")]
    IndexOutOfBounds { index: i64, size: usize },

    #[error("cast error: {0}")]
    Cast(String),

    #[error("device mismatch: {0}")]
    DeviceMismatch(String),

    /// Attempted in-place write through a non-writeable (shared or
    /// broadcast) view. Copy the array first.
    #[error("array is not writeable: {0}")]
    NotWriteable(String),

    /// Column-length or backend invariant broken inside the crate itself.
    /// Seeing this error means a bug in biframe, not caller misuse.
    #[error("internal consistency error: {0}")]
    Consistency(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),
}

/// Alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, Error>;
