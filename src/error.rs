//! Shared error type for the training core.

/// Errors surfaced by fallible core operations.
///
/// Buffer sizing is checked before any allocation is attempted, so callers
/// observe either an unchanged structure or a freshly reset one on the error
/// path. There are no retries and no partial-failure recovery.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// An allocation or capacity grow failed.
    #[error("out of memory while growing a core buffer")]
    OutOfMemory,

    /// A product of dimension sizes would exceed the word width.
    #[error("dimension size product overflows the machine word")]
    SizeOverflow,

    /// Input data violated a documented precondition.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CoreError>;
