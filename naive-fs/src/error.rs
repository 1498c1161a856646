use thiserror::Error;

/// Errors surfaced by the engine
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// No free block left in the pool, or a chain may not grow
    #[error("no space left in block pool")]
    OutOfSpace,
    /// Name absent from the directory
    #[error("entry not found")]
    NotFound,
    /// Name already present in the directory
    #[error("entry already exists")]
    AlreadyExists,
    /// Empty, over-long, or containing `/` or NUL
    #[error("invalid entry name")]
    InvalidName,
    /// Mode bits are neither a directory nor a regular file
    #[error("unsupported entry kind")]
    InvalidKind,
    /// Directory operation on a regular file
    #[error("not a directory")]
    NotADirectory,
    /// File operation on a directory
    #[error("is a directory")]
    IsADirectory,
    /// Block index outside the pool, the null sentinel, or a free slot
    #[error("invalid block reference")]
    InvalidBlock,
    /// Offset or length outside what the operation allows
    #[error("invalid offset")]
    InvalidOffset,
    /// The root block cannot be released
    #[error("root block is permanently busy")]
    RootBusy,
    /// Recorded size or child count disagrees with the chain backing it
    #[error("block chain corrupted")]
    Corrupted,
    /// Pool capacity unusable
    #[error("invalid pool configuration")]
    InvalidConfig,
}

/// Engine result type
pub type Result<T> = core::result::Result<T, FsError>;
