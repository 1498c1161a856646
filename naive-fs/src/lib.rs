//! Naive file system: a memory-resident block pool holding a directory tree

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

extern crate alloc;

mod config;
pub mod dir;
mod error;
mod filesystem;
mod layout;
mod pool;
pub mod reclaim;
pub mod stream;
mod vfs;

pub use config::*;
pub use error::{FsError, Result};
pub use filesystem::{Metadata, NaiveFileSystem, PoolUsage};
pub use layout::{
    validate_name, Block, BlockId, BlockKind, DataBlock, DirEntry, S_IFDIR, S_IFMT, S_IFREG,
};
pub use pool::BlockPool;
pub use vfs::Inode;
