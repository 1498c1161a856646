use crate::error::{FsError, Result};

/// Use a block size of 512 bytes
pub const BLOCK_SIZE: usize = 512;

/// The max length of an entry name, in bytes
pub const NAME_LENGTH_LIMIT: usize = 8;

/// Block index reserved as the "no next block" sentinel
pub const NULL_BLOCK: u32 = 0;
/// Block index permanently owned by the root directory
pub const ROOT_BLOCK: u32 = 1;
/// First block index handed out by the allocator
pub const FIRST_DATA_BLOCK: u32 = 2;

/// Total blocks of the single-block (flat) engine variant
pub const FLAT_POOL_CAPACITY: usize = 32;
/// Total blocks of the chaining engine variant
pub const CHAINED_POOL_CAPACITY: usize = 128;

/// Bytes taken by one packed directory entry: a padded name, then the child's `u32`
/// slot and `u32` generation
pub const DIRENT_SIZE: usize = NAME_LENGTH_LIMIT + 8;
/// Directory entries that fit in one block payload
pub const DIRENTS_PER_BLOCK: usize = BLOCK_SIZE / DIRENT_SIZE;

/// Engine variant: pool capacity and whether chains may grow past one block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsConfig {
    /// Total number of block slots, reserved ones included
    pub capacity: usize,
    /// Whether a file or directory may span more than one block
    pub chaining: bool,
}

impl FsConfig {
    /// A custom pool
    pub const fn new(capacity: usize, chaining: bool) -> Self {
        Self { capacity, chaining }
    }

    /// 32 blocks, every entry confined to its head block
    pub const fn flat() -> Self {
        Self::new(FLAT_POOL_CAPACITY, false)
    }

    /// 128 blocks with multi-block chains
    pub const fn chained() -> Self {
        Self::new(CHAINED_POOL_CAPACITY, true)
    }

    /// Number of slots the allocator may hand out
    pub const fn allocatable(&self) -> usize {
        self.capacity.saturating_sub(FIRST_DATA_BLOCK as usize)
    }

    /// Check the capacity leaves at least one allocatable slot and fits a block index
    pub fn validate(&self) -> Result<()> {
        if self.capacity <= FIRST_DATA_BLOCK as usize || u32::try_from(self.capacity).is_err() {
            return Err(FsError::InvalidConfig);
        }
        Ok(())
    }
}

impl Default for FsConfig {
    fn default() -> Self {
        Self::chained()
    }
}

/// Blocks a file of `size` bytes occupies; the head block always exists
pub const fn file_blocks(size: usize) -> usize {
    if size == 0 {
        1
    } else {
        size.div_ceil(BLOCK_SIZE)
    }
}

/// Blocks a directory with `count` entries occupies
pub const fn dir_blocks(count: usize) -> usize {
    if count == 0 {
        1
    } else {
        count.div_ceil(DIRENTS_PER_BLOCK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants() {
        assert_eq!(FsConfig::flat().allocatable(), 30);
        assert_eq!(FsConfig::default(), FsConfig::chained());
        assert_eq!(FsConfig::new(2, true).validate(), Err(FsError::InvalidConfig));
        assert!(FsConfig::new(3, true).validate().is_ok());
    }

    #[test]
    fn block_counts() {
        assert_eq!(DIRENTS_PER_BLOCK, 32);
        assert_eq!(file_blocks(0), 1);
        assert_eq!(file_blocks(BLOCK_SIZE), 1);
        assert_eq!(file_blocks(BLOCK_SIZE + 1), 2);
        assert_eq!(dir_blocks(32), 1);
        assert_eq!(dir_blocks(33), 2);
    }
}
