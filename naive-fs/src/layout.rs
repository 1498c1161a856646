use core::fmt;

use crate::{
    config::{BLOCK_SIZE, DIRENT_SIZE, NAME_LENGTH_LIMIT, ROOT_BLOCK},
    error::{FsError, Result},
};

/// Directory bit of a mode
pub const S_IFDIR: u32 = 0o040_000;
/// Regular file bit of a mode
pub const S_IFREG: u32 = 0o100_000;
/// Mask selecting the file type bits of a mode
pub const S_IFMT: u32 = 0o170_000;

/// A data block payload
pub type DataBlock = [u8; BLOCK_SIZE];

/// Reference to a block slot inside the pool.
///
/// Values are only minted by the pool after a range check. The generation is bumped
/// each time the slot is allocated, so a reference kept past a free no longer matches
/// the slot once it is reused. Slot `0` is never represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId {
    index: u32,
    generation: u32,
}

impl BlockId {
    /// The root directory's block
    pub const ROOT: Self = Self::new(ROOT_BLOCK, 0);

    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Raw slot number, also used as the inode number
    pub const fn raw(self) -> u32 {
        self.index
    }

    /// Allocation count of the slot when this reference was handed out
    pub const fn generation(self) -> u32 {
        self.generation
    }

    pub(crate) const fn slot(self) -> usize {
        self.index as usize
    }

    /// The same slot under its next allocation
    pub(crate) const fn reallocated(self) -> Self {
        Self::new(self.index, self.generation.wrapping_add(1))
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

/// Type of a block chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Regular file data
    File,
    /// Packed directory entries
    Directory,
}

impl BlockKind {
    /// Classify mode bits
    pub fn from_mode(mode: u32) -> Result<Self> {
        match mode & S_IFMT {
            S_IFDIR => Ok(Self::Directory),
            S_IFREG => Ok(Self::File),
            _ => Err(FsError::InvalidKind),
        }
    }

    /// File type bits for this kind
    pub const fn mode(self) -> u32 {
        match self {
            Self::File => S_IFREG,
            Self::Directory => S_IFDIR,
        }
    }
}

/// A slot of the pool
pub struct Block {
    pub(crate) busy: bool,
    pub(crate) kind: BlockKind,
    pub(crate) index: BlockId,
    /// First block of a chain, the only one whose `size` means anything
    pub(crate) head: bool,
    /// Byte length of a file or child count of a directory, valid on chain heads only
    pub(crate) size: usize,
    pub(crate) data: DataBlock,
    pub(crate) next: Option<BlockId>,
}

impl Block {
    pub(crate) const fn empty(index: BlockId) -> Self {
        Self {
            busy: false,
            kind: BlockKind::File,
            index,
            head: false,
            size: 0,
            data: [0u8; BLOCK_SIZE],
            next: None,
        }
    }

    /// Reset to a zeroed, unlinked head of the given kind
    pub(crate) fn init(&mut self, kind: BlockKind) {
        self.kind = kind;
        self.size = 0;
        self.data.fill(0);
        self.next = None;
    }

    /// Whether this slot is allocated
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Kind of the chain this block belongs to
    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    /// The block's own slot
    pub fn index(&self) -> BlockId {
        self.index
    }

    /// Whether this block starts a chain
    pub fn is_head(&self) -> bool {
        self.head
    }

    /// Next block of the chain
    pub fn next(&self) -> Option<BlockId> {
        self.next
    }

    /// Whether this block heads a directory
    pub fn is_dir(&self) -> bool {
        self.kind == BlockKind::Directory
    }

    /// Whether this block heads a regular file
    pub fn is_file(&self) -> bool {
        self.kind == BlockKind::File
    }
}

/// A directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    name: [u8; NAME_LENGTH_LIMIT],
    child: BlockId,
}

impl DirEntry {
    /// Create a directory entry from name and child block.
    ///
    /// The name is copied with a length check; it is never truncated.
    pub fn new(name: &str, child: BlockId) -> Result<Self> {
        validate_name(name)?;
        let mut bytes = [0u8; NAME_LENGTH_LIMIT];
        bytes[..name.len()].copy_from_slice(name.as_bytes());
        Ok(Self { name: bytes, child })
    }

    /// Decode an entry packed at the start of `raw`
    pub(crate) fn decode(raw: &[u8]) -> Result<Self> {
        let (name, child) = raw[..DIRENT_SIZE].split_at(NAME_LENGTH_LIMIT);
        let mut bytes = [0u8; NAME_LENGTH_LIMIT];
        bytes.copy_from_slice(name);
        let index = le_u32(&child[..4]);
        if index < ROOT_BLOCK {
            return Err(FsError::Corrupted);
        }
        Ok(Self {
            name: bytes,
            child: BlockId::new(index, le_u32(&child[4..8])),
        })
    }

    /// Pack into the first [`DIRENT_SIZE`] bytes of `raw`
    pub(crate) fn encode(&self, raw: &mut [u8]) {
        raw[..NAME_LENGTH_LIMIT].copy_from_slice(&self.name);
        let child = &mut raw[NAME_LENGTH_LIMIT..DIRENT_SIZE];
        child[..4].copy_from_slice(&self.child.raw().to_le_bytes());
        child[4..].copy_from_slice(&self.child.generation().to_le_bytes());
    }

    /// Get name of the entry
    pub fn name(&self) -> &str {
        let len = self
            .name
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(self.name.len());
        // names enter only through `new`, which takes a `&str`
        core::str::from_utf8(&self.name[..len]).unwrap_or_default()
    }

    /// Get child block of the entry
    pub fn child(&self) -> BlockId {
        self.child
    }

    pub(crate) fn matches(&self, name: &str) -> bool {
        self.name() == name
    }
}

fn le_u32(raw: &[u8]) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(raw);
    u32::from_le_bytes(bytes)
}

/// Reject names that cannot be stored verbatim
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name.len() > NAME_LENGTH_LIMIT
        || name.bytes().any(|c| c == 0 || c == b'/')
    {
        return Err(FsError::InvalidName);
    }
    Ok(())
}
