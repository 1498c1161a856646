use alloc::{sync::Arc, vec, vec::Vec};
use log::{debug, error, info};
use spin::RwLock;

use crate::{
    config::{dir_blocks, file_blocks, FsConfig, FIRST_DATA_BLOCK},
    dir,
    error::{FsError, Result},
    layout::{validate_name, BlockId, BlockKind, DirEntry},
    pool::BlockPool,
    reclaim, stream,
    vfs::Inode,
};

/// Attributes of a chain head
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    /// Head block, also the inode number
    pub id: BlockId,
    /// File or directory
    pub kind: BlockKind,
    /// Bytes for a file, entries for a directory
    pub size: usize,
    /// Blocks in the chain
    pub blocks: usize,
}

/// Occupancy of the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolUsage {
    /// Total slots
    pub capacity: usize,
    /// Slots never handed out (null sentinel and root)
    pub reserved: usize,
    /// Busy slots, root included
    pub busy: usize,
    /// Slots the allocator can still hand out
    pub free: usize,
}

/// A memory-resident file system over one block pool
pub struct NaiveFileSystem {
    pool: BlockPool,
}

impl NaiveFileSystem {
    /// Build an empty file system
    pub fn new(config: FsConfig) -> Result<Self> {
        let pool = BlockPool::new(config)?;
        info!(
            "naive-fs: {} blocks, chaining {}",
            config.capacity,
            if config.chaining { "on" } else { "off" }
        );
        Ok(Self { pool })
    }

    /// Build an empty file system behind a shared lock
    pub fn shared(config: FsConfig) -> Result<Arc<RwLock<Self>>> {
        Ok(Arc::new(RwLock::new(Self::new(config)?)))
    }

    /// Get the root inode of the file system
    pub fn root_inode(fs: &Arc<RwLock<Self>>) -> Inode {
        Inode::new(BlockId::ROOT, Arc::clone(fs))
    }

    /// The underlying pool
    pub fn pool(&self) -> &BlockPool {
        &self.pool
    }

    /// Engine variant
    pub fn config(&self) -> FsConfig {
        self.pool.config()
    }

    /// Resolve a raw inode number coming from outside to the chain head now in that slot
    pub fn block_id(&self, raw: u32) -> Result<BlockId> {
        self.pool.block_id(raw)
    }

    /// Create an empty file or directory called `name` under `parent`.
    ///
    /// The name and parent are checked before any block is taken, and a block taken for
    /// the child is given back if the parent cannot record it.
    pub fn create(&mut self, parent: BlockId, name: &str, kind: BlockKind) -> Result<BlockId> {
        validate_name(name)?;
        if dir::find_entry(&self.pool, parent, name)?.is_some() {
            return Err(FsError::AlreadyExists);
        }
        let child = self.pool.allocate(kind)?;
        if let Err(err) = dir::append_entry(&mut self.pool, parent, name, child) {
            self.pool.free(child)?;
            return Err(err);
        }
        debug!("create {kind:?} {name} = {child} under {parent}");
        Ok(child)
    }

    /// Create from mode bits, rejecting anything but directories and regular files
    pub fn create_with_mode(&mut self, parent: BlockId, name: &str, mode: u32) -> Result<BlockId> {
        let kind = BlockKind::from_mode(mode)?;
        self.create(parent, name, kind)
    }

    /// Find the child called `name`
    pub fn lookup(&self, parent: BlockId, name: &str) -> Result<BlockId> {
        dir::find_entry(&self.pool, parent, name)?
            .map(|(_, entry)| entry.child())
            .ok_or(FsError::NotFound)
    }

    /// Entries of a directory in storage order
    pub fn list(&self, dir: BlockId) -> Result<Vec<DirEntry>> {
        dir::entries(&self.pool, dir)?.collect()
    }

    /// Read up to `len` bytes at `offset`
    pub fn read(&self, file: BlockId, offset: usize, len: usize) -> Result<Vec<u8>> {
        let available = stream::file_size(&self.pool, file)?.saturating_sub(offset);
        let mut buf = vec![0u8; len.min(available)];
        let read = stream::read_at(&self.pool, file, offset, &mut buf)?;
        buf.truncate(read);
        Ok(buf)
    }

    /// Read into `buf` at `offset`
    pub fn read_at(&self, file: BlockId, offset: usize, buf: &mut [u8]) -> Result<usize> {
        stream::read_at(&self.pool, file, offset, buf)
    }

    /// Write `buf` at `offset`; the file ends where this write ends
    pub fn write(&mut self, file: BlockId, offset: usize, buf: &[u8]) -> Result<usize> {
        stream::write_at(&mut self.pool, file, offset, buf)
    }

    /// Write `buf` after the current end
    pub fn append(&mut self, file: BlockId, buf: &[u8]) -> Result<usize> {
        stream::append(&mut self.pool, file, buf)
    }

    /// Shrink a file to `len` bytes
    pub fn truncate(&mut self, file: BlockId, len: usize) -> Result<()> {
        stream::truncate(&mut self.pool, file, len).map(|_| ())
    }

    /// Remove the regular file `name` from `parent`
    pub fn unlink(&mut self, parent: BlockId, name: &str) -> Result<()> {
        reclaim::remove_file(&mut self.pool, parent, name).map(|_| ())
    }

    /// Remove the directory `name` from `parent` together with its contents
    pub fn rmdir(&mut self, parent: BlockId, name: &str) -> Result<()> {
        reclaim::remove_directory(&mut self.pool, parent, name).map(|_| ())
    }

    /// Attributes of a chain head
    pub fn stat(&self, id: BlockId) -> Result<Metadata> {
        let block = self.pool.head(id)?;
        Ok(Metadata {
            id,
            kind: block.kind(),
            size: block.size,
            blocks: self.pool.chain_len(id)?,
        })
    }

    /// Pool occupancy
    pub fn usage(&self) -> PoolUsage {
        PoolUsage {
            capacity: self.pool.capacity(),
            reserved: FIRST_DATA_BLOCK as usize,
            busy: self.pool.busy_count(),
            free: self.pool.free_count(),
        }
    }

    /// Check the whole tree against the pool.
    ///
    /// Every busy block must be reachable from the root exactly once. Every entry must
    /// name a live chain head, only chain heads may be marked as heads, tail blocks carry
    /// no size, and every chain must hold exactly as many blocks as its head's size or
    /// entry count requires.
    pub fn verify(&self) -> Result<()> {
        let mut seen = vec![false; self.pool.capacity()];
        let mut reachable = 0usize;
        let mut stack = Vec::from([BlockId::ROOT]);
        while let Some(head) = stack.pop() {
            let block = self.pool.head(head).map_err(|_| {
                error!("entry points at {head}, which is not a live chain head");
                FsError::Corrupted
            })?;
            let chain = self.pool.chain(head)?;
            let expected = match block.kind() {
                BlockKind::File => file_blocks(block.size),
                BlockKind::Directory => dir_blocks(block.size),
            };
            if chain.len() != expected {
                error!("{head}: {} blocks, size needs {expected}", chain.len());
                return Err(FsError::Corrupted);
            }
            for (pos, &id) in chain.iter().enumerate() {
                if core::mem::replace(&mut seen[id.slot()], true) {
                    error!("{id} reachable twice");
                    return Err(FsError::Corrupted);
                }
                let member = self.pool.get(id)?;
                if pos > 0 && (member.is_head() || member.size != 0) {
                    error!("{id}: tail of {head} marked as a head or sized");
                    return Err(FsError::Corrupted);
                }
                if member.kind() != block.kind() {
                    error!("{id}: kind differs from its head {head}");
                    return Err(FsError::Corrupted);
                }
                reachable += 1;
            }
            if block.is_dir() {
                for entry in dir::entries(&self.pool, head)? {
                    stack.push(entry?.child());
                }
            }
        }
        if reachable != self.pool.busy_count() {
            let leaked = self
                .pool
                .busy_blocks()
                .filter(|block| !seen[block.index().slot()])
                .count();
            error!("{leaked} busy blocks unreachable from root");
            return Err(FsError::Corrupted);
        }
        Ok(())
    }
}
