use alloc::{boxed::Box, vec::Vec};
use log::{trace, warn};

use crate::{
    config::{FsConfig, FIRST_DATA_BLOCK, NULL_BLOCK},
    error::{FsError, Result},
    layout::{Block, BlockId, BlockKind},
};

/// Fixed arena of blocks.
///
/// Slot `0` is the null sentinel and slot `1` the root directory; neither is ever
/// handed out by [`BlockPool::allocate`].
pub struct BlockPool {
    blocks: Box<[Block]>,
    config: FsConfig,
    /// Busy slots, root included
    busy: usize,
}

impl BlockPool {
    /// Build a pool whose only busy block is the empty root directory
    pub fn new(config: FsConfig) -> Result<Self> {
        config.validate()?;
        let blocks = (0..config.capacity)
            .map(|slot| Block::empty(BlockId::new(slot as u32, 0)))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let mut pool = Self {
            blocks,
            config,
            busy: 0,
        };
        let root = &mut pool.blocks[BlockId::ROOT.slot()];
        root.init(BlockKind::Directory);
        root.busy = true;
        root.head = true;
        pool.busy = 1;
        Ok(pool)
    }

    /// Engine variant of this pool
    pub fn config(&self) -> FsConfig {
        self.config
    }

    /// Total slots, reserved ones included
    pub fn capacity(&self) -> usize {
        self.blocks.len()
    }

    /// Busy slots, root included
    pub fn busy_count(&self) -> usize {
        self.busy
    }

    /// Busy slots the allocator handed out
    pub fn allocated(&self) -> usize {
        self.busy - 1
    }

    /// Slots still available to the allocator
    pub fn free_count(&self) -> usize {
        self.config.allocatable() - self.allocated()
    }

    /// Resolve a raw slot number to the chain head currently living there.
    ///
    /// Null, out of range, free and non-head slots are all rejected.
    pub fn block_id(&self, raw: u32) -> Result<BlockId> {
        match self.blocks.get(raw as usize) {
            Some(block) if raw != NULL_BLOCK && block.busy && block.head => Ok(block.index),
            _ => Err(FsError::InvalidBlock),
        }
    }

    /// Borrow a busy block still holding the allocation `id` was handed out for
    pub fn get(&self, id: BlockId) -> Result<&Block> {
        match self.blocks.get(id.slot()) {
            Some(block) if block.busy && block.index == id => Ok(block),
            _ => Err(FsError::InvalidBlock),
        }
    }

    pub(crate) fn get_mut(&mut self, id: BlockId) -> Result<&mut Block> {
        match self.blocks.get_mut(id.slot()) {
            Some(block) if block.busy && block.index == id => Ok(block),
            _ => Err(FsError::InvalidBlock),
        }
    }

    /// Borrow the first block of a chain
    pub fn head(&self, id: BlockId) -> Result<&Block> {
        let block = self.get(id)?;
        if !block.head {
            return Err(FsError::InvalidBlock);
        }
        Ok(block)
    }

    /// Borrow the head of a directory chain
    pub fn dir(&self, id: BlockId) -> Result<&Block> {
        let block = self.head(id)?;
        if !block.is_dir() {
            return Err(FsError::NotADirectory);
        }
        Ok(block)
    }

    /// Borrow the head of a file chain
    pub fn file(&self, id: BlockId) -> Result<&Block> {
        let block = self.head(id)?;
        if !block.is_file() {
            return Err(FsError::IsADirectory);
        }
        Ok(block)
    }

    /// Allocate the first free slot and reset it to an unlinked chain head of `kind`
    pub fn allocate(&mut self, kind: BlockKind) -> Result<BlockId> {
        let first = FIRST_DATA_BLOCK as usize;
        let capacity = self.blocks.len();
        let Some(block) = self.blocks[first..].iter_mut().find(|block| !block.busy) else {
            warn!("block pool exhausted ({capacity} blocks)");
            return Err(FsError::OutOfSpace);
        };
        block.busy = true;
        block.head = true;
        block.index = block.index.reallocated();
        block.init(kind);
        let id = block.index;
        self.busy += 1;
        trace!("alloc block {id}");
        Ok(id)
    }

    /// Release a single block already detached from every chain and entry
    pub fn free(&mut self, id: BlockId) -> Result<()> {
        if id == BlockId::ROOT {
            return Err(FsError::RootBusy);
        }
        let block = self.get_mut(id)?;
        block.busy = false;
        block.head = false;
        block.next = None;
        block.size = 0;
        self.busy -= 1;
        trace!("free block {id}");
        Ok(())
    }

    /// Release `head` and every block linked after it, returning how many were freed
    pub fn free_chain(&mut self, head: BlockId) -> Result<usize> {
        self.head(head)?;
        self.free_from(head)
    }

    /// Release `first` and every block linked after it
    fn free_from(&mut self, first: BlockId) -> Result<usize> {
        let chain = self.chain(first)?;
        self.free_all(&chain)?;
        Ok(chain.len())
    }

    /// Release blocks already collected and validated by the caller
    pub(crate) fn free_all(&mut self, ids: &[BlockId]) -> Result<()> {
        ids.iter().try_for_each(|&id| self.free(id))
    }

    /// Every block of the chain starting at `head`, in link order
    pub fn chain(&self, head: BlockId) -> Result<Vec<BlockId>> {
        let mut chain = Vec::new();
        let mut cur = Some(head);
        while let Some(id) = cur {
            // a chain can never be longer than the pool; anything else is a cycle
            if chain.len() == self.blocks.len() {
                return Err(corrupted(head));
            }
            chain.push(id);
            cur = self.get(id)?.next;
        }
        Ok(chain)
    }

    /// Blocks in the chain starting at `head`
    pub fn chain_len(&self, head: BlockId) -> Result<usize> {
        self.chain(head).map(|chain| chain.len())
    }

    /// Walk `hops` links from `head`
    pub(crate) fn nth(&self, head: BlockId, hops: usize) -> Result<BlockId> {
        let mut id = head;
        for _ in 0..hops {
            id = self.get(id)?.next.ok_or_else(|| corrupted(head))?;
        }
        Ok(id)
    }

    /// Follow the link after `id`, allocating a new tail if there is none
    pub(crate) fn next_or_grow(&mut self, id: BlockId) -> Result<BlockId> {
        let block = self.get(id)?;
        if let Some(next) = block.next {
            return Ok(next);
        }
        if !self.config.chaining {
            warn!("chain at {id} cannot grow: chaining disabled");
            return Err(FsError::OutOfSpace);
        }
        let kind = block.kind;
        let tail = self.allocate(kind)?;
        self.get_mut(tail)?.head = false;
        self.get_mut(id)?.next = Some(tail);
        trace!("chain grew {id} -> {tail}");
        Ok(tail)
    }

    /// Keep the first `keep` blocks of the chain (at least the head) and free the rest
    pub(crate) fn trim_chain(&mut self, head: BlockId, keep: usize) -> Result<usize> {
        let last = self.nth(head, keep.max(1) - 1)?;
        let Some(rest) = self.get_mut(last)?.next.take() else {
            return Ok(0);
        };
        let freed = self.free_from(rest)?;
        trace!("trimmed {freed} blocks after {last}");
        Ok(freed)
    }

    /// Iterate over busy slots
    pub(crate) fn busy_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(|block| block.busy)
    }
}

fn corrupted(head: BlockId) -> FsError {
    log::error!("chain headed by {head} is inconsistent");
    FsError::Corrupted
}
