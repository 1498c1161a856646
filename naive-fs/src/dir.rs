//! Directory table: entries packed back to back over a directory chain.
//!
//! The chain is addressed as one logical array; entry `i` lives in block
//! `i / DIRENTS_PER_BLOCK` of the chain at byte `(i % DIRENTS_PER_BLOCK) * DIRENT_SIZE`.

use log::trace;

use crate::{
    config::{dir_blocks, DIRENTS_PER_BLOCK, DIRENT_SIZE},
    error::{FsError, Result},
    layout::{BlockId, DirEntry},
    pool::BlockPool,
};

/// Block and byte offset holding logical entry `pos`
fn slot(pool: &BlockPool, dir: BlockId, pos: usize) -> Result<(BlockId, usize)> {
    let block = pool.nth(dir, pos / DIRENTS_PER_BLOCK)?;
    Ok((block, (pos % DIRENTS_PER_BLOCK) * DIRENT_SIZE))
}

fn read_entry(pool: &BlockPool, dir: BlockId, pos: usize) -> Result<DirEntry> {
    let (block, offset) = slot(pool, dir, pos)?;
    DirEntry::decode(&pool.get(block)?.data[offset..])
}

fn write_entry(pool: &mut BlockPool, dir: BlockId, pos: usize, entry: &DirEntry) -> Result<()> {
    let (block, offset) = slot(pool, dir, pos)?;
    entry.encode(&mut pool.get_mut(block)?.data[offset..]);
    Ok(())
}

/// Number of entries recorded on the directory head
pub fn entry_count(pool: &BlockPool, dir: BlockId) -> Result<usize> {
    Ok(pool.dir(dir)?.size)
}

/// Append `(name, child)` after the last entry, growing the chain when the tail is full
pub fn append_entry(pool: &mut BlockPool, dir: BlockId, name: &str, child: BlockId) -> Result<()> {
    let entry = DirEntry::new(name, child)?;
    let count = entry_count(pool, dir)?;
    let mut block = dir;
    for _ in 0..count / DIRENTS_PER_BLOCK {
        block = pool.next_or_grow(block)?;
    }
    let offset = (count % DIRENTS_PER_BLOCK) * DIRENT_SIZE;
    entry.encode(&mut pool.get_mut(block)?.data[offset..]);
    pool.get_mut(dir)?.size = count + 1;
    trace!("dir {dir}: entry {count} = {name} -> {child}");
    Ok(())
}

/// Position and entry of the first entry called `name`
pub fn find_entry(pool: &BlockPool, dir: BlockId, name: &str) -> Result<Option<(usize, DirEntry)>> {
    for (pos, entry) in entries(pool, dir)?.enumerate() {
        let entry = entry?;
        if entry.matches(name) {
            return Ok(Some((pos, entry)));
        }
    }
    Ok(None)
}

/// Remove the entry called `name`, shifting every later entry one slot left.
///
/// Shifting works on logical positions, so an entry at the start of one block moves
/// into the last slot of the block before it. A tail block left empty is freed.
pub fn remove_entry(pool: &mut BlockPool, dir: BlockId, name: &str) -> Result<BlockId> {
    let (pos, removed) = find_entry(pool, dir, name)?.ok_or(FsError::NotFound)?;
    let count = entry_count(pool, dir)?;
    for i in pos..count - 1 {
        let entry = read_entry(pool, dir, i + 1)?;
        write_entry(pool, dir, i, &entry)?;
    }
    let (block, offset) = slot(pool, dir, count - 1)?;
    pool.get_mut(block)?.data[offset..offset + DIRENT_SIZE].fill(0);
    pool.get_mut(dir)?.size = count - 1;
    pool.trim_chain(dir, dir_blocks(count - 1))?;
    trace!("dir {dir}: removed entry {pos} ({name})");
    Ok(removed.child())
}

/// Iterate over the entries of a directory in storage order
pub fn entries(pool: &BlockPool, dir: BlockId) -> Result<Entries<'_>> {
    let count = entry_count(pool, dir)?;
    Ok(Entries {
        pool,
        block: Some(dir),
        pos: 0,
        count,
    })
}

/// Cursor over a directory chain, bounded by the head's entry count
pub struct Entries<'a> {
    pool: &'a BlockPool,
    block: Option<BlockId>,
    pos: usize,
    count: usize,
}

impl Entries<'_> {
    fn read_next(&mut self) -> Result<DirEntry> {
        let id = self.block.ok_or(FsError::Corrupted)?;
        let block = self.pool.get(id)?;
        let offset = (self.pos % DIRENTS_PER_BLOCK) * DIRENT_SIZE;
        let entry = DirEntry::decode(&block.data[offset..])?;
        self.pos += 1;
        if self.pos % DIRENTS_PER_BLOCK == 0 {
            self.block = block.next;
        }
        Ok(entry)
    }
}

impl Iterator for Entries<'_> {
    type Item = Result<DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.count {
            return None;
        }
        let entry = self.read_next();
        if entry.is_err() {
            self.pos = self.count;
        }
        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.count - self.pos;
        (left, Some(left))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::FsConfig, layout::BlockKind};

    fn names(pool: &BlockPool, dir: BlockId) -> Vec<String> {
        entries(pool, dir)
            .unwrap()
            .map(|entry| entry.unwrap().name().to_string())
            .collect()
    }

    fn fill(pool: &mut BlockPool, dir: BlockId, n: usize) -> Vec<String> {
        (0..n)
            .map(|i| {
                let name = format!("f{i}");
                let child = pool.allocate(BlockKind::File).unwrap();
                append_entry(pool, dir, &name, child).unwrap();
                name
            })
            .collect()
    }

    #[test]
    fn append_find_remove() {
        let mut pool = BlockPool::new(FsConfig::flat()).unwrap();
        let root = BlockId::ROOT;
        let a = pool.allocate(BlockKind::File).unwrap();
        let b = pool.allocate(BlockKind::Directory).unwrap();
        append_entry(&mut pool, root, "a", a).unwrap();
        append_entry(&mut pool, root, "b", b).unwrap();

        let (pos, entry) = find_entry(&pool, root, "b").unwrap().unwrap();
        assert_eq!((pos, entry.child()), (1, b));
        assert!(find_entry(&pool, root, "c").unwrap().is_none());

        assert_eq!(remove_entry(&mut pool, root, "a"), Ok(a));
        assert_eq!(remove_entry(&mut pool, root, "a"), Err(FsError::NotFound));
        assert_eq!(names(&pool, root), ["b"]);
        assert_eq!(entry_count(&pool, root), Ok(1));
    }

    #[test]
    fn first_match_wins() {
        let mut pool = BlockPool::new(FsConfig::flat()).unwrap();
        let first = pool.allocate(BlockKind::File).unwrap();
        let second = pool.allocate(BlockKind::File).unwrap();
        append_entry(&mut pool, BlockId::ROOT, "dup", first).unwrap();
        append_entry(&mut pool, BlockId::ROOT, "dup", second).unwrap();
        let (_, entry) = find_entry(&pool, BlockId::ROOT, "dup").unwrap().unwrap();
        assert_eq!(entry.child(), first);
    }

    #[test]
    fn long_name_rejected_without_mutation() {
        let mut pool = BlockPool::new(FsConfig::flat()).unwrap();
        let child = pool.allocate(BlockKind::File).unwrap();
        assert_eq!(
            append_entry(&mut pool, BlockId::ROOT, "toolongname", child),
            Err(FsError::InvalidName)
        );
        assert_eq!(entry_count(&pool, BlockId::ROOT), Ok(0));
    }

    #[test]
    fn entries_on_file_rejected() {
        let mut pool = BlockPool::new(FsConfig::flat()).unwrap();
        let file = pool.allocate(BlockKind::File).unwrap();
        assert!(matches!(entries(&pool, file), Err(FsError::NotADirectory)));
    }

    #[test]
    fn directory_spans_blocks() {
        let mut pool = BlockPool::new(FsConfig::chained()).unwrap();
        let expected = fill(&mut pool, BlockId::ROOT, DIRENTS_PER_BLOCK + 5);
        assert_eq!(pool.chain_len(BlockId::ROOT), Ok(2));
        assert_eq!(names(&pool, BlockId::ROOT), expected);
        let (pos, _) = find_entry(&pool, BlockId::ROOT, "f44").unwrap().unwrap();
        assert_eq!(pos, 44);
    }

    #[test]
    fn removal_compacts_across_block_boundary() {
        let mut pool = BlockPool::new(FsConfig::chained()).unwrap();
        let root = BlockId::ROOT;
        let mut expected = fill(&mut pool, root, DIRENTS_PER_BLOCK + 3);

        remove_entry(&mut pool, root, "f3").unwrap();
        expected.remove(3);
        assert_eq!(names(&pool, root), expected);
        // the first entry of the second block moved into the last slot of the first
        assert_eq!(
            read_entry(&pool, root, DIRENTS_PER_BLOCK - 1).unwrap().name(),
            format!("f{DIRENTS_PER_BLOCK}")
        );
        assert_eq!(pool.chain_len(root), Ok(2));

        for name in ["f0", "f1"] {
            remove_entry(&mut pool, root, name).unwrap();
            expected.retain(|n| n != name);
        }
        assert_eq!(entry_count(&pool, root), Ok(DIRENTS_PER_BLOCK));
        assert_eq!(names(&pool, root), expected);
        // the emptied tail block went back to the pool
        assert_eq!(pool.chain_len(root), Ok(1));
    }

    #[test]
    fn flat_directory_fills_one_block() {
        let mut pool = BlockPool::new(FsConfig::new(DIRENTS_PER_BLOCK + 4, false)).unwrap();
        fill(&mut pool, BlockId::ROOT, DIRENTS_PER_BLOCK);
        let child = pool.allocate(BlockKind::File).unwrap();
        assert_eq!(
            append_entry(&mut pool, BlockId::ROOT, "over", child),
            Err(FsError::OutOfSpace)
        );
        assert_eq!(entry_count(&pool, BlockId::ROOT), Ok(DIRENTS_PER_BLOCK));
    }
}
