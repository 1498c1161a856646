//! Deletion and reclamation of file and directory chains.

use alloc::{vec, vec::Vec};
use log::debug;

use crate::{
    dir,
    error::{FsError, Result},
    layout::BlockId,
    pool::BlockPool,
};

/// Unlink the regular file `name` from `parent` and free its data chain
pub fn remove_file(pool: &mut BlockPool, parent: BlockId, name: &str) -> Result<usize> {
    let (_, entry) = dir::find_entry(pool, parent, name)?.ok_or(FsError::NotFound)?;
    let child = entry.child();
    if pool.head(child)?.is_dir() {
        return Err(FsError::IsADirectory);
    }
    let chain = pool.chain(child)?;
    dir::remove_entry(pool, parent, name)?;
    pool.free_all(&chain)?;
    debug!("unlink {name} ({child}) from {parent}: freed {}", chain.len());
    Ok(chain.len())
}

/// Unlink the directory `name` from `parent` and free everything below it.
///
/// The subtree is walked depth first with an explicit stack, so tree depth never grows
/// the native call stack. Every block is collected and checked before the entry is
/// removed from `parent`; a damaged subtree is reported with nothing changed.
pub fn remove_directory(pool: &mut BlockPool, parent: BlockId, name: &str) -> Result<usize> {
    let (_, entry) = dir::find_entry(pool, parent, name)?.ok_or(FsError::NotFound)?;
    let child = entry.child();
    pool.dir(child)?;
    let doomed = subtree(pool, child)?;
    dir::remove_entry(pool, parent, name)?;
    pool.free_all(&doomed)?;
    debug!("rmdir {name} ({child}) from {parent}: freed {}", doomed.len());
    Ok(doomed.len())
}

/// Every block of every chain under the directory `root`, the directory's own included
fn subtree(pool: &BlockPool, root: BlockId) -> Result<Vec<BlockId>> {
    let mut seen = vec![false; pool.capacity()];
    let mut blocks = Vec::new();
    let mut stack = Vec::from([root]);
    while let Some(head) = stack.pop() {
        let block = pool.head(head)?;
        if block.is_dir() {
            for entry in dir::entries(pool, head)? {
                stack.push(entry?.child());
            }
        }
        for id in pool.chain(head)? {
            // a block shared between chains would be freed twice
            if core::mem::replace(&mut seen[id.slot()], true) {
                return Err(FsError::Corrupted);
            }
            blocks.push(id);
        }
    }
    Ok(blocks)
}
