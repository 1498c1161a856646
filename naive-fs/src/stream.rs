//! File stream: byte-addressed access to a file chain.
//!
//! A write sets the file size to the end of that write and frees every chain block
//! past it. Overwriting the start of a longer file therefore drops the old tail; use
//! [`append`] to extend a file without touching what is already there.

use log::{debug, trace};

use crate::{
    config::{file_blocks, BLOCK_SIZE},
    error::{FsError, Result},
    layout::BlockId,
    pool::BlockPool,
};

/// Recorded byte length of a file
pub fn file_size(pool: &BlockPool, file: BlockId) -> Result<usize> {
    Ok(pool.file(file)?.size)
}

/// Read data from a file chain into `buf`, returning how many bytes were copied.
///
/// Reading at or past the end yields `0`; a request crossing the end is clamped.
pub fn read_at(pool: &BlockPool, file: BlockId, offset: usize, buf: &mut [u8]) -> Result<usize> {
    let size = file_size(pool, file)?;
    let end = offset.saturating_add(buf.len()).min(size);
    if offset >= end {
        return Ok(0);
    }
    let mut block = pool.nth(file, offset / BLOCK_SIZE)?;
    let mut start = offset;
    let mut read_size = 0usize;

    loop {
        // calculate end of current block
        let end_current_block = ((start / BLOCK_SIZE + 1) * BLOCK_SIZE).min(end);

        // read and update read size
        let block_read_size = end_current_block - start;
        let data = &pool.get(block)?.data;
        let src = &data[start % BLOCK_SIZE..start % BLOCK_SIZE + block_read_size];
        buf[read_size..read_size + block_read_size].copy_from_slice(src);
        read_size += block_read_size;

        // move to next block
        if end_current_block == end {
            break;
        }
        start = end_current_block;
        block = pool.get(block)?.next.ok_or_else(|| {
            log::error!("file {file}: chain ends before recorded size {size}");
            FsError::Corrupted
        })?;
    }
    Ok(read_size)
}

/// Write `buf` at `offset`, growing the chain as needed.
///
/// On success the size becomes `offset + buf.len()`. If the pool runs dry part way,
/// the bytes already copied stay, the size covers exactly that prefix, and
/// [`FsError::OutOfSpace`] is returned. An empty `buf` changes nothing.
pub fn write_at(pool: &mut BlockPool, file: BlockId, offset: usize, buf: &[u8]) -> Result<usize> {
    let size = file_size(pool, file)?;
    if buf.is_empty() {
        return Ok(0);
    }
    offset.checked_add(buf.len()).ok_or(FsError::InvalidOffset)?;
    if offset > size {
        zero_range(pool, file, size, offset)?;
    }

    let mut written = 0usize;
    let result = copy_in(pool, file, offset, buf, &mut written);
    let new_size = if written == 0 { size } else { offset + written };
    pool.get_mut(file)?.size = new_size;
    let freed = pool.trim_chain(file, file_blocks(new_size))?;
    debug!("file {file}: wrote {written} bytes at {offset}, size {new_size}, freed {freed}");
    result.map(|()| written)
}

/// Write `buf` after the current end of the file
pub fn append(pool: &mut BlockPool, file: BlockId, buf: &[u8]) -> Result<usize> {
    let size = file_size(pool, file)?;
    write_at(pool, file, size, buf)
}

/// Shrink a file to `len` bytes and release the blocks it no longer needs
pub fn truncate(pool: &mut BlockPool, file: BlockId, len: usize) -> Result<usize> {
    if len > file_size(pool, file)? {
        return Err(FsError::InvalidOffset);
    }
    pool.get_mut(file)?.size = len;
    let freed = pool.trim_chain(file, file_blocks(len))?;
    trace!("file {file}: truncated to {len}, freed {freed}");
    Ok(freed)
}

fn copy_in(
    pool: &mut BlockPool,
    file: BlockId,
    offset: usize,
    buf: &[u8],
    written: &mut usize,
) -> Result<()> {
    let end = offset + buf.len();
    let mut block = file;
    for _ in 0..offset / BLOCK_SIZE {
        block = pool.next_or_grow(block)?;
    }
    let mut start = offset;

    loop {
        // calculate end of current block
        let end_current_block = ((start / BLOCK_SIZE + 1) * BLOCK_SIZE).min(end);

        // write and update write size
        let block_write_size = end_current_block - start;
        let src = &buf[*written..*written + block_write_size];
        let data = &mut pool.get_mut(block)?.data;
        data[start % BLOCK_SIZE..start % BLOCK_SIZE + block_write_size].copy_from_slice(src);
        *written += block_write_size;

        // move to next block
        if end_current_block == end {
            return Ok(());
        }
        start = end_current_block;
        block = pool.next_or_grow(block)?;
    }
}

/// Zero `[from, to)` wherever the existing chain covers it; newly allocated blocks are
/// already zeroed
fn zero_range(pool: &mut BlockPool, file: BlockId, from: usize, to: usize) -> Result<()> {
    let chain = pool.chain(file)?;
    let mut start = from;
    for &id in chain.iter().skip(from / BLOCK_SIZE) {
        if start >= to {
            break;
        }
        let end_current_block = ((start / BLOCK_SIZE + 1) * BLOCK_SIZE).min(to);
        let len = end_current_block - start;
        pool.get_mut(id)?.data[start % BLOCK_SIZE..start % BLOCK_SIZE + len].fill(0);
        start = end_current_block;
    }
    Ok(())
}
