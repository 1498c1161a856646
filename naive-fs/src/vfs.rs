use alloc::{string::String, sync::Arc, vec::Vec};
use spin::RwLock;

use crate::{
    error::Result,
    filesystem::{Metadata, NaiveFileSystem},
    layout::{BlockId, BlockKind},
};

/// Virtual filesystem layer over naive-fs.
///
/// Every call takes the file system lock for its whole duration: the write lock for
/// anything that allocates, links or frees blocks, the read lock otherwise.
#[derive(Clone)]
pub struct Inode {
    block_id: BlockId,
    fs: Arc<RwLock<NaiveFileSystem>>,
}

impl Inode {
    /// Create an Inode
    #[inline]
    pub fn new(block_id: BlockId, fs: Arc<RwLock<NaiveFileSystem>>) -> Self {
        Self { block_id, fs }
    }

    fn with(&self, block_id: BlockId) -> Self {
        Self::new(block_id, Arc::clone(&self.fs))
    }

    /// Find inode under current inode by name
    pub fn find(&self, name: &str) -> Result<Inode> {
        let id = self.fs.read().lookup(self.block_id, name)?;
        Ok(self.with(id))
    }

    /// Create inode under current inode by name
    pub fn create_inode(&self, name: &str, kind: BlockKind) -> Result<Inode> {
        let id = self.fs.write().create(self.block_id, name, kind)?;
        Ok(self.with(id))
    }

    /// Create regular file under current inode
    pub fn create(&self, name: &str) -> Result<Inode> {
        self.create_inode(name, BlockKind::File)
    }

    /// Create directory under current inode
    pub fn create_dir(&self, name: &str) -> Result<Inode> {
        self.create_inode(name, BlockKind::Directory)
    }

    /// Names of the entries under current inode
    pub fn ls(&self) -> Result<Vec<String>> {
        let fs = self.fs.read();
        Ok(fs
            .list(self.block_id)?
            .iter()
            .map(|entry| String::from(entry.name()))
            .collect())
    }

    /// Entries under current inode as `(name, inode)` pairs
    pub fn children(&self) -> Result<Vec<(String, Inode)>> {
        let entries = self.fs.read().list(self.block_id)?;
        Ok(entries
            .iter()
            .map(|entry| (String::from(entry.name()), self.with(entry.child())))
            .collect())
    }

    /// Read data from current inode
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<usize> {
        self.fs.read().read_at(self.block_id, offset, buf)
    }

    /// Write data to current inode
    pub fn write_at(&self, offset: usize, buf: &[u8]) -> Result<usize> {
        self.fs.write().write(self.block_id, offset, buf)
    }

    /// Append data to current inode
    pub fn append(&self, buf: &[u8]) -> Result<usize> {
        self.fs.write().append(self.block_id, buf)
    }

    /// Shrink current inode to `len` bytes
    pub fn truncate(&self, len: usize) -> Result<()> {
        self.fs.write().truncate(self.block_id, len)
    }

    /// Clear the data in current inode
    pub fn clear(&self) -> Result<()> {
        self.truncate(0)
    }

    /// Delete the regular file `name` under current inode
    pub fn unlink(&self, name: &str) -> Result<()> {
        self.fs.write().unlink(self.block_id, name)
    }

    /// Delete the directory `name` under current inode, recursively
    pub fn rmdir(&self, name: &str) -> Result<()> {
        self.fs.write().rmdir(self.block_id, name)
    }

    /// Attributes of current inode
    pub fn stat(&self) -> Result<Metadata> {
        self.fs.read().stat(self.block_id)
    }

    /// Get `inode_id`
    #[inline]
    pub fn inode_id(&self) -> u32 {
        self.block_id.raw()
    }

    /// Head block of current inode
    #[inline]
    pub fn block_id(&self) -> BlockId {
        self.block_id
    }

    /// Get file size
    pub fn file_size(&self) -> Result<usize> {
        self.stat().map(|meta| meta.size)
    }

    /// Whether this inode is a directory
    pub fn is_dir(&self) -> bool {
        self.stat()
            .is_ok_and(|meta| meta.kind == BlockKind::Directory)
    }

    /// Whether this inode is a file
    pub fn is_file(&self) -> bool {
        self.stat().is_ok_and(|meta| meta.kind == BlockKind::File)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::FsConfig, error::FsError};
    use std::thread;

    #[test]
    fn inode_roundtrip() {
        let fs = NaiveFileSystem::shared(FsConfig::chained()).unwrap();
        let root = NaiveFileSystem::root_inode(&fs);
        assert_eq!(root.inode_id(), 1);
        assert!(root.is_dir());

        let bin = root.create_dir("bin").unwrap();
        let sh = bin.create("sh").unwrap();
        assert!(sh.is_file());
        assert_eq!(sh.write_at(0, b"#!/bin/sh"), Ok(9));
        assert_eq!(root.find("bin").unwrap().find("sh").unwrap().inode_id(), sh.inode_id());

        let mut buf = [0u8; 32];
        let len = sh.read_at(0, &mut buf).unwrap();
        assert_eq!(&buf[..len], b"#!/bin/sh");

        sh.clear().unwrap();
        assert_eq!(sh.file_size(), Ok(0));
        assert_eq!(sh.read_at(0, &mut buf), Ok(0));

        assert_eq!(root.ls().unwrap(), ["bin"]);
        root.rmdir("bin").unwrap();
        assert!(root.ls().unwrap().is_empty());
        assert_eq!(sh.file_size(), Err(FsError::InvalidBlock));
        fs.read().verify().unwrap();
    }

    #[test]
    fn concurrent_creators_never_share_blocks() {
        let fs = NaiveFileSystem::shared(FsConfig::chained()).unwrap();
        let root = NaiveFileSystem::root_inode(&fs);
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let dir = root.create_dir(&format!("t{t}")).unwrap();
                thread::spawn(move || {
                    for i in 0..20 {
                        let file = dir.create(&format!("f{i}")).unwrap();
                        file.write_at(0, &[t as u8; 100]).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let guard = fs.read();
        guard.verify().unwrap();
        assert_eq!(guard.usage().busy, 1 + 4 + 4 * 20);
        drop(guard);
        for (name, dir) in root.children().unwrap() {
            assert_eq!(dir.ls().unwrap().len(), 20, "{name}");
        }
    }

    #[test]
    fn handle_kept_after_unlink_stays_dead() {
        let fs = NaiveFileSystem::shared(FsConfig::chained()).unwrap();
        let root = NaiveFileSystem::root_inode(&fs);
        let a = root.create("a").unwrap();
        let b = root.create("b").unwrap();
        root.unlink("a").unwrap();

        // b grows into the slot a used to own
        b.write_at(0, &[9u8; 1024]).unwrap();
        assert_eq!(a.write_at(0, b"oops"), Err(FsError::InvalidBlock));
        assert!(!a.is_file());

        let mut buf = [0u8; 1024];
        assert_eq!(b.read_at(0, &mut buf), Ok(1024));
        assert!(buf.iter().all(|&byte| byte == 9));
        fs.read().verify().unwrap();

        // a new file in the same slot is not reachable through the old handle
        b.clear().unwrap();
        let c = root.create("c").unwrap();
        assert_eq!(c.inode_id(), a.inode_id());
        assert_eq!(a.file_size(), Err(FsError::InvalidBlock));
        assert_eq!(c.file_size(), Ok(0));
    }
}
