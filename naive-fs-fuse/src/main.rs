#![deny(clippy::all)]
#![deny(clippy::pedantic)]

use clap::Parser;
use log::{info, warn};
use naive_fs::{FsConfig, FsError, Inode, NaiveFileSystem, CHAINED_POOL_CAPACITY};
use std::fs::{read, read_dir};
use std::io;
use std::path::Path;

mod logging;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Host directory to pack
    #[arg(short, long, default_value = "naive-fs-root")]
    root: String,

    /// Total blocks in the pool, reserved ones included
    #[arg(short, long, default_value_t = CHAINED_POOL_CAPACITY)]
    capacity: usize,

    /// Confine every file and directory to a single block
    #[arg(long)]
    flat: bool,
}

fn fs_error(err: FsError) -> io::Error {
    io::Error::other(err)
}

fn main() -> io::Result<()> {
    logging::init();
    let cli = Cli::parse();
    let root_path = Path::new(&cli.root);

    println!("Initializing the naive-fs pool...");
    let config = FsConfig::new(cli.capacity, !cli.flat);
    let fs = NaiveFileSystem::shared(config).map_err(fs_error)?;
    let root_inode = NaiveFileSystem::root_inode(&fs);

    println!("Packing files from {root_path:?} into the naive-fs pool...");
    pack_directory(&root_inode, root_path)?;

    println!("/");
    print_tree(&root_inode, 1)?;

    println!("Verifying packed files...");
    verify_directory(&root_inode, root_path)?;
    fs.read().verify().map_err(fs_error)?;

    let usage = fs.read().usage();
    println!(
        "{} of {} blocks busy, {} free",
        usage.busy, usage.capacity, usage.free
    );
    Ok(())
}

fn pack_directory(parent_inode: &Inode, path: &Path) -> io::Result<()> {
    for entry in read_dir(path)? {
        let entry_path = entry?.path();
        let Some(entry_name) = entry_path.file_name().and_then(|name| name.to_str()) else {
            warn!("skipping {}: name is not UTF-8", entry_path.display());
            continue;
        };

        if entry_name.starts_with('.') {
            continue;
        }

        let created = if entry_path.is_dir() {
            parent_inode.create_dir(entry_name)
        } else if entry_path.is_file() {
            parent_inode.create(entry_name)
        } else {
            continue;
        };
        let inode = match created {
            Ok(inode) => inode,
            Err(FsError::InvalidName) => {
                warn!("skipping {}: name does not fit", entry_path.display());
                continue;
            }
            Err(err) => return Err(fs_error(err)),
        };

        if entry_path.is_dir() {
            pack_directory(&inode, &entry_path)?;
        } else {
            let data = read(&entry_path)?;
            inode.write_at(0, &data).map_err(fs_error)?;
            info!("packed {} ({} bytes)", entry_path.display(), data.len());
        }
    }

    Ok(())
}

fn print_tree(dir_inode: &Inode, depth: usize) -> io::Result<()> {
    for (name, inode) in dir_inode.children().map_err(fs_error)? {
        let meta = inode.stat().map_err(fs_error)?;
        let indent = "  ".repeat(depth);
        if inode.is_dir() {
            println!("{indent}{name}/ [{} entries, {} blocks]", meta.size, meta.blocks);
            print_tree(&inode, depth + 1)?;
        } else {
            println!("{indent}{name} [{} bytes, {} blocks]", meta.size, meta.blocks);
        }
    }
    Ok(())
}

fn read_all(inode: &Inode) -> io::Result<Vec<u8>> {
    let mut buffer = [0u8; 512];
    let mut data = Vec::new();
    loop {
        let len = inode.read_at(data.len(), &mut buffer).map_err(fs_error)?;
        if len == 0 {
            break;
        }
        data.extend_from_slice(&buffer[..len]);
    }
    Ok(data)
}

fn verify_directory(dir_inode: &Inode, path: &Path) -> io::Result<()> {
    for (name, inode) in dir_inode.children().map_err(fs_error)? {
        let host_path = path.join(&name);
        if inode.is_dir() {
            verify_directory(&inode, &host_path)?;
        } else if read_all(&inode)? != read(&host_path)? {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} differs after packing", host_path.display()),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use naive_fs::BLOCK_SIZE;
    use std::fs::{create_dir_all, remove_dir_all, write};
    use std::path::PathBuf;

    fn random_bytes(len: usize) -> Vec<u8> {
        (0..len).map(|_| rand::random::<u8>()).collect()
    }

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("naive-fs-{}", rand::random::<u64>()));
        create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn nfs_test() {
        let fs = NaiveFileSystem::shared(FsConfig::chained()).unwrap();
        let root_inode = NaiveFileSystem::root_inode(&fs);

        // test create and ls
        root_inode.create("filea").unwrap();
        root_inode.create("fileb").unwrap();
        assert_eq!(root_inode.ls().unwrap(), ["filea", "fileb"]);

        // test find
        let filea = root_inode.find("filea").unwrap();

        // test write and read
        let greet_str = "Hello, world!";
        filea.write_at(0, greet_str.as_bytes()).unwrap();
        let mut buffer = [0u8; 233];
        let len = filea.read_at(0, &mut buffer).unwrap();
        assert_eq!(greet_str, core::str::from_utf8(&buffer[..len]).unwrap());

        // test clear
        filea.clear().unwrap();
        let len = filea.read_at(0, &mut buffer).unwrap();
        assert!(len == 0);

        // test random data
        let random_data_test = |len: usize| {
            filea.clear().unwrap();
            let data = random_bytes(len);
            assert_eq!(filea.write_at(0, &data), Ok(len));
            assert_eq!(read_all(&filea).unwrap(), data);
            fs.read().verify().unwrap();
        };

        random_data_test(4 * BLOCK_SIZE);
        random_data_test(8 * BLOCK_SIZE + BLOCK_SIZE / 2);
        random_data_test(70 * BLOCK_SIZE + BLOCK_SIZE / 7);
        random_data_test(BLOCK_SIZE / 3);
        // every allocatable block except fileb's
        random_data_test((CHAINED_POOL_CAPACITY - 3) * BLOCK_SIZE);
    }

    #[test]
    fn random_operations_keep_pool_consistent() {
        let fs = NaiveFileSystem::shared(FsConfig::chained()).unwrap();
        let root_inode = NaiveFileSystem::root_inode(&fs);
        let mut live: Vec<String> = Vec::new();

        for step in 0..500 {
            match rand::random::<u8>() % 3 {
                0 => {
                    let name = format!("f{step}");
                    match root_inode.create(&name) {
                        Ok(_) => live.push(name),
                        Err(err) => assert_eq!(err, FsError::OutOfSpace),
                    }
                }
                1 if !live.is_empty() => {
                    let name = &live[rand::random::<usize>() % live.len()];
                    let file = root_inode.find(name).unwrap();
                    let len = rand::random::<usize>() % (4 * BLOCK_SIZE);
                    let offset = rand::random::<usize>() % (2 * BLOCK_SIZE);
                    match file.write_at(offset, &random_bytes(len)) {
                        Ok(written) => assert_eq!(written, len),
                        Err(err) => assert_eq!(err, FsError::OutOfSpace),
                    }
                }
                _ if !live.is_empty() => {
                    let name = live.swap_remove(rand::random::<usize>() % live.len());
                    root_inode.unlink(&name).unwrap();
                }
                _ => {}
            }
            fs.read().verify().unwrap();
            assert_eq!(fs.read().list(naive_fs::BlockId::ROOT).unwrap().len(), live.len());
        }
    }

    #[test]
    fn pack_and_verify_host_tree() {
        let host = scratch_dir();
        create_dir_all(host.join("sub/deeper")).unwrap();
        let big = random_bytes(3 * BLOCK_SIZE + 17);
        write(host.join("big"), &big).unwrap();
        write(host.join("sub/small"), b"small").unwrap();
        write(host.join("sub/deeper/empty"), b"").unwrap();
        write(host.join("overlong_name"), b"skipped").unwrap();
        write(host.join(".hidden"), b"skipped").unwrap();

        let fs = NaiveFileSystem::shared(FsConfig::chained()).unwrap();
        let root_inode = NaiveFileSystem::root_inode(&fs);
        pack_directory(&root_inode, &host).unwrap();
        verify_directory(&root_inode, &host).unwrap();

        let mut names = root_inode.ls().unwrap();
        names.sort();
        assert_eq!(names, ["big", "sub"]);
        assert_eq!(read_all(&root_inode.find("big").unwrap()).unwrap(), big);
        fs.read().verify().unwrap();

        remove_dir_all(&host).unwrap();
    }
}
