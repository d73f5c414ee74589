//! Filesystem operations against the durable redb backend.

use std::sync::Arc;
use std::thread;

use tempfile::TempDir;
use vtfs_core::Errno;
use vtfs_core::ROOT_INODE;
use vtfs_redb_storage::RedbBackend;
use vtfs_service::FileSystemService;

fn open(dir: &TempDir) -> FileSystemService<RedbBackend> {
    let backend = RedbBackend::open(dir.path().join("vtfs.redb")).unwrap();
    FileSystemService::new(Arc::new(backend))
}

#[test]
fn test_scenario_survives_restart() {
    let temp_dir = TempDir::new().unwrap();
    let file_ino = {
        let fs = open(&temp_dir);
        fs.init("tok").unwrap();
        let dir = fs.create_dir("tok", ROOT_INODE, "dir", 0o755).unwrap();
        let file = fs.create_file("tok", dir.ino, "f.txt", 0o644).unwrap();
        fs.write("tok", file.ino, b"hello", 5, 0).unwrap();
        file.ino
    };

    let fs = open(&temp_dir);
    assert_eq!(fs.read("tok", file_ino, 5, 0).unwrap(), b"hello");
    assert_eq!(fs.count_links("tok", file_ino).unwrap(), 1);

    let (dirent, next) = fs.iterate_dir("tok", ROOT_INODE, 0).unwrap();
    assert_eq!(dirent.name, "dir");
    assert_eq!(fs.iterate_dir("tok", ROOT_INODE, next).unwrap_err().errno(), Errno::Enoent);

    // Counter persisted as well.
    let next_file = fs.create_file("tok", ROOT_INODE, "g", 0o644).unwrap();
    assert_eq!(next_file.ino, file_ino + 1);
}

#[test]
fn test_unlink_and_rmdir() {
    let temp_dir = TempDir::new().unwrap();
    let fs = open(&temp_dir);
    fs.init("tok").unwrap();

    let d = fs.create_dir("tok", ROOT_INODE, "d", 0o755).unwrap();
    let f = fs.create_file("tok", d.ino, "f", 0o644).unwrap();
    fs.link("tok", f.ino, ROOT_INODE, "alias").unwrap();
    assert_eq!(fs.rmdir("tok", ROOT_INODE, "d").unwrap_err().errno(), Errno::Enotempty);

    fs.unlink("tok", d.ino, "f").unwrap();
    assert_eq!(fs.count_links("tok", f.ino).unwrap(), 1);
    fs.rmdir("tok", ROOT_INODE, "d").unwrap();

    fs.unlink("tok", ROOT_INODE, "alias").unwrap();
    assert_eq!(fs.count_links("tok", f.ino).unwrap_err().errno(), Errno::Enoent);
    assert_eq!(fs.rmdir("tok", ROOT_INODE, ".").unwrap_err().errno(), Errno::Eperm);
}

#[test]
fn test_concurrent_get_root_creates_one_namespace() {
    let temp_dir = TempDir::new().unwrap();
    let fs = open(&temp_dir);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let fs = fs.clone();
            thread::spawn(move || fs.get_root("shared").unwrap())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap().ino, ROOT_INODE);
    }

    assert_eq!(fs.count_links("shared", ROOT_INODE).unwrap(), 1);
    assert_eq!(fs.create_file("shared", ROOT_INODE, "f", 0o644).unwrap().ino, ROOT_INODE + 1);
}

#[test]
fn test_concurrent_links_do_not_lose_updates() {
    let temp_dir = TempDir::new().unwrap();
    let fs = open(&temp_dir);
    fs.init("tok").unwrap();
    let file = fs.create_file("tok", ROOT_INODE, "f", 0o644).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let fs = fs.clone();
            thread::spawn(move || fs.link("tok", file.ino, ROOT_INODE, &format!("link-{i}")).unwrap())
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(fs.count_links("tok", file.ino).unwrap(), 9);
}

#[test]
fn test_concurrent_creates_same_name_one_wins() {
    let temp_dir = TempDir::new().unwrap();
    let fs = open(&temp_dir);
    fs.init("tok").unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let fs = fs.clone();
            thread::spawn(move || fs.create_file("tok", ROOT_INODE, "race", 0o644))
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        match handle.join().unwrap() {
            Ok(_) => created += 1,
            Err(err) => assert_eq!(err.errno(), Errno::Eexist),
        }
    }
    assert_eq!(created, 1);
}
