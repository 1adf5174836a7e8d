#![allow(dead_code)]

use std::sync::Arc;

use block_dev::RamDisk;
use ssfs::ShadowFileSystem;

pub fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 默认形状的新卷：1024 个 1KiB 块，200 个文件槽位
pub fn default_volume() -> (Arc<RamDisk>, ShadowFileSystem) {
    volume(1024, 1024, 200)
}

pub fn volume(block_size: usize, num_blocks: usize, num_files: usize) -> (Arc<RamDisk>, ShadowFileSystem) {
    init_log();
    let disk = Arc::new(RamDisk::new(block_size, num_blocks));
    let fs = ShadowFileSystem::format(disk.clone(), num_files).unwrap();
    (disk, fs)
}

pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8 ^ seed).collect()
}

/// 从头读出整个文件
pub fn read_all(fs: &mut ShadowFileSystem, fid: usize) -> Vec<u8> {
    let size = fs.stat(fid).unwrap().size;
    let mut buf = vec![0; size];
    fs.seek_read(fid, 0).unwrap();
    assert_eq!(size, fs.read(fid, &mut buf).unwrap());
    buf
}
