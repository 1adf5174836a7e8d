mod common;

use std::sync::Arc;

use block_dev::{BlockDevice, RamDisk};
use ssfs::{Cursors, Error, ErrorKind, ShadowFileSystem};

use common::*;

#[test]
fn round_trip() {
    let (_, mut fs) = default_volume();
    let max = fs.geometry().max_file_size();

    for (i, len) in [1, 1023, 1024, 1025, 14 * 1024, 14 * 1024 + 1, max]
        .into_iter()
        .enumerate()
    {
        let name = format!("file{i}");
        let data = pattern(len, i as u8);

        let fid = fs.open(&name).unwrap();
        assert_eq!(len, fs.write(fid, &data).unwrap());
        fs.seek_read(fid, 0).unwrap();

        let mut buf = vec![0; len];
        assert_eq!(len, fs.read(fid, &mut buf).unwrap());
        assert_eq!(data, buf, "{name} differs after a round trip");
    }
}

#[test]
fn partial_reads_advance_the_cursor() {
    let (_, mut fs) = default_volume();
    let data = pattern(3000, 1);
    let fid = fs.open("log").unwrap();
    fs.write(fid, &data).unwrap();

    fs.seek_read(fid, 1000).unwrap();
    let mut buf = [0; 1500];
    assert_eq!(1500, fs.read(fid, &mut buf).unwrap());
    assert_eq!(&data[1000..2500], &buf[..]);

    // 只剩 500 字节
    assert_eq!(500, fs.read(fid, &mut buf).unwrap());
    assert_eq!(&data[2500..], &buf[..500]);
    assert_eq!(0, fs.read(fid, &mut buf).unwrap());
    assert_eq!(3000, fs.cursors(fid).unwrap().read);
}

#[test]
fn empty_file_reads_nothing() {
    let (_, mut fs) = default_volume();
    let fid = fs.open("empty").unwrap();
    let mut buf = [0xAB; 8];
    assert_eq!(0, fs.read(fid, &mut buf).unwrap());
    assert_eq!([0xAB; 8], buf);
    assert_eq!(0, fs.write(fid, &[]).unwrap());
    assert_eq!(0, fs.stat(fid).unwrap().size);
}

#[test]
fn size_grows_only_past_the_end() {
    let (_, mut fs) = default_volume();
    let fid = fs.open("grow").unwrap();

    fs.write(fid, &pattern(100, 0)).unwrap();
    assert_eq!(100, fs.stat(fid).unwrap().size);

    // 覆盖中间：大小不变，写游标移到文件末尾
    fs.seek_write(fid, 50).unwrap();
    fs.write(fid, b"0123456789").unwrap();
    assert_eq!(100, fs.stat(fid).unwrap().size);
    assert_eq!(100, fs.cursors(fid).unwrap().write);

    // 跨过末尾：只增长超出的部分
    fs.seek_write(fid, 90).unwrap();
    fs.write(fid, &[7; 30]).unwrap();
    assert_eq!(120, fs.stat(fid).unwrap().size);

    let content = read_all(&mut fs, fid);
    assert_eq!(b"0123456789", &content[50..60]);
    assert_eq!([7; 30], content[90..]);
}

#[test]
fn reopen_appends() {
    let (_, mut fs) = default_volume();
    let fid = fs.open("notes").unwrap();
    fs.write(fid, b"hello").unwrap();
    fs.close(fid).unwrap();

    assert_eq!(fid, fs.open("notes").unwrap());
    assert_eq!(Cursors { read: 0, write: 5 }, fs.cursors(fid).unwrap());
    fs.write(fid, b" world").unwrap();
    assert_eq!(b"hello world".to_vec(), read_all(&mut fs, fid));
}

#[test]
fn allocator_exhaustion() {
    let (_, mut fs) = volume(512, 64, 8);
    let free = fs.free_blocks();

    for _ in 0..free {
        fs.allocate_block().unwrap();
    }
    assert_eq!(0, fs.free_blocks());

    let err = fs.allocate_block().unwrap_err();
    assert!(matches!(err, Error::NoSpace));
    assert_eq!(ErrorKind::Exhausted, err.kind());

    let fid = fs.open("late").unwrap();
    assert!(matches!(fs.write(fid, b"x"), Err(Error::NoSpace)));
    assert_eq!(0, fs.stat(fid).unwrap().size);
}

#[test]
fn remove_frees_space() {
    let (_, mut fs) = volume(512, 64, 8);
    let free = fs.free_blocks();
    // 一块留给一级索引
    let data = pattern((free - 1) * 512, 3);

    let fid = fs.open("big").unwrap();
    fs.write(fid, &data).unwrap();
    assert_eq!(0, fs.free_blocks());

    let other = fs.open("other").unwrap();
    assert!(matches!(fs.write(other, b"!"), Err(Error::NoSpace)));

    fs.remove("big").unwrap();
    assert_eq!(free, fs.free_blocks());

    let fid = fs.open("again").unwrap();
    fs.write(fid, &data).unwrap();
    assert_eq!(data, read_all(&mut fs, fid));
}

#[test]
fn write_running_out_midway() {
    let (_, mut fs) = volume(512, 64, 8);
    let original = pattern(1024, 8);
    let fid = fs.open("grow").unwrap();
    fs.write(fid, &original).unwrap();

    // 再占掉空间，只剩 4 块
    let fill = fs.open("fill").unwrap();
    let blocks = fs.free_blocks() - 4 - 1;
    fs.write(fill, &pattern(blocks * 512, 1)).unwrap();
    assert_eq!(4, fs.free_blocks());

    // 从 2 块长到 10 块需要 8 个新块
    let err = fs.write(fid, &pattern(8 * 512, 2)).unwrap_err();
    assert!(matches!(err, Error::NoSpace));
    assert_eq!(1024, fs.stat(fid).unwrap().size);
    assert_eq!(1024, fs.cursors(fid).unwrap().write);
    assert_eq!(original, read_all(&mut fs, fid));
    // 已经写出的新块没有链接到任何文件
    assert_eq!(0, fs.free_blocks());

    fs.commit().unwrap();
    assert_eq!(4, fs.free_blocks());
}

#[test]
fn indirection_boundary() {
    let (_, mut fs) = default_volume();
    let fid = fs.open("edge").unwrap();

    fs.write(fid, &pattern(14 * 1024, 0)).unwrap();
    let stat = fs.stat(fid).unwrap();
    assert!(!stat.indirect);
    assert_eq!(14, stat.blocks);

    let free = fs.free_blocks();
    fs.write(fid, b"+").unwrap();
    let stat = fs.stat(fid).unwrap();
    assert!(stat.indirect);
    assert_eq!(14 * 1024 + 1, stat.size);
    assert_eq!(16, stat.blocks);
    assert_eq!(free - 2, fs.free_blocks());
}

#[test]
fn capacity_ceiling() {
    let (_, mut fs) = default_volume();
    let max = fs.geometry().max_file_size();
    let fid = fs.open("huge").unwrap();

    let err = fs.write(fid, &vec![1; max + 1]).unwrap_err();
    assert!(matches!(err, Error::FileTooLarge { blocks: 271, max: 270 }));
    assert_eq!(0, fs.stat(fid).unwrap().size);

    fs.write(fid, &vec![1; max]).unwrap();
    assert!(matches!(fs.write(fid, b"x"), Err(Error::FileTooLarge { .. })));
    assert_eq!(max, fs.stat(fid).unwrap().size);
}

#[test]
fn open_is_unique_per_name() {
    let (_, mut fs) = default_volume();
    let a = fs.open("same").unwrap();
    let b = fs.open("same").unwrap();
    assert_eq!(a, b);
    assert_eq!(vec![(a, "same")], fs.files().collect::<Vec<_>>());

    let c = fs.open("different").unwrap();
    assert_ne!(a, c);
}

#[test]
fn invalid_names_change_nothing() {
    let (_, mut fs) = default_volume();
    for name in ["", "this-is-too-long", "a\0b"] {
        let err = fs.open(name).unwrap_err();
        assert!(matches!(err, Error::InvalidName(_)));
        assert_eq!(ErrorKind::InvalidArgument, err.kind());
    }
    assert_eq!(0, fs.files().count());
}

#[test]
fn directory_full() {
    let (_, mut fs) = volume(512, 64, 8);
    for i in 0..8 {
        assert_eq!(i, fs.open(&format!("f{i}")).unwrap());
    }
    assert!(matches!(fs.open("ninth"), Err(Error::DirectoryFull)));

    // 删除后槽位可复用
    fs.remove("f3").unwrap();
    assert_eq!(3, fs.open("ninth").unwrap());
}

#[test]
fn cursor_errors() {
    let (_, mut fs) = default_volume();
    let fid = fs.open("f").unwrap();
    fs.write(fid, b"abc").unwrap();

    assert!(matches!(fs.seek_read(fid, 4), Err(Error::SeekOutOfRange { pos: 4, size: 3 })));
    assert!(matches!(fs.seek_write(fid, 4), Err(Error::SeekOutOfRange { .. })));
    fs.seek_read(fid, 3).unwrap();
    assert_eq!(3, fs.cursors(fid).unwrap().read);

    fs.close(fid).unwrap();
    assert!(matches!(fs.close(fid), Err(Error::NotOpen(_))));
    assert!(matches!(fs.read(fid, &mut [0; 3]), Err(Error::NotOpen(_))));
    assert!(matches!(fs.write(fid, b"x"), Err(Error::NotOpen(_))));
    assert!(matches!(fs.seek_read(fid, 0), Err(Error::NotOpen(_))));

    assert!(matches!(fs.close(200), Err(Error::BadFileId(200))));
    assert!(matches!(fs.stat(1), Err(Error::BadFileId(1))));
}

#[test]
fn remove_resets_the_slot() {
    let (_, mut fs) = default_volume();
    let fid = fs.open("gone").unwrap();
    fs.write(fid, &pattern(2048, 0)).unwrap();

    fs.remove("gone").unwrap();
    assert!(matches!(fs.cursors(fid), Err(Error::NotOpen(_))));
    assert!(matches!(fs.file_size("gone"), Err(Error::NotFound(_))));

    let err = fs.remove("gone").unwrap_err();
    assert_eq!(ErrorKind::NotFound, err.kind());

    let fid = fs.open("gone").unwrap();
    assert_eq!(0, fs.stat(fid).unwrap().size);
}

#[test]
fn directory_listing() {
    let (_, mut fs) = default_volume();
    for name in ["a", "b", "c"] {
        let fid = fs.open(name).unwrap();
        fs.write(fid, name.as_bytes()).unwrap();
    }
    fs.remove("b").unwrap();

    assert_eq!(Some((0, "a")), fs.next_file_name(0));
    assert_eq!(Some((2, "c")), fs.next_file_name(1));
    assert_eq!(None, fs.next_file_name(3));
    assert_eq!(1, fs.file_size("c").unwrap());
}

#[test]
fn survives_remount() {
    let (disk, mut fs) = default_volume();
    let data = pattern(20 * 1024, 9);
    let fid = fs.open("kept").unwrap();
    fs.write(fid, &data).unwrap();
    fs.open("empty").unwrap();
    let free = fs.free_blocks();
    drop(fs);

    let mut fs = ShadowFileSystem::mount(disk, false).unwrap();
    assert_eq!(free, fs.free_blocks());
    assert_eq!(vec![(0, "kept"), (1, "empty")], fs.files().collect::<Vec<_>>());
    // 打开文件表不落盘
    assert!(matches!(fs.cursors(fid), Err(Error::NotOpen(_))));

    let fid = fs.open("kept").unwrap();
    assert_eq!(data, read_all(&mut fs, fid));
}

#[test]
fn fresh_mount_erases() {
    let (disk, mut fs) = default_volume();
    fs.open("old").unwrap();
    drop(fs);

    let fs = ShadowFileSystem::mount(disk, true).unwrap();
    assert_eq!(0, fs.files().count());
}

#[test]
fn unformatted_device() {
    init_log();
    let disk = Arc::new(RamDisk::new(1024, 64));
    let err = ShadowFileSystem::load(disk).unwrap_err();
    assert!(matches!(err, Error::Layout(_)));
    assert_eq!(ErrorKind::Corruption, err.kind());
}

#[test]
fn unusable_device_shape() {
    init_log();
    let disk = Arc::new(RamDisk::new(1000, 64));
    assert!(matches!(ShadowFileSystem::mount(disk, true), Err(Error::Geometry(_))));
}

#[test]
fn unassigned_block_is_corruption() {
    let (disk, mut fs) = default_volume();
    let fid = fs.open("f").unwrap();
    fs.write(fid, &pattern(2048, 0)).unwrap();
    drop(fs);

    // 格式化后 inode 表紧跟超级块，0 号文件的 direct[1] 位于第 1 块偏移 8 处
    let mut block = vec![0; 1024];
    disk.read_block(1, &mut block).unwrap();
    block[8..12].copy_from_slice(&(-1i32).to_le_bytes());
    disk.write_block(1, &block).unwrap();

    let mut fs = ShadowFileSystem::load(disk).unwrap();
    let fid = fs.open("f").unwrap();
    let err = fs.read(fid, &mut [0; 16]).unwrap_err();
    assert!(matches!(err, Error::Corruption { index: 1, size: 2048 }));
    assert_eq!(ErrorKind::Corruption, err.kind());
    assert_eq!(0, fs.cursors(fid).unwrap().read);
}

#[test]
fn out_of_range_block_is_corruption() {
    let (disk, mut fs) = default_volume();
    let fid = fs.open("f").unwrap();
    fs.write(fid, &pattern(2048, 0)).unwrap();
    fs.open("other").unwrap();
    drop(fs);

    // 把 0 号文件的 direct[1] 指到设备之外
    let mut block = vec![0; 1024];
    disk.read_block(1, &mut block).unwrap();
    block[8..12].copy_from_slice(&100_000i32.to_le_bytes());
    disk.write_block(1, &block).unwrap();

    let mut fs = ShadowFileSystem::load(disk).unwrap();
    let free = fs.free_blocks();
    let corrupt = |err: Error| matches!(err, Error::Corruption { index: 1, size: 2048 });

    assert!(corrupt(fs.commit().unwrap_err()));
    assert_eq!(None, fs.last_shadow());
    assert!(corrupt(fs.remove("f").unwrap_err()));
    assert!(corrupt(fs.stat(0).unwrap_err()));
    let fid = fs.open("f").unwrap();
    assert!(corrupt(fs.read(fid, &mut [0; 16]).unwrap_err()));

    // 其余文件照常可用
    assert_eq!(free, fs.free_blocks());
    let other = fs.open("other").unwrap();
    fs.write(other, b"still fine").unwrap();
    assert_eq!(b"still fine".to_vec(), read_all(&mut fs, other));
}
