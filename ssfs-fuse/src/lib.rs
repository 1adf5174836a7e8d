//! 在宿主机上操作 ssfs 磁盘镜像：用普通文件模拟块设备。

use std::cell::RefCell;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use block_dev::{check_transfer, BlockDevice};
use send_wrapper::SendWrapper;
use ssfs::config::DIRECT_COUNT;
use ssfs::ShadowFileSystem;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Fs(#[from] ssfs::Error),
}

/// 把 `data` 存为文件 `name`，替换同名文件。
///
/// 删除旧文件之前先确认新内容放得下，容量或空闲块不足时旧文件保持原样。
pub fn put(fs: &mut ShadowFileSystem, name: &str, data: &[u8]) -> Result<(), Error> {
    let geometry = fs.geometry();
    let blocks = data.len().div_ceil(geometry.block_size);
    let max = geometry.max_file_blocks();
    if blocks > max {
        return Err(ssfs::Error::FileTooLarge { blocks, max }.into());
    }

    // 数据块加上可能的一级索引块，不指望旧文件释放的空间
    let needed = blocks + usize::from(blocks > DIRECT_COUNT);
    if needed > fs.free_blocks() {
        return Err(ssfs::Error::NoSpace.into());
    }

    if fs.file_size(name).is_ok() {
        fs.remove(name)?;
    }
    let fid = fs.open(name)?;
    fs.write(fid, data)?;
    fs.close(fid)?;

    log::info!("put {name:?}, {} bytes", data.len());
    Ok(())
}

/// 以镜像文件为后端的块设备
#[derive(Debug)]
pub struct BlockFile {
    block_size: usize,
    num_blocks: usize,
    inner: SendWrapper<RefCell<File>>,
}

impl BlockFile {
    /// 新建（或截断）镜像，长度为 `block_size * num_blocks` 字节，内容全零
    pub fn init_fresh_disk(
        path: impl AsRef<Path>,
        block_size: usize,
        num_blocks: usize,
    ) -> io::Result<Self> {
        let fd = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;
        fd.set_len((block_size * num_blocks) as u64)?;

        log::debug!(
            "created disk image {:?}: {num_blocks} blocks of {block_size} bytes",
            path.as_ref()
        );
        Ok(Self::new(fd, block_size, num_blocks))
    }

    /// 打开已有镜像，长度必须恰好为 `block_size * num_blocks` 字节
    pub fn init_disk(
        path: impl AsRef<Path>,
        block_size: usize,
        num_blocks: usize,
    ) -> io::Result<Self> {
        let fd = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())?;

        let len = fd.metadata()?.len();
        let expected = (block_size * num_blocks) as u64;
        if len != expected {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("disk image holds {len} bytes, expected {expected}"),
            ));
        }

        Ok(Self::new(fd, block_size, num_blocks))
    }

    /// 打开已有镜像，块数由文件长度推出
    pub fn open(path: impl AsRef<Path>, block_size: usize) -> io::Result<Self> {
        let len = fs::metadata(path.as_ref())?.len() as usize;
        if block_size == 0 || len % block_size != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{len} bytes is not a whole number of {block_size}-byte blocks"),
            ));
        }

        Self::init_disk(path, block_size, len / block_size)
    }

    fn new(fd: File, block_size: usize, num_blocks: usize) -> Self {
        Self {
            block_size,
            num_blocks,
            inner: SendWrapper::new(RefCell::new(fd)),
        }
    }

    #[inline]
    fn offset(&self, block_id: usize) -> SeekFrom {
        SeekFrom::Start((block_id * self.block_size) as u64)
    }
}

impl BlockDevice for BlockFile {
    #[inline]
    fn block_size(&self) -> usize {
        self.block_size
    }

    #[inline]
    fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    fn read_blocks(&self, start: usize, count: usize, buf: &mut [u8]) -> block_dev::Result<()> {
        check_transfer(self, start, count, buf.len())?;
        let mut file = self.inner.borrow_mut();
        file.seek(self.offset(start))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_blocks(&self, start: usize, count: usize, buf: &[u8]) -> block_dev::Result<()> {
        check_transfer(self, start, count, buf.len())?;
        let mut file = self.inner.borrow_mut();
        file.seek(self.offset(start))?;
        file.write_all(buf)?;
        Ok(())
    }
}
