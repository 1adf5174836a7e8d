//! # 块设备接口层
//!
//! 块设备是以**块**为单位存储数据的设备，[`BlockDevice`] 就是对读写块设备的抽象，
//! 实现了此特质的类型称为**块设备驱动**。
//!
//! 块设备的几何形状（块大小、块数）在创建时确定，之后不再改变；
//! 所有读写都以整块为单位，不支持块内的部分读写。

use core::any::Any;
use core::fmt::Debug;

mod error;
mod ram_disk;

pub use self::{
    error::{Error, Result},
    ram_disk::RamDisk,
};

/// 块设备驱动特质
///
/// `start`/`count` 描述一段连续的块，`buf` 的长度必须恰好为 `count * block_size`。
pub trait BlockDevice: Send + Sync + Any + Debug {
    /// 单个块的字节数
    fn block_size(&self) -> usize;

    /// 设备上块的总数，可寻址范围为 `[0, num_blocks)`
    fn num_blocks(&self) -> usize;

    fn read_blocks(&self, start: usize, count: usize, buf: &mut [u8]) -> Result<()>;

    fn write_blocks(&self, start: usize, count: usize, buf: &[u8]) -> Result<()>;

    #[inline]
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<()> {
        self.read_blocks(block_id, 1, buf)
    }

    #[inline]
    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<()> {
        self.write_blocks(block_id, 1, buf)
    }
}

/// 校验一次块传输的参数，供各驱动在真正读写前调用。
pub fn check_transfer(
    dev: &(impl BlockDevice + ?Sized),
    start: usize,
    count: usize,
    buf_len: usize,
) -> Result<()> {
    let num_blocks = dev.num_blocks();
    if start.checked_add(count).is_none_or(|end| end > num_blocks) {
        return Err(Error::OutOfRange {
            start,
            count,
            num_blocks,
        });
    }

    let expected = count * dev.block_size();
    if buf_len != expected {
        return Err(Error::BufferSize {
            expected,
            actual: buf_len,
        });
    }

    Ok(())
}
