use core::ops::Range;

use spin::Mutex;

use crate::{check_transfer, BlockDevice, Result};

/// 内存中的块设备，创建时全部清零
#[derive(Debug)]
pub struct RamDisk {
    block_size: usize,
    num_blocks: usize,
    bytes: Mutex<Vec<u8>>,
}

impl RamDisk {
    pub fn new(block_size: usize, num_blocks: usize) -> Self {
        log::trace!("ram disk: {num_blocks} blocks of {block_size} bytes");
        Self {
            block_size,
            num_blocks,
            bytes: Mutex::new(vec![0; block_size * num_blocks]),
        }
    }

    /// 整个设备内容的拷贝，便于比较两次操作之间的变化
    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes.lock().clone()
    }

    /// 块字节范围
    #[inline]
    fn span(&self, start: usize, count: usize) -> Range<usize> {
        start * self.block_size..(start + count) * self.block_size
    }
}

impl BlockDevice for RamDisk {
    #[inline]
    fn block_size(&self) -> usize {
        self.block_size
    }

    #[inline]
    fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    fn read_blocks(&self, start: usize, count: usize, buf: &mut [u8]) -> Result<()> {
        check_transfer(self, start, count, buf.len())?;
        buf.copy_from_slice(&self.bytes.lock()[self.span(start, count)]);
        Ok(())
    }

    fn write_blocks(&self, start: usize, count: usize, buf: &[u8]) -> Result<()> {
        check_transfer(self, start, count, buf.len())?;
        let span = self.span(start, count);
        self.bytes.lock()[span].copy_from_slice(buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn blocks_round_trip() {
        let disk = RamDisk::new(64, 8);
        let data: Vec<u8> = (0..128).map(|i| i as u8).collect();
        disk.write_blocks(3, 2, &data).unwrap();

        let mut buf = vec![0; 64];
        disk.read_block(4, &mut buf).unwrap();
        assert_eq!(&data[64..], &buf[..]);

        disk.read_block(2, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn rejects_bad_transfers() {
        let disk = RamDisk::new(64, 8);
        let mut buf = vec![0; 128];

        assert!(matches!(
            disk.read_blocks(7, 2, &mut buf),
            Err(Error::OutOfRange { start: 7, count: 2, num_blocks: 8 })
        ));
        assert!(matches!(
            disk.write_blocks(0, 1, &buf),
            Err(Error::BufferSize { expected: 64, actual: 128 })
        ));
        assert!(matches!(
            disk.read_blocks(usize::MAX, 2, &mut buf),
            Err(Error::OutOfRange { .. })
        ));
    }
}
