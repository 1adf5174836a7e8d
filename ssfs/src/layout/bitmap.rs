use core::ops::Range;

use block_dev::BlockDevice;

use crate::layout::BlockId;

/// 单块位图，每个块号对应一位（字节内低位在前）。
///
/// - 空闲块位图(FBM)：`1` 表示空闲；
/// - 写掩码(WM)：`1` 表示可写，`0` 表示被某个影子引用而只读。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    /// 位图自身所在块
    block_id: usize,
    bytes: Vec<u8>,
}

impl Bitmap {
    /// 全零位图
    #[inline]
    pub fn new(block_id: usize, block_size: usize) -> Self {
        Self {
            block_id,
            bytes: vec![0; block_size],
        }
    }

    pub fn load(dev: &dyn BlockDevice, block_id: usize) -> block_dev::Result<Self> {
        let mut bitmap = Self::new(block_id, dev.block_size());
        dev.read_block(block_id, &mut bitmap.bytes)?;
        Ok(bitmap)
    }

    pub fn store(&self, dev: &dyn BlockDevice) -> block_dev::Result<()> {
        dev.write_block(self.block_id, &self.bytes)
    }

    #[inline]
    pub fn get(&self, bit: usize) -> bool {
        self.bytes[bit / 8] & (1 << (bit % 8)) != 0
    }

    #[inline]
    pub fn set(&mut self, bit: usize, value: bool) {
        if value {
            self.bytes[bit / 8] |= 1 << (bit % 8);
        } else {
            self.bytes[bit / 8] &= !(1 << (bit % 8));
        }
    }

    pub fn fill(&mut self, bits: Range<usize>, value: bool) {
        for bit in bits {
            self.set(bit, value);
        }
    }

    /// 线性扫描第一个置位的位
    pub fn first_set(&self) -> Option<BlockId> {
        self.bytes
            .iter()
            .enumerate()
            .find_map(|(index, &byte)| {
                (byte != 0).then(|| index * 8 + byte.trailing_zeros() as usize)
            })
            .map(|bit| BlockId::new(bit as u32))
    }

    #[inline]
    pub fn count_set(&self) -> usize {
        self.bytes.iter().map(|byte| byte.count_ones() as usize).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits() {
        let mut bitmap = Bitmap::new(0, 4);
        assert_eq!(None, bitmap.first_set());

        bitmap.fill(9..12, true);
        assert_eq!(3, bitmap.count_set());
        assert_eq!(Some(BlockId::new(9)), bitmap.first_set());
        assert_eq!(0b0000_1110, bitmap.bytes[1]);

        bitmap.set(9, false);
        assert!(!bitmap.get(9));
        assert_eq!(Some(BlockId::new(10)), bitmap.first_set());
    }
}
