//! Constants and volume geometry used by ssfs

use block_dev::BlockDevice;

use crate::layout::{DirEntry, DiskInode, SuperBlock, POINTER_SIZE};
use crate::{Error, Result};

pub const BLOCK_SIZE: usize = 1024;
pub const NUM_BLOCKS: usize = 1024;
/// 目录与 inode 表共用的槽位数，即文件数上限
pub const NUM_FILES: usize = 200;

/// 每个 inode 的直接索引个数
pub const DIRECT_COUNT: usize = 14;
/// 超级块中影子根节点环的长度
pub const SHADOW_COUNT: usize = 4;

/// 超级块、FBM、WM 之外的块都由位图管理
const RESERVED_BLOCKS: usize = 3;

/// 卷的几何形状：块大小、块数、文件槽位数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub block_size: usize,
    pub num_blocks: usize,
    pub num_files: usize,
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new(BLOCK_SIZE, NUM_BLOCKS, NUM_FILES)
    }
}

impl Geometry {
    #[inline]
    pub const fn new(block_size: usize, num_blocks: usize, num_files: usize) -> Self {
        Self {
            block_size,
            num_blocks,
            num_files,
        }
    }

    /// 以块设备自身的形状格式化
    #[inline]
    pub fn of_device(dev: &dyn BlockDevice, num_files: usize) -> Self {
        Self::new(dev.block_size(), dev.num_blocks(), num_files)
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 || self.block_size % DiskInode::SIZE != 0 {
            return Err(Error::Geometry("block size must be a multiple of the inode size"));
        }
        if self.block_size < SuperBlock::SIZE {
            return Err(Error::Geometry("block size cannot hold the superblock"));
        }
        if self.num_blocks > self.block_size * 8 {
            return Err(Error::Geometry("free block bitmap does not fit in one block"));
        }
        if self.num_files == 0 || i32::try_from(self.num_blocks).is_err() {
            return Err(Error::Geometry("file and block counts must be positive and fit in i32"));
        }
        if i32::try_from(self.max_file_size()).is_err() {
            return Err(Error::Geometry("largest file size does not fit in i32"));
        }
        if self.metadata_blocks() > self.max_file_blocks() {
            return Err(Error::Geometry("inode table and directory exceed one inode's reach"));
        }

        // 元数据区、可能的一级索引块，外加至少一个数据块
        let root_indirect = usize::from(self.metadata_blocks() > DIRECT_COUNT);
        if RESERVED_BLOCKS + self.metadata_blocks() + root_indirect + 1 > self.num_blocks {
            return Err(Error::Geometry("device too small for the metadata region"));
        }

        Ok(())
    }

    /// inode 表占据的块数
    #[inline]
    pub fn inode_table_blocks(&self) -> usize {
        (self.num_files * DiskInode::SIZE).div_ceil(self.block_size)
    }

    /// 根目录占据的块数
    #[inline]
    pub fn directory_blocks(&self) -> usize {
        (self.num_files * DirEntry::SIZE).div_ceil(self.block_size)
    }

    /// 根 inode 所指向的元数据文件：inode 表 + 目录
    #[inline]
    pub fn metadata_blocks(&self) -> usize {
        self.inode_table_blocks() + self.directory_blocks()
    }

    #[inline]
    pub fn inodes_per_block(&self) -> usize {
        self.block_size / DiskInode::SIZE
    }

    #[inline]
    pub fn entries_per_block(&self) -> usize {
        self.block_size / DirEntry::SIZE
    }

    /// 一级索引块可容纳的块编号数量
    #[inline]
    pub fn indirect_count(&self) -> usize {
        self.block_size / POINTER_SIZE
    }

    /// 单个文件最多可编号的数据块数（不支持二级索引）
    #[inline]
    pub fn max_file_blocks(&self) -> usize {
        DIRECT_COUNT + self.indirect_count()
    }

    #[inline]
    pub fn max_file_size(&self) -> usize {
        self.max_file_blocks() * self.block_size
    }

    /// 空闲块位图所在块
    #[inline]
    pub fn fbm_block(&self) -> usize {
        self.num_blocks - 2
    }

    /// 写掩码所在块
    #[inline]
    pub fn wm_block(&self) -> usize {
        self.num_blocks - 1
    }

    /// 可分配块的范围：超级块之后、FBM 之前
    #[inline]
    pub fn allocatable(&self) -> core::ops::Range<usize> {
        1..self.fbm_block()
    }
}
