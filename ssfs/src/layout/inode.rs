//! inode 与一级索引块
//!
//! 逻辑块 `i < DIRECT_COUNT` 由 `direct[i]` 直接编号，
//! 其余由唯一的一级索引块编号，整块连续存储块编号。
//! 编号 `-1` 表示未分配。

use std::io::Cursor;

use binrw::{binrw, BinRead, BinResult, BinWrite};
use derive_more::{Display, From, Into};

use crate::config::DIRECT_COUNT;

/// 磁盘上一个块编号所占字节数
pub const POINTER_SIZE: usize = 4;

/// 块设备上的绝对块号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into, Display)]
#[repr(transparent)]
pub struct BlockId(u32);

impl From<BlockId> for usize {
    #[inline]
    fn from(id: BlockId) -> Self {
        id.0 as usize
    }
}

impl BlockId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.into()
    }
}

/// 磁盘上的块编号，`-1` 为空
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPtr(i32);

impl BlockPtr {
    pub const NULL: Self = Self(-1);

    #[inline]
    pub fn get(self) -> Option<BlockId> {
        u32::try_from(self.0).ok().map(BlockId)
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.get().is_none()
    }
}

impl From<BlockId> for BlockPtr {
    #[inline]
    fn from(id: BlockId) -> Self {
        Self(id.0 as i32)
    }
}

impl From<Option<BlockId>> for BlockPtr {
    #[inline]
    fn from(id: Option<BlockId>) -> Self {
        id.map_or(Self::NULL, Self::from)
    }
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskInode {
    /// 文件字节数，`-1` 表示空闲槽位
    pub size: i32,
    /// 直接索引，存储容量：DIRECT_COUNT * BLOCK_SIZE 字节
    pub direct: [BlockPtr; DIRECT_COUNT],
    /// 指向唯一的一级索引块
    pub indirect: BlockPtr,
}

impl DiskInode {
    /// inode 大小恒为64字节
    pub const SIZE: usize = 64;

    pub const FREE: Self = Self {
        size: -1,
        direct: [BlockPtr::NULL; DIRECT_COUNT],
        indirect: BlockPtr::NULL,
    };

    /// 新建的空文件
    #[inline]
    pub fn empty() -> Self {
        Self {
            size: 0,
            ..Self::FREE
        }
    }

    #[inline]
    pub fn is_used(&self) -> bool {
        self.size >= 0
    }

    /// 文件字节数，空闲 inode 视为 0
    #[inline]
    pub fn size(&self) -> usize {
        usize::try_from(self.size).unwrap_or(0)
    }

    /// 计算容纳自身数据需要多少个**数据块**
    #[inline]
    pub fn data_blocks(&self, block_size: usize) -> usize {
        self.size().div_ceil(block_size)
    }

    pub fn decode(bytes: &[u8]) -> BinResult<Self> {
        Self::read(&mut Cursor::new(bytes))
    }

    pub fn encode(&self, bytes: &mut [u8]) -> BinResult<()> {
        self.write(&mut Cursor::new(bytes))
    }
}

/// 一级索引块：整块都是块编号
#[binrw]
#[brw(little)]
#[br(import(count: usize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndirectBlock {
    #[br(count = count)]
    pub ptrs: Vec<BlockPtr>,
}

impl IndirectBlock {
    /// 全空的索引块
    pub fn new(block_size: usize) -> Self {
        Self {
            ptrs: vec![BlockPtr::NULL; block_size / POINTER_SIZE],
        }
    }

    pub fn decode(bytes: &[u8]) -> BinResult<Self> {
        Self::read_args(&mut Cursor::new(bytes), (bytes.len() / POINTER_SIZE,))
    }

    pub fn encode(&self, bytes: &mut [u8]) -> BinResult<()> {
        self.write(&mut Cursor::new(bytes))
    }
}
