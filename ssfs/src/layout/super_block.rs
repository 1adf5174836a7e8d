use std::io::Cursor;

use binrw::{binrw, BinRead, BinResult, BinWrite};

use crate::config::SHADOW_COUNT;
use crate::layout::DiskInode;
use crate::Geometry;

/// 超级块：
/// - 提供文件系统合法性校验；
/// - 记录卷的几何形状；
/// - 持有根 inode 与影子根节点环
#[binrw]
#[brw(little, magic = b"SSFS")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperBlock {
    pub block_size: u32,
    pub num_blocks: u32,
    pub num_inodes: u32,
    /// 元数据文件（inode 表 + 目录）的 inode
    pub root: DiskInode,
    /// 已提交的根 inode，`size == -1` 的槽位尚未写入
    pub shadows: [DiskInode; SHADOW_COUNT],
    /// 最近写入的影子槽位，`-1` 表示从未提交
    pub last_shadow: i32,
}

impl SuperBlock {
    /// 魔数 + 三个几何字段 + 根 + 影子环 + 环游标
    pub const SIZE: usize = 4 + 3 * 4 + (1 + SHADOW_COUNT) * DiskInode::SIZE + 4;

    pub fn new(geometry: &Geometry, root: DiskInode) -> Self {
        Self {
            block_size: geometry.block_size as u32,
            num_blocks: geometry.num_blocks as u32,
            num_inodes: geometry.num_files as u32,
            root,
            shadows: [DiskInode::FREE; SHADOW_COUNT],
            last_shadow: -1,
        }
    }

    #[inline]
    pub fn geometry(&self) -> Geometry {
        Geometry::new(
            self.block_size as usize,
            self.num_blocks as usize,
            self.num_inodes as usize,
        )
    }

    /// 已写入的影子槽位
    #[inline]
    pub fn shadow(&self, slot: usize) -> Option<&DiskInode> {
        self.shadows.get(slot).filter(|shadow| shadow.is_used())
    }

    #[inline]
    pub fn last_shadow(&self) -> Option<usize> {
        usize::try_from(self.last_shadow).ok()
    }

    /// 下一次提交写入的槽位，环满后覆盖最旧的
    #[inline]
    pub fn next_shadow_slot(&self) -> usize {
        self.last_shadow().map_or(0, |last| (last + 1) % SHADOW_COUNT)
    }

    pub fn decode(bytes: &[u8]) -> BinResult<Self> {
        Self::read(&mut Cursor::new(bytes))
    }

    pub fn encode(&self, bytes: &mut [u8]) -> BinResult<()> {
        self.write(&mut Cursor::new(bytes))
    }
}
