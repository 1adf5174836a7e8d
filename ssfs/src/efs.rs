//! # 卷管理层
//!
//! 格式化或载入卷，分配与回收数据块，
//! 并按逻辑块号读写 inode 的块链（直接索引 + 一级索引）。
//!
//! 超级块、FBM、inode 表与目录在内存里各有一份，改动后立即写回磁盘；
//! inode 表与目录经由根 inode 的块链写回，因而同样受写掩码保护。

use std::sync::Arc;

use binrw::BinResult;
use block_dev::BlockDevice;

use crate::config::{DIRECT_COUNT, NUM_FILES};
use crate::layout::*;
use crate::oft::OpenFileTable;
use crate::{Error, FileId, Geometry, Result};

#[derive(Debug)]
pub struct ShadowFileSystem {
    pub(crate) block_device: Arc<dyn BlockDevice>,
    pub(crate) geometry: Geometry,
    pub(crate) super_block: SuperBlock,
    /// 空闲块位图
    pub(crate) fbm: Bitmap,
    /// 写掩码
    pub(crate) wm: Bitmap,
    pub(crate) inodes: Vec<DiskInode>,
    pub(crate) dir: Vec<DirEntry>,
    pub(crate) oft: OpenFileTable,
}

/// inode 所引用的全部块
#[derive(Debug, Default)]
pub(crate) struct Chain {
    /// 按逻辑块号排列的数据块
    pub data: Vec<BlockId>,
    pub indirect: Option<BlockId>,
}

impl Chain {
    pub fn blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.data.iter().chain(&self.indirect).copied()
    }
}

impl ShadowFileSystem {
    /// `fresh` 为真时以默认文件数格式化整个设备，否则载入设备上已有的卷。
    pub fn mount(block_device: Arc<dyn BlockDevice>, fresh: bool) -> Result<Self> {
        if fresh {
            Self::format(block_device, NUM_FILES)
        } else {
            Self::load(block_device)
        }
    }

    /// 按设备的形状建立空卷：清零全部块，初始化 FBM/WM，
    /// 再为根 inode 分配元数据区并写出超级块。
    pub fn format(block_device: Arc<dyn BlockDevice>, num_files: usize) -> Result<Self> {
        let geometry = Geometry::of_device(block_device.as_ref(), num_files);
        geometry.validate()?;

        let zeros = vec![0; geometry.block_size * geometry.num_blocks];
        block_device.write_blocks(0, geometry.num_blocks, &zeros)?;

        let mut fbm = Bitmap::new(geometry.fbm_block(), geometry.block_size);
        fbm.fill(geometry.allocatable(), true);
        let mut wm = Bitmap::new(geometry.wm_block(), geometry.block_size);
        wm.fill(geometry.allocatable(), true);
        fbm.store(block_device.as_ref())?;
        wm.store(block_device.as_ref())?;

        let mut efs = Self {
            super_block: SuperBlock::new(&geometry, DiskInode::empty()),
            inodes: vec![DiskInode::FREE; num_files],
            dir: vec![DirEntry::default(); num_files],
            oft: OpenFileTable::new(num_files),
            block_device,
            geometry,
            fbm,
            wm,
        };

        efs.super_block.root = efs.format_metadata()?;
        efs.store_super_block()?;

        log::info!(
            "formatted ssfs: {} blocks of {} bytes, {} files, {} blocks free",
            geometry.num_blocks,
            geometry.block_size,
            num_files,
            efs.free_blocks()
        );
        Ok(efs)
    }

    /// 读回超级块、FBM/WM、inode 表与目录，不做任何初始化。
    pub fn load(block_device: Arc<dyn BlockDevice>) -> Result<Self> {
        let mut block = vec![0; block_device.block_size()];
        block_device.read_block(0, &mut block)?;
        let super_block = SuperBlock::decode(&block)?;

        let geometry = super_block.geometry();
        if geometry.block_size != block_device.block_size()
            || geometry.num_blocks != block_device.num_blocks()
        {
            return Err(Error::Geometry("device shape differs from the superblock"));
        }
        geometry.validate()?;

        let mut efs = Self {
            fbm: Bitmap::load(block_device.as_ref(), geometry.fbm_block())?,
            wm: Bitmap::load(block_device.as_ref(), geometry.wm_block())?,
            inodes: Vec::new(),
            dir: Vec::new(),
            oft: OpenFileTable::new(geometry.num_files),
            block_device,
            geometry,
            super_block,
        };
        let (inodes, dir) = efs.read_metadata(&efs.super_block.root)?;
        efs.inodes = inodes;
        efs.dir = dir;

        log::info!(
            "mounted ssfs: {} files, {} blocks free",
            efs.files().count(),
            efs.free_blocks()
        );
        Ok(efs)
    }

    #[inline]
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// FBM 中空闲块的个数
    #[inline]
    pub fn free_blocks(&self) -> usize {
        self.fbm.count_set()
    }

    /// 取第一个空闲块并立即写回 FBM。
    /// 空间耗尽时返回 [`Error::NoSpace`]。
    pub fn allocate_block(&mut self) -> Result<BlockId> {
        let id = self.fbm.first_set().ok_or(Error::NoSpace)?;
        debug_assert!(self.wm.get(id.index()), "free block {id} is write-protected");

        self.fbm.set(id.index(), false);
        self.fbm.store(self.block_device.as_ref())?;
        log::trace!("allocated block {id}");
        Ok(id)
    }

    /// 在内存中把块标记为空闲，返回是否真的释放了。
    /// 影子仍引用的块只解除链接，不回收；FBM 由调用者写回。
    pub(crate) fn release_block(&mut self, id: BlockId) -> bool {
        if self.is_protected(id) {
            log::debug!("block {id} is still shadowed, left allocated");
            return false;
        }
        self.fbm.set(id.index(), true);
        true
    }

    #[inline]
    pub(crate) fn is_protected(&self, id: BlockId) -> bool {
        !self.wm.get(id.index())
    }

    pub(crate) fn store_super_block(&self) -> Result<()> {
        let mut block = vec![0; self.geometry.block_size];
        self.super_block.encode(&mut block)?;
        self.block_device.write_block(0, &block)?;
        Ok(())
    }

    pub(crate) fn store_masks(&self) -> Result<()> {
        self.fbm.store(self.block_device.as_ref())?;
        self.wm.store(self.block_device.as_ref())?;
        Ok(())
    }
}

/* 块链 */
impl ShadowFileSystem {
    /// 列出 inode 引用的所有块。
    /// 大小声称存在却未分配、或落在可分配范围之外的块都视为损坏。
    pub(crate) fn chain(&self, inode: &DiskInode) -> Result<Chain> {
        let size = inode.size();
        let count = inode.data_blocks(self.geometry.block_size);
        let allocatable = self.geometry.allocatable();
        let resolve = |ptr: &BlockPtr, index| {
            ptr.get()
                .filter(|id| allocatable.contains(&id.index()))
                .ok_or(Error::Corruption { index, size })
        };

        if count > self.geometry.max_file_blocks() {
            return Err(Error::Corruption {
                index: self.geometry.max_file_blocks(),
                size,
            });
        }

        let mut chain = Chain::default();
        for (index, ptr) in inode.direct.iter().take(count).enumerate() {
            chain.data.push(resolve(ptr, index)?);
        }

        if count > DIRECT_COUNT {
            let indirect_id = resolve(&inode.indirect, DIRECT_COUNT)?;
            let indirect = self.load_indirect(indirect_id)?;
            for (slot, ptr) in indirect.ptrs.iter().take(count - DIRECT_COUNT).enumerate() {
                chain.data.push(resolve(ptr, DIRECT_COUNT + slot)?);
            }
            chain.indirect = Some(indirect_id);
        }

        Ok(chain)
    }

    /// 依次读出整条块链，截去最后一块多余的部分
    pub(crate) fn read_chain(&self, inode: &DiskInode) -> Result<Vec<u8>> {
        let block_size = self.geometry.block_size;
        let chain = self.chain(inode)?;

        let mut content = vec![0; chain.data.len() * block_size];
        for (id, buf) in chain.data.iter().zip(content.chunks_exact_mut(block_size)) {
            self.block_device.read_block(id.index(), buf)?;
        }
        content.truncate(inode.size());

        Ok(content)
    }

    /// 把整块对齐的 `content` 写到 inode 第 `first` 个逻辑块起，
    /// 逻辑块号不小于 `valid` 的编号一律视为未分配。
    ///
    /// 未分配的块就地分配；被影子保护的块（包括一级索引块）写到新块上，
    /// 并更新 `inode` 与一级索引块中的编号。`inode` 的大小不在此修改。
    pub(crate) fn write_chain(
        &mut self,
        inode: &mut DiskInode,
        valid: usize,
        first: usize,
        content: &[u8],
    ) -> Result<()> {
        let block_size = self.geometry.block_size;
        debug_assert_eq!(0, content.len() % block_size);

        let blocks: Vec<&[u8]> = content.chunks_exact(block_size).collect();
        let end = first + blocks.len();
        let max = self.geometry.max_file_blocks();
        if end > max {
            return Err(Error::FileTooLarge { blocks: end, max });
        }

        /******************** 直接索引 ********************/
        for index in first..end.min(DIRECT_COUNT) {
            let current = inode.direct[index].get().filter(|_| index < valid);
            let target = self.writable(current)?;
            self.write_block(target, blocks[index - first])?;
            inode.direct[index] = target.into();
        }
        /******************** END ********************/

        if end <= DIRECT_COUNT {
            return Ok(());
        }

        /******************** 一级索引 ********************/
        let (indirect_id, mut indirect) = self.open_indirect(inode, valid)?;
        for index in first.max(DIRECT_COUNT)..end {
            let slot = index - DIRECT_COUNT;
            let current = indirect.ptrs[slot].get().filter(|_| index < valid);
            let target = self.writable(current)?;
            self.write_block(target, blocks[index - first])?;

            if current != Some(target) {
                indirect.ptrs[slot] = target.into();
                self.store_indirect(indirect_id, &indirect)?;
            }
        }
        /******************** END ********************/

        Ok(())
    }

    /// 可以直接改写的块：原块未受保护则沿用，否则分配新块
    fn writable(&mut self, current: Option<BlockId>) -> Result<BlockId> {
        match current {
            Some(id) if !self.is_protected(id) => Ok(id),
            Some(id) => {
                let copy = self.allocate_block()?;
                log::debug!("block {id} is shadowed, writing to {copy} instead");
                Ok(copy)
            }
            None => self.allocate_block(),
        }
    }

    /// 取得可改写的一级索引块：首次使用时分配，受保护时复制一份
    fn open_indirect(
        &mut self,
        inode: &mut DiskInode,
        valid: usize,
    ) -> Result<(BlockId, IndirectBlock)> {
        let current = inode.indirect.get().filter(|_| valid > DIRECT_COUNT);

        let (id, indirect) = match current {
            Some(id) if !self.is_protected(id) => return Ok((id, self.load_indirect(id)?)),
            Some(id) => {
                let indirect = self.load_indirect(id)?;
                let copy = self.allocate_block()?;
                log::debug!("indirect block {id} is shadowed, copied to {copy}");
                (copy, indirect)
            }
            None => (
                self.allocate_block()?,
                IndirectBlock::new(self.geometry.block_size),
            ),
        };

        self.store_indirect(id, &indirect)?;
        inode.indirect = id.into();
        Ok((id, indirect))
    }

    fn load_indirect(&self, id: BlockId) -> Result<IndirectBlock> {
        let mut block = vec![0; self.geometry.block_size];
        self.block_device.read_block(id.index(), &mut block)?;
        Ok(IndirectBlock::decode(&block)?)
    }

    fn store_indirect(&self, id: BlockId, indirect: &IndirectBlock) -> Result<()> {
        let mut block = vec![0; self.geometry.block_size];
        indirect.encode(&mut block)?;
        self.write_block(id, &block)
    }

    #[inline]
    fn write_block(&self, id: BlockId, data: &[u8]) -> Result<()> {
        Ok(self.block_device.write_block(id.index(), data)?)
    }
}

/* 元数据文件：inode 表 + 目录 */
impl ShadowFileSystem {
    /// 解出某个根 inode 下的 inode 表与目录。
    /// 目录项与 inode 的使用状态不一致的槽位按空闲处理。
    pub(crate) fn read_metadata(
        &self,
        root: &DiskInode,
    ) -> Result<(Vec<DiskInode>, Vec<DirEntry>)> {
        let geometry = &self.geometry;
        if root.size() != geometry.metadata_blocks() * geometry.block_size {
            return Err(Error::Geometry("root inode does not span the metadata region"));
        }

        let content = self.read_chain(root)?;
        let (table, directory) =
            content.split_at(geometry.inode_table_blocks() * geometry.block_size);

        let mut inodes = table
            .chunks_exact(DiskInode::SIZE)
            .take(geometry.num_files)
            .map(DiskInode::decode)
            .collect::<BinResult<Vec<_>>>()?;
        let mut dir = directory
            .chunks_exact(DirEntry::SIZE)
            .take(geometry.num_files)
            .map(DirEntry::decode)
            .collect::<BinResult<Vec<_>>>()?;

        for (fid, (inode, entry)) in inodes.iter_mut().zip(&mut dir).enumerate() {
            if inode.is_used() == entry.is_empty() {
                log::warn!("file slot {fid} is half-initialized, treating it as free");
                *inode = DiskInode::FREE;
                *entry = DirEntry::default();
            }
        }

        Ok((inodes, dir))
    }

    /// 把第 `index` 个元数据块编码进 `block`
    fn encode_metadata_block(&self, index: usize, block: &mut [u8]) -> Result<()> {
        let table_blocks = self.geometry.inode_table_blocks();

        if index < table_blocks {
            let skip = index * self.geometry.inodes_per_block();
            for (slot, inode) in block
                .chunks_exact_mut(DiskInode::SIZE)
                .zip(self.inodes.iter().skip(skip))
            {
                inode.encode(slot)?;
            }
        } else {
            let skip = (index - table_blocks) * self.geometry.entries_per_block();
            for (slot, entry) in block
                .chunks_exact_mut(DirEntry::SIZE)
                .zip(self.dir.iter().skip(skip))
            {
                entry.encode(slot)?;
            }
        }

        Ok(())
    }

    fn encode_metadata(&self) -> Result<Vec<u8>> {
        let block_size = self.geometry.block_size;
        let mut content = vec![0; self.geometry.metadata_blocks() * block_size];
        for (index, block) in content.chunks_exact_mut(block_size).enumerate() {
            self.encode_metadata_block(index, block)?;
        }
        Ok(content)
    }

    /// 把元数据区写到超级块之后的连续块上，根 inode 的一级索引块紧随其后。
    /// 返回串起元数据区的根 inode。
    fn format_metadata(&mut self) -> Result<DiskInode> {
        let metadata = self.encode_metadata()?;
        let count = self.geometry.metadata_blocks();
        self.fbm.fill(1..1 + count, false);
        self.fbm.store(self.block_device.as_ref())?;
        self.block_device.write_blocks(1, count, &metadata)?;

        let mut root = DiskInode::empty();
        let ids = (1..=count).map(|id| BlockId::new(id as u32));
        for (ptr, id) in root.direct.iter_mut().zip(ids.clone()) {
            *ptr = id.into();
        }

        if count > DIRECT_COUNT {
            let indirect_id = self.allocate_block()?;
            let mut indirect = IndirectBlock::new(self.geometry.block_size);
            for (ptr, id) in indirect.ptrs.iter_mut().zip(ids.skip(DIRECT_COUNT)) {
                *ptr = id.into();
            }
            self.store_indirect(indirect_id, &indirect)?;
            root.indirect = indirect_id.into();
        }

        root.size = metadata.len() as i32;
        Ok(root)
    }

    /// 经由根 inode 写回若干元数据块，根 inode 变化时只写回一次超级块。
    ///
    /// 动笔之前先确认写时复制所需的块都能分配到：
    /// 空间不足时返回 [`Error::NoSpace`]，磁盘保持原样。
    fn persist_metadata_blocks(&mut self, indexes: &[usize]) -> Result<()> {
        let block_size = self.geometry.block_size;
        let mut root = self.super_block.root;
        let chain = self.chain(&root)?;

        let mut needed = indexes
            .iter()
            .filter(|&&index| {
                chain
                    .data
                    .get(index)
                    .is_none_or(|&id| self.is_protected(id))
            })
            .count();
        if indexes.iter().any(|&index| index >= DIRECT_COUNT)
            && chain.indirect.is_some_and(|id| self.is_protected(id))
        {
            needed += 1;
        }
        if needed > self.free_blocks() {
            log::debug!("metadata update needs {needed} blocks, volume is full");
            return Err(Error::NoSpace);
        }

        let valid = root.data_blocks(block_size);
        for &index in indexes {
            let mut block = vec![0; block_size];
            self.encode_metadata_block(index, &mut block)?;
            self.write_chain(&mut root, valid, index, &block)?;
        }

        if root != self.super_block.root {
            self.super_block.root = root;
            self.store_super_block()?;
        }
        Ok(())
    }

    #[inline]
    fn inode_block(&self, fid: FileId) -> usize {
        fid / self.geometry.inodes_per_block()
    }

    #[inline]
    fn dir_entry_block(&self, fid: FileId) -> usize {
        self.geometry.inode_table_blocks() + fid / self.geometry.entries_per_block()
    }

    #[inline]
    pub(crate) fn persist_inode(&mut self, fid: FileId) -> Result<()> {
        self.persist_metadata_blocks(&[self.inode_block(fid)])
    }

    /// 一并写回文件槽位的 inode 与目录项，二者要么都落盘，要么都不变
    #[inline]
    pub(crate) fn persist_slot(&mut self, fid: FileId) -> Result<()> {
        self.persist_metadata_blocks(&[self.inode_block(fid), self.dir_entry_block(fid)])
    }
}
