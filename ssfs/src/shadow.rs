//! # 影子层
//!
//! 超级块里保存一个定长的根 inode 环。提交把当前根 inode 存进环中下一个槽位
//! （环满时覆盖最旧的），回滚把某个槽位的根 inode 换回当前根。
//!
//! 影子能引用到的块在写掩码中都是只读的，之后对它们的写入由块链层复制到新块。
//! 每次提交或回滚后按可达性重算 FBM 与 WM：
//! - WM 只保护影子可达的块；
//! - FBM 只占用当前根或影子可达的块，
//!   因此被覆盖的槽位、被丢弃的当前树以及写入失败遗留的块都会回收。

use crate::config::SHADOW_COUNT;
use crate::layout::{Bitmap, DiskInode, SuperBlock};
use crate::{Error, Result, ShadowFileSystem};

impl ShadowFileSystem {
    /// 把当前根 inode 存入下一个影子槽位，返回该槽位
    pub fn commit(&mut self) -> Result<usize> {
        let slot = self.super_block.next_shadow_slot();

        let mut super_block = self.super_block.clone();
        super_block.shadows[slot] = super_block.root;
        super_block.last_shadow = slot as i32;
        let (fbm, wm) = self.compute_masks(&super_block)?;

        self.super_block = super_block;
        self.store_super_block()?;
        self.fbm = fbm;
        self.wm = wm;
        self.store_masks()?;

        log::info!(
            "committed to shadow slot {slot}, {} blocks free",
            self.free_blocks()
        );
        Ok(slot)
    }

    /// 以影子槽位 `slot` 的根 inode 替换当前根，所有打开的文件随之关闭
    pub fn restore(&mut self, slot: usize) -> Result<()> {
        if slot >= SHADOW_COUNT {
            return Err(Error::InvalidShadow(slot));
        }
        let root = *self
            .super_block
            .shadow(slot)
            .ok_or(Error::ShadowNotWritten(slot))?;

        let (inodes, dir) = self.read_metadata(&root)?;
        let mut super_block = self.super_block.clone();
        super_block.root = root;
        let (fbm, wm) = self.compute_masks(&super_block)?;

        self.super_block = super_block;
        self.store_super_block()?;
        self.inodes = inodes;
        self.dir = dir;
        self.oft.close_all();
        self.fbm = fbm;
        self.wm = wm;
        self.store_masks()?;

        log::info!(
            "restored shadow slot {slot}, {} blocks free",
            self.free_blocks()
        );
        Ok(())
    }

    /// 已写入的影子槽位
    pub fn shadows(&self) -> impl Iterator<Item = usize> + '_ {
        (0..SHADOW_COUNT).filter(|&slot| self.super_block.shadow(slot).is_some())
    }

    /// 最近一次提交写入的槽位
    #[inline]
    pub fn last_shadow(&self) -> Option<usize> {
        self.super_block.last_shadow()
    }
}

impl ShadowFileSystem {
    /// 由 `super_block` 的当前根与影子环重新计算 (FBM, WM)
    fn compute_masks(&self, super_block: &SuperBlock) -> Result<(Bitmap, Bitmap)> {
        let geometry = &self.geometry;

        let mut shadowed = Bitmap::new(geometry.wm_block(), geometry.block_size);
        for shadow in super_block.shadows.iter().filter(|shadow| shadow.is_used()) {
            self.mark_tree(shadow, &mut shadowed)?;
        }
        let mut used = shadowed.clone();
        self.mark_tree(&super_block.root, &mut used)?;

        let mut fbm = Bitmap::new(geometry.fbm_block(), geometry.block_size);
        let mut wm = Bitmap::new(geometry.wm_block(), geometry.block_size);
        for block in geometry.allocatable() {
            fbm.set(block, !used.get(block));
            wm.set(block, !shadowed.get(block));
        }

        Ok((fbm, wm))
    }

    /// 标记根 inode 可达的全部块：元数据文件本身以及其中每个文件的块链
    fn mark_tree(&self, root: &DiskInode, bits: &mut Bitmap) -> Result<()> {
        let (inodes, _) = self.read_metadata(root)?;
        for inode in core::iter::once(root).chain(inodes.iter().filter(|inode| inode.is_used())) {
            for id in self.chain(inode)?.blocks() {
                bits.set(id.index(), true);
            }
        }
        Ok(())
    }
}
