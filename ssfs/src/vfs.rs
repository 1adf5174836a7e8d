//! # 文件服务层
//!
//! 单层根目录下的文件操作。目录与 inode 表按下标对齐，文件号就是这个下标。
//! 读写都以整个文件为单位走块链：先读出全部内容，再截取或覆盖。

use crate::layout::{DirEntry, DiskInode};
use crate::oft::Cursors;
use crate::{Error, FileId, Result, ShadowFileSystem};

/// 文件的占用情况
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    /// 文件字节数
    pub size: usize,
    /// 占用块数，含一级索引块
    pub blocks: usize,
    /// 是否用上了一级索引块
    pub indirect: bool,
}

impl ShadowFileSystem {
    /// 打开文件，不存在则新建。
    ///
    /// 已有文件的读游标位于开头、写游标位于末尾（追加）；
    /// 新文件大小为 0，两个游标都在开头。
    pub fn open(&mut self, name: &str) -> Result<FileId> {
        DirEntry::validate_name(name)?;

        if let Some(fid) = self.lookup(name) {
            self.oft.open(fid, self.inodes[fid].size());
            return Ok(fid);
        }

        let fid = self
            .dir
            .iter()
            .position(DirEntry::is_empty)
            .ok_or(Error::DirectoryFull)?;
        self.inodes[fid] = DiskInode::empty();
        self.dir[fid] = DirEntry::new(name)?;

        if let Err(err) = self.persist_slot(fid) {
            self.inodes[fid] = DiskInode::FREE;
            self.dir[fid] = DirEntry::default();
            return Err(err);
        }

        self.oft.open(fid, 0);
        log::debug!("created {name:?} as file {fid}");
        Ok(fid)
    }

    pub fn close(&mut self, fid: FileId) -> Result<()> {
        self.check_fid(fid)?;
        if self.oft.close(fid) {
            Ok(())
        } else {
            Err(Error::NotOpen(fid))
        }
    }

    /// 移动读游标，`pos` 不能越过文件末尾
    pub fn seek_read(&mut self, fid: FileId, pos: usize) -> Result<()> {
        self.check_fid(fid)?;
        let size = self.inodes[fid].size();
        let cursors = self.cursors_mut(fid)?;
        if pos > size {
            return Err(Error::SeekOutOfRange { pos, size });
        }
        cursors.read = pos;
        Ok(())
    }

    /// 移动写游标，`pos` 不能越过文件末尾；文件只能靠写入变长
    pub fn seek_write(&mut self, fid: FileId, pos: usize) -> Result<()> {
        self.check_fid(fid)?;
        let size = self.inodes[fid].size();
        let cursors = self.cursors_mut(fid)?;
        if pos > size {
            return Err(Error::SeekOutOfRange { pos, size });
        }
        cursors.write = pos;
        Ok(())
    }

    /// 从读游标处读出至多 `buf.len()` 字节，返回实际读取的字节数
    pub fn read(&mut self, fid: FileId, buf: &mut [u8]) -> Result<usize> {
        let Cursors { read, .. } = self.cursors(fid)?;
        let inode = self.inodes[fid];

        let len = buf.len().min(inode.size().saturating_sub(read));
        if len == 0 {
            return Ok(0);
        }

        let content = self.read_chain(&inode)?;
        buf[..len].copy_from_slice(&content[read..read + len]);
        self.cursors_mut(fid)?.read += len;

        Ok(len)
    }

    /// 在写游标处写入 `data`，必要时扩展文件。
    ///
    /// 先读出旧内容、覆盖上新数据，再把新文件的每一块都写回。
    /// 中途分配失败时 inode 保持原样，已经写出的新块不回滚。
    /// 成功后写游标移到新的文件末尾。
    pub fn write(&mut self, fid: FileId, data: &[u8]) -> Result<usize> {
        let Cursors { write, .. } = self.cursors(fid)?;
        if data.is_empty() {
            return Ok(0);
        }

        let block_size = self.geometry.block_size;
        let old = self.inodes[fid];
        let end = write + data.len();
        let new_size = old.size().max(end);

        let blocks = new_size.div_ceil(block_size);
        let max = self.geometry.max_file_blocks();
        if blocks > max {
            return Err(Error::FileTooLarge { blocks, max });
        }

        let mut content = self.read_chain(&old)?;
        content.resize(blocks * block_size, 0);
        content[write..end].copy_from_slice(data);

        let mut inode = old;
        if let Err(err) =
            self.write_chain(&mut inode, old.data_blocks(block_size), 0, &content)
        {
            log::warn!("write to file {fid} failed, new blocks stay unlinked: {err}");
            return Err(err);
        }
        inode.size = new_size as i32;

        self.inodes[fid] = inode;
        if let Err(err) = self.persist_inode(fid) {
            self.inodes[fid] = old;
            return Err(err);
        }
        self.cursors_mut(fid)?.write = new_size;

        Ok(data.len())
    }

    /// 删除文件：清空目录项、关闭文件、释放全部块并重置 inode
    pub fn remove(&mut self, name: &str) -> Result<()> {
        let fid = self
            .lookup(name)
            .ok_or_else(|| Error::NotFound(name.to_owned()))?;
        let inode = self.inodes[fid];
        let chain = self.chain(&inode)?;

        let entry = core::mem::take(&mut self.dir[fid]);
        self.inodes[fid] = DiskInode::FREE;
        if let Err(err) = self.persist_slot(fid) {
            self.inodes[fid] = inode;
            self.dir[fid] = entry;
            return Err(err);
        }
        self.oft.close(fid);

        let released = chain
            .blocks()
            .filter(|&id| self.release_block(id))
            .count();
        self.fbm.store(self.block_device.as_ref())?;

        log::debug!("removed {name:?}, {released} blocks released");
        Ok(())
    }

    pub fn stat(&self, fid: FileId) -> Result<Stat> {
        self.check_fid(fid)?;
        let inode = &self.inodes[fid];
        if !inode.is_used() {
            return Err(Error::BadFileId(fid));
        }

        let chain = self.chain(inode)?;
        Ok(Stat {
            size: inode.size(),
            blocks: chain.blocks().count(),
            indirect: chain.indirect.is_some(),
        })
    }

    /// 按名字查询文件大小
    pub fn file_size(&self, name: &str) -> Result<usize> {
        self.lookup(name)
            .map(|fid| self.inodes[fid].size())
            .ok_or_else(|| Error::NotFound(name.to_owned()))
    }

    /// 目录中下标不小于 `from` 的第一个文件
    pub fn next_file_name(&self, from: FileId) -> Option<(FileId, &str)> {
        self.files().find(|&(fid, _)| fid >= from)
    }

    /// 目录中的全部文件
    pub fn files(&self) -> impl Iterator<Item = (FileId, &str)> + '_ {
        self.dir
            .iter()
            .enumerate()
            .filter(|(_, entry)| !entry.is_empty())
            .map(|(fid, entry)| (fid, entry.name()))
    }

    /// 已打开文件的读写游标
    pub fn cursors(&self, fid: FileId) -> Result<Cursors> {
        self.check_fid(fid)?;
        self.oft.get(fid).ok_or(Error::NotOpen(fid))
    }
}

impl ShadowFileSystem {
    fn lookup(&self, name: &str) -> Option<FileId> {
        self.files()
            .find_map(|(fid, entry_name)| (entry_name == name).then_some(fid))
    }

    #[inline]
    fn check_fid(&self, fid: FileId) -> Result<()> {
        if fid < self.geometry.num_files {
            Ok(())
        } else {
            Err(Error::BadFileId(fid))
        }
    }

    fn cursors_mut(&mut self, fid: FileId) -> Result<&mut Cursors> {
        self.check_fid(fid)?;
        self.oft.get_mut(fid).ok_or(Error::NotOpen(fid))
    }
}
