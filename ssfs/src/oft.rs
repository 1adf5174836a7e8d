//! # 打开文件表
//!
//! 每个文件槽位一对读写游标。表只存在于内存中，
//! 每次挂载都从全关闭状态重建。

use crate::FileId;

/// 已打开文件的读写游标（字节偏移）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursors {
    pub read: usize,
    pub write: usize,
}

#[derive(Debug)]
pub struct OpenFileTable {
    /// `None` 表示文件未打开
    entries: Vec<Option<Cursors>>,
}

impl OpenFileTable {
    pub fn new(num_files: usize) -> Self {
        Self {
            entries: vec![None; num_files],
        }
    }

    /// 打开（或重新打开）文件，读游标回到开头，写游标位于 `write`
    #[inline]
    pub fn open(&mut self, fid: FileId, write: usize) {
        self.entries[fid] = Some(Cursors { read: 0, write });
    }

    /// 关闭文件，返回它此前是否处于打开状态
    #[inline]
    pub fn close(&mut self, fid: FileId) -> bool {
        self.entries
            .get_mut(fid)
            .and_then(Option::take)
            .is_some()
    }

    #[inline]
    pub fn get(&self, fid: FileId) -> Option<Cursors> {
        self.entries.get(fid).copied().flatten()
    }

    #[inline]
    pub fn get_mut(&mut self, fid: FileId) -> Option<&mut Cursors> {
        self.entries.get_mut(fid).and_then(Option::as_mut)
    }

    pub fn close_all(&mut self) {
        self.entries.fill(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle() {
        let mut oft = OpenFileTable::new(2);
        assert_eq!(None, oft.get(0));

        oft.open(1, 10);
        assert_eq!(Some(Cursors { read: 0, write: 10 }), oft.get(1));

        oft.get_mut(1).unwrap().read = 4;
        assert_eq!(4, oft.get(1).unwrap().read);

        assert!(oft.close(1));
        assert!(!oft.close(1));
        assert!(!oft.close(5));
        assert_eq!(None, oft.get(5));
    }
}
