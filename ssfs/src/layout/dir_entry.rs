use std::io::Cursor;

use binrw::{binrw, BinRead, BinResult, BinWrite};

use crate::{Error, Result};

const NAME_MAX_LEN: usize = 15;

/// 根目录中的一项，与 inode 表按下标一一对应
#[binrw]
#[brw(little)]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirEntry {
    // 最后一字节留给 \0
    name: [u8; NAME_MAX_LEN + 1],
}

impl DirEntry {
    /// 目录项大小恒为16字节
    pub const SIZE: usize = NAME_MAX_LEN + 1;

    /// 非空、不含 \0、且放得进槽位的名字才合法
    pub fn validate_name(name: &str) -> Result<()> {
        if name.is_empty() || name.len() > NAME_MAX_LEN || name.contains('\0') {
            return Err(Error::InvalidName(name.to_owned()));
        }
        Ok(())
    }

    pub fn new(name: &str) -> Result<Self> {
        Self::validate_name(name)?;
        let bytes = name.as_bytes();
        let mut entry = Self::default();
        entry.name[..bytes.len()].copy_from_slice(bytes);
        Ok(entry)
    }

    pub fn name(&self) -> &str {
        let len = self
            .name
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(NAME_MAX_LEN + 1);
        core::str::from_utf8(&self.name[..len]).unwrap_or_default()
    }

    /// 首字节为 \0 的槽位未被使用
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.name[0] == 0
    }

    pub fn decode(bytes: &[u8]) -> BinResult<Self> {
        Self::read(&mut Cursor::new(bytes))
    }

    pub fn encode(&self, bytes: &mut [u8]) -> BinResult<()> {
        self.write(&mut Cursor::new(bytes))
    }
}
