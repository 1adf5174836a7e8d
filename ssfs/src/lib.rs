//! # Simple Shadow File System
//!
//! 单卷、单层目录、基于 inode 的文件系统，建立在定长块设备之上，
//! 通过超级块里的影子根节点环提供提交（commit）与回滚（restore）。
//!
//! 所有元数据都是**写穿**的：每个改动结构的操作返回前，
//! 超级块、空闲块位图、inode 表与目录都已落盘。

/* ssfs 的整体架构，自上而下 */

// 文件服务层：打开、读写、删除文件
mod vfs;

// 影子层：提交与回滚
mod shadow;

// 卷管理层：挂载、块分配、块链读写
mod efs;

// 打开文件表：内存中的读写游标，不落盘
mod oft;

// 磁盘数据结构层
mod layout;

pub mod config;
mod error;

pub use self::{
    config::Geometry,
    efs::ShadowFileSystem,
    error::{Error, ErrorKind, Result},
    layout::{BlockId, DirEntry, DiskInode},
    oft::Cursors,
    vfs::Stat,
};

/// 文件在目录与 inode 表中的下标
pub type FileId = usize;
