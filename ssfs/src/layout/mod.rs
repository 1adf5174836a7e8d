//! # 磁盘数据结构层
//!
//! ssfs 的磁盘布局：
//! 超级块 | inode 表 | 目录 | 数据块 | 空闲块位图(FBM) | 写掩码(WM)
//!
//! inode 表与目录合称元数据文件，由超级块中的根 inode 串起来，
//! 提交之后它们同样遵循写时复制，因此并不总停留在格式化时的位置。
//! 所有结构都以小端序逐字节编码。

mod super_block;
pub use super_block::SuperBlock;

mod bitmap;
pub use bitmap::Bitmap;

mod inode;
pub use inode::{BlockId, BlockPtr, DiskInode, IndirectBlock, POINTER_SIZE};

mod dir_entry;
pub use dir_entry::DirEntry;
