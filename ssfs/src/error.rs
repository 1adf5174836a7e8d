pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid file name {0:?}")]
    InvalidName(String),

    #[error("file id {0} does not name a file")]
    BadFileId(usize),

    #[error("file {0} is not open")]
    NotOpen(usize),

    #[error("position {pos} lies outside [0, {size}]")]
    SeekOutOfRange { pos: usize, size: usize },

    #[error("no free block left on the volume")]
    NoSpace,

    #[error("directory is full")]
    DirectoryFull,

    #[error("a file of {blocks} blocks exceeds the {max}-block limit")]
    FileTooLarge { blocks: usize, max: usize },

    #[error("no file named {0:?}")]
    NotFound(String),

    #[error("shadow slot {0} does not exist")]
    InvalidShadow(usize),

    #[error("shadow slot {0} has never been written")]
    ShadowNotWritten(usize),

    #[error("block {index} of a {size}-byte chain is unassigned or out of range")]
    Corruption { index: usize, size: usize },

    #[error("unusable geometry: {0}")]
    Geometry(&'static str),

    #[error("malformed on-disk structure: {0}")]
    Layout(#[from] binrw::Error),

    #[error(transparent)]
    Device(#[from] block_dev::Error),
}

/// 错误的大类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 文件号、偏移、文件名或几何参数不合法
    InvalidArgument,
    /// 块、目录槽位或单文件容量耗尽
    Exhausted,
    NotFound,
    /// 磁盘上的结构自相矛盾
    Corruption,
    Device,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidName(_)
            | Self::BadFileId(_)
            | Self::NotOpen(_)
            | Self::SeekOutOfRange { .. }
            | Self::InvalidShadow(_)
            | Self::Geometry(_) => ErrorKind::InvalidArgument,
            Self::NoSpace | Self::DirectoryFull | Self::FileTooLarge { .. } => {
                ErrorKind::Exhausted
            }
            Self::NotFound(_) | Self::ShadowNotWritten(_) => ErrorKind::NotFound,
            Self::Corruption { .. } | Self::Layout(_) => ErrorKind::Corruption,
            Self::Device(_) => ErrorKind::Device,
        }
    }
}
