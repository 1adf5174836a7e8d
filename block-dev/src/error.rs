use std::io;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("blocks [{start}, {start}+{count}) are outside the device's {num_blocks} blocks")]
    OutOfRange {
        start: usize,
        count: usize,
        num_blocks: usize,
    },

    #[error("transfer buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("device I/O failed: {0}")]
    Io(#[from] io::Error),
}
