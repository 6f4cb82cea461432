//! 传输错误
//!
//! 拆分传输中途失败时，调用方需要知道失败前已经完成的字节数。

use core::fmt;

use device::PciError;
use vfs::FsError;

/// 部分完成的传输
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferError {
    /// 失败原因
    pub error: FsError,
    /// 失败前已完成的字节数
    pub transferred: usize,
}

impl TransferError {
    /// 尚未传输任何字节的失败
    pub fn new(error: FsError) -> Self {
        Self {
            error,
            transferred: 0,
        }
    }
}

impl From<FsError> for TransferError {
    fn from(error: FsError) -> Self {
        Self::new(error)
    }
}

impl From<TransferError> for FsError {
    fn from(err: TransferError) -> Self {
        err.error
    }
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} after {} bytes", self.error, self.transferred)
    }
}

/// 后端错误到文件系统错误的映射
pub fn pci_error(err: PciError) -> FsError {
    match err {
        PciError::NoDevice => FsError::NoDevice,
        PciError::InvalidArgument => FsError::InvalidArgument,
        PciError::Io => FsError::IoError,
        PciError::OutOfMemory => FsError::OutOfMemory,
        PciError::NotSupported => FsError::NotSupported,
    }
}
