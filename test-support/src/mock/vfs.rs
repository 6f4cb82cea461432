//! VFS 相关操作的 Mock 实现
//!
//! 注意：这里不直接依赖 `vfs` crate（避免循环依赖）。
//! `vfs` crate 在 `cfg(test)` 下为这些类型实现其 trait（例如 `VfsOps`）。

use core::sync::atomic::{AtomicU64, Ordering};

/// Mock 的 VFS 操作
///
/// 时钟每次读取前进 1 纳秒，保证时间戳严格递增。
pub struct MockVfsOps {
    now: AtomicU64,
}

impl MockVfsOps {
    pub const fn new() -> Self {
        Self {
            now: AtomicU64::new(0),
        }
    }

    /// 前进一拍并返回新的纳秒数
    pub fn tick(&self) -> u64 {
        self.now.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// 全局 Mock 实例
pub static MOCK_VFS_OPS: MockVfsOps = MockVfsOps::new();
