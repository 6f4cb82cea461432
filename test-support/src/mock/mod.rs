//! Mock 实现模块
//!
//! 提供硬件后端和运行时操作的 Mock 实现，用于测试

pub mod pci;
pub mod vfs;
