//! 合成文件系统的公共抽象层
//!
//! 此 crate 提供仲裁器命名空间共用的 POSIX 风格抽象，包括：
//!
//! - [`FsError`] - 与 errno 对应的错误类型
//! - [`Stat`] / [`FileMode`] / [`InodeType`] - 节点属性
//! - [`check_access`] - 基于凭据的权限检查
//! - [`VfsOps`] - 运行时操作（时钟）注册

#![no_std]

extern crate alloc;

pub mod access;
pub mod error;
pub mod ops;

mod inode;

// Re-export ops
pub use ops::{VfsOps, register_vfs_ops, vfs_ops};

// Re-export error
pub use error::FsError;

// Re-export access
pub use access::{Access, check_access, check_open_permissions, is_owner};

// Re-export inode
pub use inode::{DirEntry, FileMode, InodeType, Stat, TouchFlags};
