//! # PCI 仲裁器 (pcifs)
//!
//! 把系统中的 PCI 功能呈现为一棵合成目录树：
//!
//! ```text
//! /<domain>/<bus>/<device>/<function>/{config, region0..5, rom}
//! ```
//!
//! ## 组成
//!
//! - **[builder]**: 从设备目录两遍构建目录项数组
//! - **[perms]**: 按地址或类别圈定的属主规则
//! - **[ncache]**: 有界 LRU 节点缓存
//! - **[arbiter]**: 配置空间、BAR 区域与 ROM 的访问仲裁
//! - **[options]**: 运行时选项
//!
//! [`PciFs`] 是一个命名空间实例，[`OpenFile`] 是其上的一次打开。

#![no_std]

extern crate alloc;

pub mod arbiter;
pub mod builder;
pub mod config;
pub mod entry;
pub mod error;
pub mod ncache;
pub mod netfs;
pub mod node;
pub mod options;
pub mod pcifs;
pub mod perms;
pub mod store;

pub use arbiter::{Arbiter, ConfigSpace, RegionResource, Resource, RomResource};
pub use builder::{TreeBuilder, build};
pub use entry::{DeviceAddress, Entry, EntryId, EntryKind};
pub use error::{TransferError, pci_error};
pub use ncache::NodeCache;
pub use netfs::OpenFile;
pub use node::Node;
pub use options::Options;
pub use pcifs::{PciFs, derive_root_stat};
pub use perms::{PermissionRule, Scope, apply};
pub use store::{DeviceSlot, EntryStore};
