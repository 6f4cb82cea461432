//! 目录项
//!
//! 目录项是命名空间的结构节点，常驻于 [`EntryStore`](crate::EntryStore) 的数组中，
//! 以下标 [`EntryId`] 互相引用。重量级的 [`Node`] 只在被访问时按需创建。

use alloc::string::String;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::fmt;

use device::{ClassCode, PciAddress};
use sync::SpinLock;
use uapi::time::TimeSpec;
use vfs::{FsError, Stat, TouchFlags};

use crate::config::NAME_SIZE;
use crate::node::Node;

/// 目录项在存储数组中的下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(pub(crate) usize);

impl EntryId {
    /// 根目录
    pub const ROOT: EntryId = EntryId(0);

    /// 数组下标
    pub fn index(&self) -> usize {
        self.0
    }
}

/// 部分确定的设备地址
///
/// 层级越深确定的字段越多：domain 目录只有 `domain`，bus 目录再加 `bus`，依此类推。
/// 根目录四个字段均未设置。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceAddress {
    /// 段号
    pub domain: Option<u16>,
    /// 总线号
    pub bus: Option<u8>,
    /// 设备号
    pub dev: Option<u8>,
    /// 功能号
    pub func: Option<u8>,
}

impl DeviceAddress {
    /// 全部未设置
    pub const UNSET: DeviceAddress = DeviceAddress {
        domain: None,
        bus: None,
        dev: None,
        func: None,
    };

    /// 已设置的字段数
    pub fn depth(&self) -> usize {
        self.domain.is_some() as usize
            + self.bus.is_some() as usize
            + self.dev.is_some() as usize
            + self.func.is_some() as usize
    }

    /// 截取前 `depth` 个字段
    pub fn truncated(addr: PciAddress, depth: usize) -> Self {
        Self {
            domain: (depth >= 1).then_some(addr.domain),
            bus: (depth >= 2).then_some(addr.bus),
            dev: (depth >= 3).then_some(addr.dev),
            func: (depth >= 4).then_some(addr.func),
        }
    }

    /// 四个字段都已设置时转换为完整地址
    pub fn to_pci(&self) -> Option<PciAddress> {
        Some(PciAddress {
            domain: self.domain?,
            bus: self.bus?,
            dev: self.dev?,
            func: self.func?,
        })
    }
}

impl From<PciAddress> for DeviceAddress {
    fn from(addr: PciAddress) -> Self {
        Self::truncated(addr, 4)
    }
}

/// 目录项种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// 目录（根、domain、bus、device、function）
    Directory,
    /// 配置空间文件
    Config,
    /// BAR 区域文件，携带 BAR 下标
    Region(u8),
    /// 扩展 ROM 文件
    Rom,
}

impl EntryKind {
    /// 是否为目录
    pub fn is_dir(&self) -> bool {
        matches!(self, EntryKind::Directory)
    }
}

/// 命名空间中的一个目录项
pub struct Entry {
    pub(crate) id: EntryId,
    pub(crate) name: String,
    pub(crate) addr: DeviceAddress,
    pub(crate) class: Option<ClassCode>,
    pub(crate) kind: EntryKind,
    pub(crate) parent: Option<EntryId>,
    pub(crate) children: Vec<EntryId>,
    /// 指向设备目录中的记录，只在 function 目录及其文件上设置
    pub(crate) device: Option<usize>,
    pub(crate) stat: SpinLock<Stat>,
    pub(crate) node: SpinLock<Weak<Node>>,
}

impl Entry {
    pub(crate) fn new(
        id: EntryId,
        name: String,
        addr: DeviceAddress,
        class: Option<ClassCode>,
        kind: EntryKind,
        parent: Option<EntryId>,
        mut stat: Stat,
    ) -> Result<Self, FsError> {
        if name.len() >= NAME_SIZE {
            return Err(FsError::NameTooLong);
        }
        stat.ino = id.0 + 1;
        Ok(Self {
            id,
            name,
            addr,
            class,
            kind,
            parent,
            children: Vec::new(),
            device: None,
            stat: SpinLock::new(stat),
            node: SpinLock::new(Weak::new()),
        })
    }

    /// 下标
    pub fn id(&self) -> EntryId {
        self.id
    }

    /// 名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 设备地址
    pub fn addr(&self) -> DeviceAddress {
        self.addr
    }

    /// 设备类别，只在 function 目录及其文件上设置
    pub fn class(&self) -> Option<ClassCode> {
        self.class
    }

    /// 种类
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// 父目录，根目录为 `None`
    pub fn parent(&self) -> Option<EntryId> {
        self.parent
    }

    /// 子项，按创建顺序
    pub fn children(&self) -> &[EntryId] {
        &self.children
    }

    /// 属性快照
    pub fn stat(&self) -> Stat {
        self.stat.lock().clone()
    }

    /// 更新时间戳
    pub fn touch(&self, flags: TouchFlags, now: TimeSpec) {
        self.stat.lock().touch(flags, now);
    }

    /// 当前存活的节点
    pub fn live_node(&self) -> Option<Arc<Node>> {
        self.node.lock().upgrade()
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("addr", &self.addr)
            .field("kind", &self.kind)
            .field("parent", &self.parent)
            .field("children", &self.children.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_depth() {
        let addr = PciAddress::new(1, 2, 3);
        for depth in 0..=4 {
            assert_eq!(DeviceAddress::truncated(addr, depth).depth(), depth);
        }
        assert_eq!(DeviceAddress::from(addr).to_pci(), Some(addr));
        assert_eq!(DeviceAddress::truncated(addr, 3).to_pci(), None);
    }
}
