//! 目录项存储
//!
//! 所有目录项存放在一次性分配好的数组中，建好后结构不再变化，
//! 直到重新扫描整体替换。父子关系用下标表示，不存在悬垂指针。

use alloc::string::String;
use alloc::vec::Vec;

use device::{PCI_NUM_REGIONS, PciAddress, PciDevice};
use sync::SpinLock;
use vfs::{DirEntry, FsError, InodeType};

use crate::entry::{Entry, EntryId};

/// 设备目录中的一条记录及其资源锁
///
/// 每个 BAR 与 ROM 各有一把锁，刷新与随后的数据传输在同一把锁内完成。
///
/// # 注意
/// 这些锁是自旋锁，持有期间会访问硬件，与 [`SpinLock`] 的使用建议相悖。
/// 换来的是刷新得到的尺寸与紧随其后的传输不会被其它请求打断。
/// 持锁线程被抢占时，同一资源上的其它请求会一直自旋到它恢复；
/// 不同资源互不影响，单次传输最长为一个 BAR 的大小。
pub struct DeviceSlot {
    record: SpinLock<PciDevice>,
    pub(crate) regions: [SpinLock<()>; PCI_NUM_REGIONS],
    pub(crate) rom: SpinLock<()>,
}

impl DeviceSlot {
    pub(crate) fn new(record: PciDevice) -> Self {
        Self {
            record: SpinLock::new(record),
            regions: core::array::from_fn(|_| SpinLock::new(())),
            rom: SpinLock::new(()),
        }
    }

    /// 设备地址
    pub fn addr(&self) -> PciAddress {
        self.record.lock().addr
    }

    /// 最近一次枚举或刷新得到的记录
    pub fn record(&self) -> PciDevice {
        self.record.lock().clone()
    }

    pub(crate) fn update(&self, record: PciDevice) {
        *self.record.lock() = record;
    }
}

/// 目录项存储
pub struct EntryStore {
    pub(crate) entries: Vec<Entry>,
    pub(crate) devices: Vec<DeviceSlot>,
    pub(crate) generation: u64,
}

impl EntryStore {
    /// 根目录
    pub fn root(&self) -> &Entry {
        &self.entries[EntryId::ROOT.0]
    }

    /// 按下标取目录项
    pub fn get(&self, id: EntryId) -> Result<&Entry, FsError> {
        self.entries.get(id.0).ok_or(FsError::NotFound)
    }

    /// 父目录
    pub fn parent(&self, id: EntryId) -> Option<EntryId> {
        self.entries.get(id.0)?.parent
    }

    /// 子项
    pub fn children(&self, id: EntryId) -> Result<&[EntryId], FsError> {
        let entry = self.get(id)?;
        if !entry.kind.is_dir() {
            return Err(FsError::NotDirectory);
        }
        Ok(&entry.children)
    }

    /// 在目录中按名称精确查找
    ///
    /// 支持 `.` 与 `..`；根目录的 `..` 仍是根目录。
    pub fn lookup(&self, dir: EntryId, name: &str) -> Result<EntryId, FsError> {
        let children = self.children(dir)?;
        match name {
            "" | "." => Ok(dir),
            ".." => Ok(self.parent(dir).unwrap_or(dir)),
            _ => children
                .iter()
                .copied()
                .find(|child| self.entries[child.0].name == name)
                .ok_or(FsError::NotFound),
        }
    }

    /// 从根目录按路径查找，忽略多余的 `/`
    pub fn lookup_path(&self, path: &str) -> Result<EntryId, FsError> {
        path.split('/')
            .filter(|c| !c.is_empty())
            .try_fold(EntryId::ROOT, |dir, name| self.lookup(dir, name))
    }

    /// 列出目录内容，按创建顺序（即地址顺序）
    pub fn list(&self, dir: EntryId) -> Result<Vec<DirEntry>, FsError> {
        let children = self.children(dir)?;
        let mut out = Vec::new();
        out.try_reserve_exact(children.len())
            .map_err(|_| FsError::OutOfMemory)?;
        for child in children {
            let entry = &self.entries[child.0];
            out.push(DirEntry {
                name: entry.name.clone(),
                inode_no: entry.id.0 + 1,
                inode_type: if entry.kind.is_dir() {
                    InodeType::Directory
                } else {
                    InodeType::File
                },
            });
        }
        Ok(out)
    }

    /// 目录项的绝对路径
    pub fn path(&self, id: EntryId) -> Result<String, FsError> {
        let mut names = Vec::new();
        let mut cur = self.get(id)?;
        while let Some(parent) = cur.parent {
            names.push(cur.name.as_str());
            cur = &self.entries[parent.0];
        }
        let mut path = String::new();
        for name in names.iter().rev() {
            path.push('/');
            path.push_str(name);
        }
        if path.is_empty() {
            path.push('/');
        }
        Ok(path)
    }

    /// 目录项对应的设备记录
    pub fn device_of(&self, id: EntryId) -> Option<&DeviceSlot> {
        let index = self.entries.get(id.0)?.device?;
        self.devices.get(index)
    }

    /// 设备记录
    pub fn devices(&self) -> &[DeviceSlot] {
        &self.devices
    }

    /// 目录项数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空（建好的存储至少有根和 domain 两项）
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 遍历全部目录项
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    /// 构建代数，每次重新扫描加一
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
