//! 目录树构建
//!
//! 两遍完成：第一遍按层级变化统计需要的目录项数，按精确数量一次性分配；
//! 第二遍顺序写入，沿途维护各层当前的父目录。
//!
//! 生成的布局：
//!
//! ```text
//! /<domain:4 位十六进制>/<bus:2 位>/<device:2 位>/<function:1 位>/{config, region0..5, rom}
//! ```

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use device::{ClassCode, PciAccess, PciAddress, PciDevice};
use uapi::time::TimeSpec;
use vfs::{FileMode, FsError, InodeType, Stat};

use crate::config::{FILE_CONFIG_NAME, FILE_CONFIG_SIZE, FILE_REGION_NAME, FILE_ROM_NAME};
use crate::entry::{DeviceAddress, Entry, EntryId, EntryKind};
use crate::error::pci_error;
use crate::store::{DeviceSlot, EntryStore};

/// 从设备目录枚举并构建目录树
///
/// 枚举失败与分配失败都会原样返回，由调用方决定是否终止启动。
pub fn build(
    catalog: &dyn PciAccess,
    root_stat: &Stat,
    now: TimeSpec,
    generation: u64,
) -> Result<EntryStore, FsError> {
    let devices = catalog.enumerate().map_err(|err| {
        log::error!("pcifs: device enumeration failed: {}", err);
        pci_error(err)
    })?;
    TreeBuilder::new(root_stat, now, generation).build(devices)
}

/// 目录树构建器
pub struct TreeBuilder<'a> {
    root_stat: &'a Stat,
    now: TimeSpec,
    generation: u64,
}

impl<'a> TreeBuilder<'a> {
    /// 以 `root_stat` 作为根目录属性
    pub fn new(root_stat: &'a Stat, now: TimeSpec, generation: u64) -> Self {
        Self {
            root_stat,
            now,
            generation,
        }
    }

    /// 由设备记录构建目录树
    ///
    /// 记录按地址排序；只支持 domain 0，其他段的记录被跳过。
    pub fn build(&self, mut devices: Vec<PciDevice>) -> Result<EntryStore, FsError> {
        devices.retain(|dev| {
            if dev.addr.domain != 0 {
                log::warn!("pcifs: skipping {}: only domain 0 is supported", dev.addr);
                return false;
            }
            true
        });
        devices.sort_by_key(|dev| dev.addr);
        devices.dedup_by_key(|dev| dev.addr);

        let total = count_entries(&devices);

        let mut entries = Vec::new();
        entries
            .try_reserve_exact(total)
            .map_err(|_| FsError::OutOfMemory)?;
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(devices.len())
            .map_err(|_| FsError::OutOfMemory)?;

        let mut tree = Populate {
            entries,
            now: self.now,
        };

        let mut root_stat = self.root_stat.clone();
        root_stat.inode_type = InodeType::Directory;
        tree.push(
            None,
            String::new(),
            DeviceAddress::UNSET,
            None,
            EntryKind::Directory,
            root_stat,
        )?;

        let domain_addr = DeviceAddress::truncated(PciAddress::new(0, 0, 0), 1);
        let domain_dir = tree.push_dir(EntryId::ROOT, format!("{:04x}", 0), domain_addr, None)?;

        let mut cur_bus: Option<(u8, EntryId)> = None;
        let mut cur_dev: Option<(u8, EntryId)> = None;

        for (index, dev) in devices.into_iter().enumerate() {
            let addr = dev.addr;

            let bus_dir = match cur_bus {
                Some((bus, id)) if bus == addr.bus => id,
                _ => {
                    let id = tree.push_dir(
                        domain_dir,
                        format!("{:02x}", addr.bus),
                        DeviceAddress::truncated(addr, 2),
                        None,
                    )?;
                    cur_bus = Some((addr.bus, id));
                    cur_dev = None;
                    id
                }
            };

            let dev_dir = match cur_dev {
                Some((slot, id)) if slot == addr.dev => id,
                _ => {
                    let id = tree.push_dir(
                        bus_dir,
                        format!("{:02x}", addr.dev),
                        DeviceAddress::truncated(addr, 3),
                        None,
                    )?;
                    cur_dev = Some((addr.dev, id));
                    id
                }
            };

            let func_dir = tree.push_dir(
                dev_dir,
                format!("{:01}", addr.func),
                addr.into(),
                Some(dev.class),
            )?;
            tree.entries[func_dir.0].device = Some(index);

            tree.push_file(
                func_dir,
                FILE_CONFIG_NAME.to_string(),
                EntryKind::Config,
                FILE_CONFIG_SIZE,
                index,
            )?;
            for region in dev.present_regions() {
                tree.push_file(
                    func_dir,
                    format!("{}{}", FILE_REGION_NAME, region),
                    EntryKind::Region(region as u8),
                    dev.regions[region].size,
                    index,
                )?;
            }
            if dev.rom.is_present() {
                tree.push_file(
                    func_dir,
                    FILE_ROM_NAME.to_string(),
                    EntryKind::Rom,
                    dev.rom.size,
                    index,
                )?;
            }

            slots.push(DeviceSlot::new(dev));
        }

        debug_assert_eq!(tree.entries.len(), total);
        log::info!(
            "pcifs: built namespace with {} entries for {} functions",
            tree.entries.len(),
            slots.len()
        );

        Ok(EntryStore {
            entries: tree.entries,
            devices: slots,
            generation: self.generation,
        })
    }
}

/// 第一遍：统计目录项数（根与 domain 各一项）
fn count_entries(devices: &[PciDevice]) -> usize {
    let mut total = 2;
    let mut last_bus = None;
    let mut last_dev = None;

    for dev in devices {
        let addr = dev.addr;
        if last_bus != Some(addr.bus) {
            total += 1;
            last_bus = Some(addr.bus);
            last_dev = None;
        }
        if last_dev != Some(addr.dev) {
            total += 1;
            last_dev = Some(addr.dev);
        }
        // function 目录 + config
        total += 2;
        total += dev.present_regions().count();
        if dev.rom.is_present() {
            total += 1;
        }
    }
    total
}

/// 第二遍的写入状态
struct Populate {
    entries: Vec<Entry>,
    now: TimeSpec,
}

impl Populate {
    fn push(
        &mut self,
        parent: Option<EntryId>,
        name: String,
        addr: DeviceAddress,
        class: Option<ClassCode>,
        kind: EntryKind,
        stat: Stat,
    ) -> Result<EntryId, FsError> {
        let id = EntryId(self.entries.len());
        let entry = Entry::new(id, name, addr, class, kind, parent, stat)?;
        if let Some(parent) = parent {
            let siblings = &mut self.entries[parent.0].children;
            siblings.try_reserve(1).map_err(|_| FsError::OutOfMemory)?;
            siblings.push(id);
        }
        self.entries.push(entry);
        Ok(id)
    }

    /// 目录继承父目录的属性
    fn push_dir(
        &mut self,
        parent: EntryId,
        name: String,
        addr: DeviceAddress,
        class: Option<ClassCode>,
    ) -> Result<EntryId, FsError> {
        let mut stat = self.entries[parent.0].stat();
        stat.nlinks = 2;
        self.push(Some(parent), name, addr, class, EntryKind::Directory, stat)
    }

    /// 文件取父目录的读写位，去掉执行位；ROM 再去掉写位
    fn push_file(
        &mut self,
        func_dir: EntryId,
        name: String,
        kind: EntryKind,
        size: u64,
        device: usize,
    ) -> Result<EntryId, FsError> {
        let (parent_mode, uid, gid, addr, class) = {
            let dir = &self.entries[func_dir.0];
            let stat = dir.stat.lock();
            (stat.mode, stat.uid, stat.gid, dir.addr, dir.class)
        };

        let mut perm = parent_mode.permissions() - FileMode::ALL_EXEC;
        if kind == EntryKind::Rom {
            perm -= FileMode::ALL_WRITE;
        }
        let mut stat = Stat::new(InodeType::File, perm, uid, gid, self.now);
        stat.size = size;

        let id = self.push(Some(func_dir), name, addr, class, kind, stat)?;
        self.entries[id.0].device = Some(device);
        Ok(id)
    }
}
