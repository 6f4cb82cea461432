//! PCI 硬件后端的 Mock 实现
//!
//! [`MockPciBus`] 在内存中模拟配置空间（含 BAR 尺寸探测的可写掩码）、
//! 内存映射区域、I/O 端口和扩展 ROM，并记录每一次经由 [`PciAccess`] 的访问，
//! 供测试断言访问顺序、宽度和并发行为。
//!
//! 并发检测分两类：配置空间按读写锁语义检测（写与任何访问重叠即冲突），
//! BAR 区域与 ROM 按资源检测（同一资源上的刷新、拷贝或端口访问任意两次重叠即冲突）。

use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;
use core::hint;
use core::sync::atomic::{AtomicUsize, Ordering};

use device::pci::regs::*;
use device::{
    ClassCode, PCI_NUM_REGIONS, PciAccess, PciAddress, PciDevice, PciError, RegionFlags,
    probe_function, scan_devices,
};
use sync::SpinLock;

/// 访问类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Enumerate,
    ConfigRead,
    ConfigWrite,
    Refresh,
    RegionRead,
    RegionWrite,
    PortRead,
    PortWrite,
    RomRead,
}

/// 一次访问记录
///
/// `target` 的含义随类型不同：配置空间为寄存器偏移，端口为端口号，
/// 区域与 ROM 为偏移，刷新为 BAR 下标（只刷新 ROM 时为 [`PCI_NUM_REGIONS`]）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockOp {
    pub kind: OpKind,
    pub target: u64,
    pub size: usize,
}

struct MockFunction {
    config: [u8; PCI_CONFIG_SIZE],
    wmask: [u8; PCI_CONFIG_SIZE],
    regions: [Vec<u8>; PCI_NUM_REGIONS],
    rom: Vec<u8>,
}

impl MockFunction {
    fn new() -> Self {
        let mut f = Self {
            config: [0; PCI_CONFIG_SIZE],
            wmask: [0xFF; PCI_CONFIG_SIZE],
            regions: Default::default(),
            rom: Vec::new(),
        };
        // 身份寄存器只读
        f.wmask[..4].fill(0);
        f.wmask[0x08..0x0C].fill(0);
        f.wmask[PCI_HDRTYPE as usize] = 0;
        // 未实现的 BAR 与 ROM 读回 0
        f.wmask[PCI_BAR0 as usize..PCI_BAR0 as usize + 4 * PCI_NUM_REGIONS].fill(0);
        f.wmask[PCI_XROMBAR as usize..PCI_XROMBAR as usize + 4].fill(0);
        f
    }

    fn put(&mut self, reg: u16, bytes: &[u8]) {
        let start = reg as usize;
        self.config[start..start + bytes.len()].copy_from_slice(bytes);
    }

    fn put_mask(&mut self, reg: u16, mask: u32) {
        let start = reg as usize;
        self.wmask[start..start + 4].copy_from_slice(&mask.to_le_bytes());
    }

    fn masked_write(&mut self, reg: u16, bytes: &[u8]) {
        for (i, b) in bytes.iter().enumerate() {
            let r = reg as usize + i;
            let w = self.wmask[r];
            self.config[r] = (b & w) | (self.config[r] & !w);
        }
    }
}

struct Failure {
    kind: OpKind,
    remaining: usize,
}

/// 区域或 ROM 的标识，ROM 的下标为 [`PCI_NUM_REGIONS`]
type ResourceKey = (PciAddress, usize);

struct MockState {
    functions: BTreeMap<PciAddress, MockFunction>,
    ports: BTreeMap<u64, u8>,
    port_owners: BTreeMap<u64, ResourceKey>,
    in_flight: BTreeMap<ResourceKey, usize>,
    ops: Vec<MockOp>,
    failure: Option<Failure>,
}

/// 内存中的 PCI 总线
pub struct MockPciBus {
    state: SpinLock<MockState>,
    refreshes: AtomicUsize,
    delay_spins: AtomicUsize,
    config_readers: AtomicUsize,
    config_writers: AtomicUsize,
    overlaps: AtomicUsize,
    resource_overlaps: AtomicUsize,
}

impl Default for MockPciBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPciBus {
    pub fn new() -> Self {
        Self {
            state: SpinLock::new(MockState {
                functions: BTreeMap::new(),
                ports: BTreeMap::new(),
                port_owners: BTreeMap::new(),
                in_flight: BTreeMap::new(),
                ops: Vec::new(),
                failure: None,
            }),
            refreshes: AtomicUsize::new(0),
            delay_spins: AtomicUsize::new(0),
            config_readers: AtomicUsize::new(0),
            config_writers: AtomicUsize::new(0),
            overlaps: AtomicUsize::new(0),
            resource_overlaps: AtomicUsize::new(0),
        }
    }

    // ========== 拓扑构造 ==========

    /// 添加一个功能
    ///
    /// 同一槽位出现多个功能时自动为功能 0 设置多功能位。
    pub fn add_function(
        &self,
        addr: PciAddress,
        vendor: u16,
        device_id: u16,
        class: ClassCode,
        header_type: u8,
    ) {
        let mut f = MockFunction::new();
        f.put(PCI_VENDOR_ID, &vendor.to_le_bytes());
        f.put(PCI_DEVICE_ID, &device_id.to_le_bytes());
        f.put(PCI_CLASS, &(class.raw() << 8).to_le_bytes());
        f.put(PCI_HDRTYPE, &[header_type]);

        let mut st = self.state.lock();
        st.functions.insert(addr, f);

        let first = PciAddress { func: 0, ..addr };
        let last = PciAddress { func: 7, ..addr };
        if st.functions.range(first..=last).count() > 1 {
            if let Some(f0) = st.functions.get_mut(&first) {
                f0.config[PCI_HDRTYPE as usize] |= PCI_HDRTYPE_MULTIFUNC;
            }
        }
    }

    /// 移除一个功能（模拟重新扫描前拔出设备）
    pub fn remove_function(&self, addr: PciAddress) {
        self.state.lock().functions.remove(&addr);
    }

    /// 配置一个 BAR
    ///
    /// `size` 必须是 2 的幂；内存区域以 0 填充，I/O 区域的端口初始值为 0。
    /// 对同一 BAR 再次调用即可模拟尺寸变化。
    pub fn set_bar(
        &self,
        addr: PciAddress,
        index: usize,
        base: u64,
        size: u64,
        flags: RegionFlags,
    ) {
        assert!(size.is_power_of_two(), "BAR size must be a power of two");
        let reg = PCI_BAR0 + (index as u16) * 4;
        let size_mask = !(size - 1);

        let mut st = self.state.lock();
        if flags.contains(RegionFlags::IO) {
            for port in base..base + size {
                st.ports.insert(port, 0);
                st.port_owners.insert(port, (addr, index));
            }
        }
        let f = st.functions.get_mut(&addr).expect("unknown function");

        if flags.contains(RegionFlags::IO) {
            f.put(reg, &((base as u32 & PCI_BAR_IO_MASK) | PCI_BAR_IO).to_le_bytes());
            f.put_mask(reg, size_mask as u32 & PCI_BAR_IO_MASK);
            f.regions[index] = Vec::new();
            return;
        }

        let mut low = base as u32 & PCI_BAR_MEM_MASK;
        if flags.contains(RegionFlags::PREFETCH) {
            low |= PCI_BAR_PREFETCH;
        }
        if flags.contains(RegionFlags::MEM64) {
            assert!(index + 1 < PCI_NUM_REGIONS, "64-bit BAR needs two slots");
            low |= PCI_BAR_MEM64;
            f.put(reg + 4, &((base >> 32) as u32).to_le_bytes());
            f.put_mask(reg + 4, (size_mask >> 32) as u32);
        }
        f.put(reg, &low.to_le_bytes());
        f.put_mask(reg, size_mask as u32 & PCI_BAR_MEM_MASK);
        f.regions[index] = vec![0; size as usize];
    }

    /// 安装扩展 ROM 镜像，尺寸向上取整到 2 的幂（至少 2 KiB），空余部分填 0xFF
    pub fn set_rom(&self, addr: PciAddress, image: &[u8]) {
        let size = image.len().next_power_of_two().max(2048);
        let mut rom = vec![0xFF; size];
        rom[..image.len()].copy_from_slice(image);

        let mut st = self.state.lock();
        let f = st.functions.get_mut(&addr).expect("unknown function");
        f.put(PCI_XROMBAR, &0xC000_0000u32.to_le_bytes());
        f.put_mask(
            PCI_XROMBAR,
            (!(size as u32 - 1) & PCI_XROM_ADDR_MASK) | PCI_XROM_ENABLE,
        );
        f.rom = rom;
    }

    /// 直接写内存区域内容
    pub fn write_region(&self, addr: PciAddress, index: usize, offset: usize, bytes: &[u8]) {
        let mut st = self.state.lock();
        let f = st.functions.get_mut(&addr).expect("unknown function");
        f.regions[index][offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// 设置端口值
    pub fn set_port(&self, port: u64, value: u8) {
        self.state.lock().ports.insert(port, value);
    }

    // ========== 检查 ==========

    /// 配置空间快照
    pub fn config(&self, addr: PciAddress) -> Option<[u8; PCI_CONFIG_SIZE]> {
        self.state.lock().functions.get(&addr).map(|f| f.config)
    }

    /// 内存区域快照
    pub fn region(&self, addr: PciAddress, index: usize) -> Vec<u8> {
        self.state
            .lock()
            .functions
            .get(&addr)
            .map(|f| f.regions[index].clone())
            .unwrap_or_default()
    }

    /// 端口当前值，未映射端口读为 0xFF
    pub fn port(&self, port: u64) -> u8 {
        self.state.lock().ports.get(&port).copied().unwrap_or(0xFF)
    }

    /// 已记录的访问
    pub fn ops(&self) -> Vec<MockOp> {
        self.state.lock().ops.clone()
    }

    /// 指定类型的访问
    pub fn ops_of(&self, kind: OpKind) -> Vec<MockOp> {
        self.state
            .lock()
            .ops
            .iter()
            .filter(|op| op.kind == kind)
            .copied()
            .collect()
    }

    /// 清空访问记录
    pub fn clear_ops(&self) {
        self.state.lock().ops.clear();
    }

    /// 刷新次数
    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// 观察到的配置空间并发冲突次数（写与任何其它配置访问重叠）
    pub fn overlap_count(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    /// 观察到的区域与 ROM 并发冲突次数（同一资源上两次访问重叠）
    pub fn resource_overlap_count(&self) -> usize {
        self.resource_overlaps.load(Ordering::SeqCst)
    }

    /// 每次配置、区域、端口、ROM 访问及刷新内部自旋的次数，用于放大并发窗口
    pub fn set_access_delay(&self, spins: usize) {
        self.delay_spins.store(spins, Ordering::SeqCst);
    }

    /// 让之后第 `nth` 次（从 0 计）`kind` 类型访问失败，返回 [`PciError::Io`]
    pub fn fail_nth(&self, kind: OpKind, nth: usize) {
        self.state.lock().failure = Some(Failure {
            kind,
            remaining: nth,
        });
    }

    // ========== 内部 ==========

    fn record(&self, kind: OpKind, target: u64, size: usize) -> Result<(), PciError> {
        let mut st = self.state.lock();
        st.ops.push(MockOp { kind, target, size });
        if let Some(failure) = st.failure.as_mut() {
            if failure.kind == kind {
                if failure.remaining == 0 {
                    st.failure = None;
                    return Err(PciError::Io);
                }
                failure.remaining -= 1;
            }
        }
        Ok(())
    }

    fn enter_config(&self, write: bool) {
        if write {
            let writers = self.config_writers.fetch_add(1, Ordering::SeqCst);
            if writers > 0 || self.config_readers.load(Ordering::SeqCst) > 0 {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
        } else {
            self.config_readers.fetch_add(1, Ordering::SeqCst);
            if self.config_writers.load(Ordering::SeqCst) > 0 {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
        }
        self.spin();
    }

    fn spin(&self) {
        for _ in 0..self.delay_spins.load(Ordering::Relaxed) {
            hint::spin_loop();
        }
    }

    fn enter_resource(&self, key: ResourceKey) {
        let prev = {
            let mut st = self.state.lock();
            let count = st.in_flight.entry(key).or_insert(0);
            *count += 1;
            *count - 1
        };
        if prev > 0 {
            self.resource_overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.spin();
    }

    fn leave_resource(&self, key: ResourceKey) {
        if let Some(count) = self.state.lock().in_flight.get_mut(&key) {
            *count -= 1;
        }
    }

    /// 在 `key` 的在途计数内执行一次访问；不属于任何资源的端口不计数
    fn tracked<R>(&self, key: Option<ResourceKey>, f: impl FnOnce() -> R) -> R {
        let Some(key) = key else {
            return f();
        };
        self.enter_resource(key);
        let res = f();
        self.leave_resource(key);
        res
    }

    fn port_owner(&self, port: u64) -> Option<ResourceKey> {
        self.state.lock().port_owners.get(&port).copied()
    }

    fn leave_config(&self, write: bool) {
        if write {
            self.config_writers.fetch_sub(1, Ordering::SeqCst);
        } else {
            self.config_readers.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn raw_config_read(&self, addr: PciAddress, reg: u16, buf: &mut [u8]) -> Result<(), PciError> {
        let st = self.state.lock();
        let f = st.functions.get(&addr).ok_or(PciError::NoDevice)?;
        let start = reg as usize;
        let end = start + buf.len();
        if end > PCI_CONFIG_SIZE {
            return Err(PciError::InvalidArgument);
        }
        buf.copy_from_slice(&f.config[start..end]);
        Ok(())
    }

    fn raw_config_write(&self, addr: PciAddress, reg: u16, buf: &[u8]) -> Result<(), PciError> {
        let mut st = self.state.lock();
        let f = st.functions.get_mut(&addr).ok_or(PciError::NoDevice)?;
        if reg as usize + buf.len() > PCI_CONFIG_SIZE {
            return Err(PciError::InvalidArgument);
        }
        f.masked_write(reg, buf);
        Ok(())
    }
}

fn check_width(len: usize) -> Result<(), PciError> {
    match len {
        1 | 2 | 4 => Ok(()),
        _ => Err(PciError::InvalidArgument),
    }
}

/// 不记录、不计数的配置空间视图，供扫描与刷新时的探测使用
struct Quiet<'a>(&'a MockPciBus);

impl PciAccess for Quiet<'_> {
    fn enumerate(&self) -> Result<Vec<PciDevice>, PciError> {
        scan_devices(self)
    }

    fn config_read(&self, addr: PciAddress, reg: u16, buf: &mut [u8]) -> Result<(), PciError> {
        self.0.raw_config_read(addr, reg, buf)
    }

    fn config_write(&self, addr: PciAddress, reg: u16, buf: &[u8]) -> Result<(), PciError> {
        self.0.raw_config_write(addr, reg, buf)
    }

    fn refresh(&self, _: PciAddress, _: Option<usize>, _: bool) -> Result<PciDevice, PciError> {
        Err(PciError::NotSupported)
    }

    fn region_read(&self, _: PciAddress, _: usize, _: u64, _: &mut [u8]) -> Result<(), PciError> {
        Err(PciError::NotSupported)
    }

    fn region_write(&self, _: PciAddress, _: usize, _: u64, _: &[u8]) -> Result<(), PciError> {
        Err(PciError::NotSupported)
    }

    fn port_read(&self, _: u64, _: &mut [u8]) -> Result<(), PciError> {
        Err(PciError::NotSupported)
    }

    fn port_write(&self, _: u64, _: &[u8]) -> Result<(), PciError> {
        Err(PciError::NotSupported)
    }

    fn rom_read(&self, _: PciAddress, _: u64, _: &mut [u8]) -> Result<(), PciError> {
        Err(PciError::NotSupported)
    }
}

impl PciAccess for MockPciBus {
    fn enumerate(&self) -> Result<Vec<PciDevice>, PciError> {
        self.record(OpKind::Enumerate, 0, 0)?;
        scan_devices(&Quiet(self))
    }

    fn config_read(&self, addr: PciAddress, reg: u16, buf: &mut [u8]) -> Result<(), PciError> {
        check_width(buf.len())?;
        self.record(OpKind::ConfigRead, reg as u64, buf.len())?;
        self.enter_config(false);
        let res = self.raw_config_read(addr, reg, buf);
        self.leave_config(false);
        res
    }

    fn config_write(&self, addr: PciAddress, reg: u16, buf: &[u8]) -> Result<(), PciError> {
        check_width(buf.len())?;
        self.record(OpKind::ConfigWrite, reg as u64, buf.len())?;
        self.enter_config(true);
        let res = self.raw_config_write(addr, reg, buf);
        self.leave_config(true);
        res
    }

    fn refresh(
        &self,
        addr: PciAddress,
        region: Option<usize>,
        _rom: bool,
    ) -> Result<PciDevice, PciError> {
        let target = region.unwrap_or(PCI_NUM_REGIONS);
        self.record(OpKind::Refresh, target as u64, 0)?;
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        self.tracked(Some((addr, target)), || -> Result<PciDevice, PciError> {
            probe_function(&Quiet(self), addr)?.ok_or(PciError::NoDevice)
        })
    }

    fn region_read(
        &self,
        addr: PciAddress,
        region: usize,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<(), PciError> {
        self.record(OpKind::RegionRead, offset, buf.len())?;
        self.tracked(Some((addr, region)), || -> Result<(), PciError> {
            let st = self.state.lock();
            let f = st.functions.get(&addr).ok_or(PciError::NoDevice)?;
            let mem = f.regions.get(region).ok_or(PciError::InvalidArgument)?;
            let start = offset as usize;
            let end = start + buf.len();
            if end > mem.len() {
                return Err(PciError::InvalidArgument);
            }
            buf.copy_from_slice(&mem[start..end]);
            Ok(())
        })
    }

    fn region_write(
        &self,
        addr: PciAddress,
        region: usize,
        offset: u64,
        buf: &[u8],
    ) -> Result<(), PciError> {
        self.record(OpKind::RegionWrite, offset, buf.len())?;
        self.tracked(Some((addr, region)), || -> Result<(), PciError> {
            let mut st = self.state.lock();
            let f = st.functions.get_mut(&addr).ok_or(PciError::NoDevice)?;
            let mem = f.regions.get_mut(region).ok_or(PciError::InvalidArgument)?;
            let start = offset as usize;
            let end = start + buf.len();
            if end > mem.len() {
                return Err(PciError::InvalidArgument);
            }
            mem[start..end].copy_from_slice(buf);
            Ok(())
        })
    }

    fn port_read(&self, port: u64, buf: &mut [u8]) -> Result<(), PciError> {
        check_width(buf.len())?;
        self.record(OpKind::PortRead, port, buf.len())?;
        self.tracked(self.port_owner(port), || -> Result<(), PciError> {
            let st = self.state.lock();
            for (i, b) in buf.iter_mut().enumerate() {
                *b = st.ports.get(&(port + i as u64)).copied().unwrap_or(0xFF);
            }
            Ok(())
        })
    }

    fn port_write(&self, port: u64, buf: &[u8]) -> Result<(), PciError> {
        check_width(buf.len())?;
        self.record(OpKind::PortWrite, port, buf.len())?;
        self.tracked(self.port_owner(port), || -> Result<(), PciError> {
            let mut st = self.state.lock();
            for (i, b) in buf.iter().enumerate() {
                st.ports.insert(port + i as u64, *b);
            }
            Ok(())
        })
    }

    fn rom_read(&self, addr: PciAddress, offset: u64, buf: &mut [u8]) -> Result<(), PciError> {
        self.record(OpKind::RomRead, offset, buf.len())?;
        self.tracked(Some((addr, PCI_NUM_REGIONS)), || -> Result<(), PciError> {
            let st = self.state.lock();
            let f = st.functions.get(&addr).ok_or(PciError::NoDevice)?;
            let start = offset as usize;
            let end = start + buf.len();
            if end > f.rom.len() {
                return Err(PciError::InvalidArgument);
            }
            buf.copy_from_slice(&f.rom[start..end]);
            Ok(())
        })
    }
}
