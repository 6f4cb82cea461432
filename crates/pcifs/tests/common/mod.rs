//! 集成测试共用的时钟注册与设备拓扑

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Once};

use device::{ClassCode, PciAddress, RegionFlags};
use pcifs::{Options, PciFs};
use test_support::mock::pci::MockPciBus;
use uapi::time::TimeSpec;
use vfs::{FileMode, InodeType, Stat, VfsOps};

static INIT: Once = Once::new();

struct TestClock {
    nanos: AtomicU64,
}

impl VfsOps for TestClock {
    fn timespec_now(&self) -> TimeSpec {
        TimeSpec::from_nanos(self.nanos.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

static TEST_CLOCK: TestClock = TestClock {
    nanos: AtomicU64::new(0),
};

pub fn init_once() {
    INIT.call_once(|| unsafe {
        vfs::register_vfs_ops(&TEST_CLOCK);
    });
}

pub const NIC: PciAddress = PciAddress::new(0, 3, 0);
pub const BRIDGE: PciAddress = PciAddress::new(0, 0, 0);
pub const AUDIO: PciAddress = PciAddress::new(0, 0x1f, 3);
pub const ISA: PciAddress = PciAddress::new(0, 0x1f, 0);

pub const NIC_MEM_BASE: u64 = 0xfebc_0000;
pub const NIC_IO_BASE: u64 = 0xc000;

pub fn nic_class() -> ClassCode {
    ClassCode::new(0x02, 0x00, 0x00)
}

/// 一个网卡：region0 为 128 KiB 内存，region2 为 8 个端口，带 ROM
pub fn nic_bus() -> Arc<MockPciBus> {
    let bus = Arc::new(MockPciBus::new());
    add_nic(&bus);
    bus
}

pub fn add_nic(bus: &MockPciBus) {
    bus.add_function(NIC, 0x8086, 0x100e, nic_class(), 0);
    bus.set_bar(NIC, 0, NIC_MEM_BASE, 0x2_0000, RegionFlags::empty());
    bus.set_bar(NIC, 2, NIC_IO_BASE, 8, RegionFlags::IO);
    bus.set_rom(NIC, &[0x55, 0xAA, 0x10]);
}

/// 主桥 + 网卡 + 多功能的 ISA/音频设备
pub fn mixed_bus() -> Arc<MockPciBus> {
    let bus = Arc::new(MockPciBus::new());
    bus.add_function(BRIDGE, 0x8086, 0x1237, ClassCode::new(0x06, 0x00, 0x00), 0);
    add_nic(&bus);
    bus.add_function(ISA, 0x8086, 0x2918, ClassCode::new(0x06, 0x01, 0x00), 0);
    bus.add_function(AUDIO, 0x8086, 0x293e, ClassCode::new(0x04, 0x03, 0x00), 0);
    bus.set_bar(AUDIO, 0, 0xfeb0_0000, 0x4000, RegionFlags::empty());
    bus
}

/// 挂载点原有节点：root 所有的 0755 目录
pub fn underlying() -> Stat {
    Stat::new(
        InodeType::Directory,
        FileMode::from_bits_truncate(0o755),
        0,
        0,
        TimeSpec::zero(),
    )
}

pub fn mount(bus: &Arc<MockPciBus>, args: &[&str]) -> PciFs {
    init_once();
    let options = Options::parse(args.iter().copied()).expect("valid options");
    PciFs::new(bus.clone(), &underlying(), options).expect("mount")
}

pub fn path_of(addr: PciAddress, file: &str) -> String {
    format!(
        "/{:04x}/{:02x}/{:02x}/{}/{}",
        addr.domain, addr.bus, addr.dev, addr.func, file
    )
}
