//! 设备记录类型

use core::fmt;

/// 每个功能的 BAR 数量
pub const PCI_NUM_REGIONS: usize = 6;

/// 传统 PCI 地址：domain/bus/device/function
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PciAddress {
    /// 段号（仅支持 0）
    pub domain: u16,
    /// 总线号
    pub bus: u8,
    /// 设备号 (0..32)
    pub dev: u8,
    /// 功能号 (0..8)
    pub func: u8,
}

impl PciAddress {
    /// 创建 domain 0 上的地址
    pub const fn new(bus: u8, dev: u8, func: u8) -> Self {
        Self {
            domain: 0,
            bus,
            dev,
            func,
        }
    }

    /// 指定段号
    pub const fn with_domain(mut self, domain: u16) -> Self {
        self.domain = domain;
        self
    }

    /// 与 `(bus, dev, func)` 三元组是否相同
    pub fn matches_bdf(&self, bus: u8, dev: u8, func: u8) -> bool {
        self.bus == bus && self.dev == dev && self.func == func
    }
}

impl fmt::Display for PciAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:02x}:{:02x}.{}",
            self.domain, self.bus, self.dev, self.func
        )
    }
}

/// 打包的类别码：`class << 16 | subclass << 8 | prog_if`
///
/// 即类别寄存器 (`PCI_CLASS`) 右移 8 位后的值。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClassCode(u32);

impl ClassCode {
    /// 由三个字段构造
    pub const fn new(class: u8, subclass: u8, prog_if: u8) -> Self {
        Self(((class as u32) << 16) | ((subclass as u32) << 8) | prog_if as u32)
    }

    /// 由类别寄存器原值构造（低 8 位为 revision，丢弃）
    pub const fn from_class_reg(reg: u32) -> Self {
        Self(reg >> 8)
    }

    /// 打包值
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// 主类别
    pub const fn class(&self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// 子类别
    pub const fn subclass(&self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// 编程接口
    pub const fn prog_if(&self) -> u8 {
        self.0 as u8
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    /// BAR 属性
    pub struct RegionFlags: u8 {
        /// I/O 端口空间
        const IO       = 1 << 0;
        /// 64 位内存 BAR
        const MEM64    = 1 << 1;
        /// 可预取
        const PREFETCH = 1 << 2;
    }
}

/// 一个 BAR 描述的地址区域
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PciRegion {
    /// 基址（I/O 区域为端口号）
    pub base_addr: u64,
    /// 大小，0 表示未实现
    pub size: u64,
    /// 属性
    pub flags: RegionFlags,
}

impl PciRegion {
    /// 是否存在
    pub fn is_present(&self) -> bool {
        self.size > 0
    }

    /// 是否为 I/O 端口区域
    pub fn is_io(&self) -> bool {
        self.flags.contains(RegionFlags::IO)
    }

    /// 是否为 64 位 BAR
    pub fn is_64bit(&self) -> bool {
        self.flags.contains(RegionFlags::MEM64)
    }

    /// 是否可预取
    pub fn is_prefetchable(&self) -> bool {
        self.flags.contains(RegionFlags::PREFETCH)
    }
}

/// 扩展 ROM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PciRom {
    /// 总线地址
    pub base_addr: u64,
    /// 大小，0 表示没有 ROM
    pub size: u64,
}

impl PciRom {
    /// 是否存在
    pub fn is_present(&self) -> bool {
        self.size > 0
    }
}

/// 设备目录中的一条记录（对应一个 PCI 功能）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PciDevice {
    /// 地址
    pub addr: PciAddress,
    /// 类别码
    pub class: ClassCode,
    /// 厂商 ID
    pub vendor_id: u16,
    /// 设备 ID
    pub device_id: u16,
    /// 头类型（去掉多功能位）
    pub header_type: u8,
    /// BAR 区域
    pub regions: [PciRegion; PCI_NUM_REGIONS],
    /// 扩展 ROM
    pub rom: PciRom,
}

impl PciDevice {
    /// 创建没有任何 BAR 与 ROM 的记录
    pub fn new(addr: PciAddress, class: ClassCode) -> Self {
        Self {
            addr,
            class,
            vendor_id: 0,
            device_id: 0,
            header_type: 0,
            regions: [PciRegion::default(); PCI_NUM_REGIONS],
            rom: PciRom::default(),
        }
    }

    /// 已实现的 BAR 下标
    pub fn present_regions(&self) -> impl Iterator<Item = usize> + '_ {
        self.regions
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_present())
            .map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_class_code_fields() {
        let class = ClassCode::from_class_reg(0x0c03_3001);
        assert_eq!(class.class(), 0x0c);
        assert_eq!(class.subclass(), 0x03);
        assert_eq!(class.prog_if(), 0x30);
        assert_eq!(class, ClassCode::new(0x0c, 0x03, 0x30));
    }

    #[test]
    fn test_address_display() {
        let addr = PciAddress::new(0x1f, 3, 2);
        assert_eq!(addr.to_string(), "0000:1f:03.2");
        assert!(addr.matches_bdf(0x1f, 3, 2));
        assert!(!addr.matches_bdf(0x1f, 3, 1));
    }
}
