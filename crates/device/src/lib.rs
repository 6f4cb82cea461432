//! PCI 设备目录与硬件访问接口
//!
//! 此 crate 提供仲裁器所依赖的设备层抽象，包括：
//!
//! - [`PciAccess`] trait - 配置空间、BAR 区域、端口与 ROM 的统一访问接口
//! - [`PciDevice`] - 枚举得到的设备记录（地址、类别、BAR 几何、ROM）
//! - [`scan_devices`] - 基于配置空间原语的总线扫描
//!
//! 具体后端（端口指令、内存映射）由宿主实现 [`PciAccess`] 后注入。

#![no_std]

extern crate alloc;

pub mod pci;

pub use pci::{
    ClassCode, PCI_NUM_REGIONS, PciAccess, PciAddress, PciDevice, PciError, PciRegion, PciRom,
    RegionFlags, probe_function, scan_devices,
};
