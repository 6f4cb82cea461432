//! PCI 子系统
//!
//! 包含设备记录、寄存器常量、后端接口和总线扫描。

mod access;
pub mod regs;
mod scan;
mod types;

pub use access::{PciAccess, PciError};
pub use scan::{probe_function, scan_devices};
pub use types::{
    ClassCode, PCI_NUM_REGIONS, PciAddress, PciDevice, PciRegion, PciRom, RegionFlags,
};
