//! 总线扫描
//!
//! 只依赖配置空间读写，后端可以直接用它实现 [`PciAccess::enumerate`]。

use alloc::vec::Vec;

use super::access::{PciAccess, PciError};
use super::regs::*;
use super::types::{ClassCode, PCI_NUM_REGIONS, PciAddress, PciDevice, PciRegion, PciRom, RegionFlags};

/// 扫描 domain 0 上的全部总线，按地址顺序返回所有存在的功能
///
/// 某个槽位的配置读失败时跳过该槽位，不中断整个扫描。
pub fn scan_devices<A: PciAccess + ?Sized>(bus: &A) -> Result<Vec<PciDevice>, PciError> {
    let mut devices = Vec::new();

    for bus_no in 0..PCI_MAX_BUS {
        for dev in 0..PCI_MAX_DEV {
            let slot = PciAddress::new(bus_no as u8, dev as u8, 0);
            let nfuncs = match bus.config_read_u8(slot, PCI_HDRTYPE) {
                Ok(hdr) if hdr & PCI_HDRTYPE_MULTIFUNC != 0 => PCI_MAX_FUNC,
                Ok(_) => 1,
                Err(_) => continue,
            };

            for func in 0..nfuncs {
                let addr = PciAddress::new(bus_no as u8, dev as u8, func as u8);
                if let Some(device) = probe_function(bus, addr)? {
                    devices
                        .try_reserve(1)
                        .map_err(|_| PciError::OutOfMemory)?;
                    devices.push(device);
                }
            }
        }
    }

    log::debug!("pci: scan found {} functions", devices.len());
    Ok(devices)
}

/// 探测单个功能
///
/// 没有设备（厂商 ID 为 `0xFFFF` 或 0，或读失败）时返回 `Ok(None)`。
/// 探测 BAR 时会临时写入全 1 再恢复原值。
pub fn probe_function<A: PciAccess + ?Sized>(
    bus: &A,
    addr: PciAddress,
) -> Result<Option<PciDevice>, PciError> {
    let vendor = match bus.config_read_u16(addr, PCI_VENDOR_ID) {
        Ok(v) => v,
        Err(_) => return Ok(None),
    };
    if vendor == PCI_VENDOR_INVALID || vendor == 0 {
        return Ok(None);
    }
    let class_reg = match bus.config_read_u32(addr, PCI_CLASS) {
        Ok(reg) => reg,
        Err(_) => return Ok(None),
    };

    let mut device = PciDevice::new(addr, ClassCode::from_class_reg(class_reg));
    device.vendor_id = vendor;
    device.device_id = bus.config_read_u16(addr, PCI_DEVICE_ID)?;
    device.header_type = bus.config_read_u8(addr, PCI_HDRTYPE)? & PCI_HDRTYPE_MASK;

    let (nbars, rom_reg) = match device.header_type {
        PCI_HDRTYPE_DEVICE => (PCI_NUM_REGIONS, Some(PCI_XROMBAR)),
        PCI_HDRTYPE_BRIDGE => (2, Some(PCI_XROMBAR_BRIDGE)),
        // CardBus 等其他头类型没有标准 BAR 布局
        _ => (0, None),
    };

    let mut index = 0;
    while index < nbars {
        let (region, consumed) = probe_bar(bus, addr, index, nbars)?;
        device.regions[index] = region;
        index += consumed;
    }

    if let Some(reg) = rom_reg {
        device.rom = probe_rom(bus, addr, reg)?;
    }

    Ok(Some(device))
}

/// 探测一个 BAR，返回区域描述和占用的 BAR 槽数（64 位 BAR 占两个）
fn probe_bar<A: PciAccess + ?Sized>(
    bus: &A,
    addr: PciAddress,
    index: usize,
    nbars: usize,
) -> Result<(PciRegion, usize), PciError> {
    let reg = PCI_BAR0 + (index as u16) * 4;
    let original = bus.config_read_u32(addr, reg)?;
    bus.config_write_u32(addr, reg, 0xFFFF_FFFF)?;
    let mask = bus.config_read_u32(addr, reg)?;
    bus.config_write_u32(addr, reg, original)?;

    if original & PCI_BAR_IO != 0 {
        // 端口空间只有 16 位
        let bits = mask & PCI_BAR_IO_MASK & 0xFFFF;
        if bits == 0 {
            return Ok((PciRegion::default(), 1));
        }
        let region = PciRegion {
            base_addr: (original & PCI_BAR_IO_MASK & 0xFFFF) as u64,
            size: (!bits & 0xFFFF) as u64 + 1,
            flags: RegionFlags::IO,
        };
        return Ok((region, 1));
    }

    let mut flags = RegionFlags::empty();
    if original & PCI_BAR_PREFETCH != 0 {
        flags |= RegionFlags::PREFETCH;
    }
    let is_64bit = (original >> 1) & 0x3 == 2 && index + 1 < nbars;

    let mut base = (original & PCI_BAR_MEM_MASK) as u64;
    let mut mask64 = (mask & PCI_BAR_MEM_MASK) as u64 | 0xFFFF_FFFF_0000_0000;
    let mut consumed = 1;
    if is_64bit {
        flags |= RegionFlags::MEM64;
        let upper_reg = reg + 4;
        let upper = bus.config_read_u32(addr, upper_reg)?;
        bus.config_write_u32(addr, upper_reg, 0xFFFF_FFFF)?;
        let upper_mask = bus.config_read_u32(addr, upper_reg)?;
        bus.config_write_u32(addr, upper_reg, upper)?;
        base |= (upper as u64) << 32;
        mask64 = ((upper_mask as u64) << 32) | (mask & PCI_BAR_MEM_MASK) as u64;
        consumed = 2;
    }

    let unimplemented = if is_64bit {
        mask64 == 0
    } else {
        mask & PCI_BAR_MEM_MASK == 0
    };
    if unimplemented {
        return Ok((PciRegion::default(), consumed));
    }

    let region = PciRegion {
        base_addr: base,
        size: (!mask64).wrapping_add(1),
        flags,
    };
    Ok((region, consumed))
}

/// 探测扩展 ROM BAR
fn probe_rom<A: PciAccess + ?Sized>(
    bus: &A,
    addr: PciAddress,
    reg: u16,
) -> Result<PciRom, PciError> {
    let original = bus.config_read_u32(addr, reg)?;
    bus.config_write_u32(addr, reg, PCI_XROM_ADDR_MASK)?;
    let mask = bus.config_read_u32(addr, reg)? & PCI_XROM_ADDR_MASK;
    bus.config_write_u32(addr, reg, original)?;

    if mask == 0 {
        return Ok(PciRom::default());
    }
    Ok(PciRom {
        base_addr: (original & PCI_XROM_ADDR_MASK) as u64,
        size: (!mask).wrapping_add(1) as u64,
    })
}
