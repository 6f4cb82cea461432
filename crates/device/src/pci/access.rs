//! 硬件访问后端接口
//!
//! 仲裁器只通过 [`PciAccess`] 接触硬件；端口指令、内存映射等细节由实现者负责。

use alloc::vec::Vec;
use core::fmt;

use super::types::{PciAddress, PciDevice};

/// 后端错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PciError {
    /// 地址上没有设备
    NoDevice,
    /// 参数无效（访问宽度、越界等）
    InvalidArgument,
    /// 硬件访问失败
    Io,
    /// 内存不足
    OutOfMemory,
    /// 后端不支持该操作
    NotSupported,
}

impl fmt::Display for PciError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            PciError::NoDevice => "no device at address",
            PciError::InvalidArgument => "invalid access",
            PciError::Io => "hardware access failed",
            PciError::OutOfMemory => "out of memory",
            PciError::NotSupported => "operation not supported by backend",
        };
        f.write_str(msg)
    }
}

/// 设备目录与硬件访问接口
///
/// 所有方法都可能被多个工作线程并发调用；实现者自行保证单次访问的原子性，
/// 跨访问的串行化由仲裁器负责。
pub trait PciAccess: Send + Sync {
    /// 枚举所有功能
    fn enumerate(&self) -> Result<Vec<PciDevice>, PciError>;

    /// 读配置空间寄存器
    ///
    /// `buf.len()` 为访问宽度，只能是 1、2 或 4。
    fn config_read(&self, addr: PciAddress, reg: u16, buf: &mut [u8]) -> Result<(), PciError>;

    /// 写配置空间寄存器
    ///
    /// `buf.len()` 为访问宽度，只能是 1、2 或 4。
    fn config_write(&self, addr: PciAddress, reg: u16, buf: &[u8]) -> Result<(), PciError>;

    /// 重新映射/探测指定区域或 ROM，返回最新的设备记录
    ///
    /// `region` 为 BAR 下标，`rom` 为真时刷新扩展 ROM。
    fn refresh(
        &self,
        addr: PciAddress,
        region: Option<usize>,
        rom: bool,
    ) -> Result<PciDevice, PciError>;

    /// 从内存映射区域批量读取
    fn region_read(
        &self,
        addr: PciAddress,
        region: usize,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<(), PciError>;

    /// 向内存映射区域批量写入
    fn region_write(
        &self,
        addr: PciAddress,
        region: usize,
        offset: u64,
        buf: &[u8],
    ) -> Result<(), PciError>;

    /// 读 I/O 端口，`buf.len()` 只能是 1、2 或 4
    fn port_read(&self, port: u64, buf: &mut [u8]) -> Result<(), PciError>;

    /// 写 I/O 端口，`buf.len()` 只能是 1、2 或 4
    fn port_write(&self, port: u64, buf: &[u8]) -> Result<(), PciError>;

    /// 读扩展 ROM 内容
    fn rom_read(&self, addr: PciAddress, offset: u64, buf: &mut [u8]) -> Result<(), PciError>;

    /// 读 8 位配置寄存器
    fn config_read_u8(&self, addr: PciAddress, reg: u16) -> Result<u8, PciError> {
        let mut buf = [0u8; 1];
        self.config_read(addr, reg, &mut buf)?;
        Ok(buf[0])
    }

    /// 读 16 位配置寄存器（小端）
    fn config_read_u16(&self, addr: PciAddress, reg: u16) -> Result<u16, PciError> {
        let mut buf = [0u8; 2];
        self.config_read(addr, reg, &mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    /// 读 32 位配置寄存器（小端）
    fn config_read_u32(&self, addr: PciAddress, reg: u16) -> Result<u32, PciError> {
        let mut buf = [0u8; 4];
        self.config_read(addr, reg, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// 写 32 位配置寄存器（小端）
    fn config_write_u32(&self, addr: PciAddress, reg: u16, value: u32) -> Result<(), PciError> {
        self.config_write(addr, reg, &value.to_le_bytes())
    }
}
