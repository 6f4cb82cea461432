//! 资源访问仲裁
//!
//! 每类资源实现 [`Resource`]：
//!
//! - [`ConfigSpace`]：256 字节配置空间，按 4/2/1 字节拆分，读共享、写独占全局配置锁
//! - [`RegionResource`]：BAR 区域，先刷新再按刷新后的大小裁剪；I/O 区域拆分为端口访问，
//!   内存区域整体拷贝
//! - [`RomResource`]：扩展 ROM，只读
//!
//! 所有访问先裁剪：`offset` 超过资源大小返回 `InvalidArgument`，长度截断到资源末尾。

use alloc::boxed::Box;

use device::{PciAccess, PciAddress, PciError, PciRegion, PciRom};
use sync::RwLock;
use vfs::{FsError, TouchFlags, vfs_ops};

use crate::config::FILE_CONFIG_SIZE;
use crate::entry::{Entry, EntryKind};
use crate::error::{TransferError, pci_error};
use crate::store::{DeviceSlot, EntryStore};

/// 一类可读写的设备资源
pub trait Resource {
    /// 资源大小
    fn size(&self) -> u64;

    /// 从 `offset` 读取，返回实际读取的字节数
    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize, TransferError>;

    /// 向 `offset` 写入，返回实际写入的字节数
    fn write(&self, offset: u64, buf: &[u8]) -> Result<usize, TransferError>;
}

/// 把请求裁剪到资源范围内
pub fn clip(offset: u64, len: usize, size: u64) -> Result<usize, FsError> {
    if offset > size {
        return Err(FsError::InvalidArgument);
    }
    Ok(len.min((size - offset) as usize))
}

/// 拆分后的每次访问：`(起始位置, 宽度)`
///
/// 剩余不少于 4 字节时按 4 字节，之后至多一次 2 字节，再至多一次 1 字节。
pub fn split_chunks(len: usize) -> impl Iterator<Item = (usize, usize)> {
    let words = len / 4;
    let tail = len % 4;
    let half = (tail >= 2).then_some((words * 4, 2));
    let byte = (tail % 2 == 1).then_some((len - 1, 1));
    (0..words).map(|i| (i * 4, 4)).chain(half).chain(byte)
}

/// 依次执行拆分后的访问，第一次失败即中止并报告已完成的字节数
fn split_transfer(
    len: usize,
    mut op: impl FnMut(usize, usize) -> Result<(), PciError>,
) -> Result<usize, TransferError> {
    let mut done = 0;
    for (pos, width) in split_chunks(len) {
        op(pos, width).map_err(|err| {
            log::warn!("pcifs: {}-byte access failed after {} bytes: {}", width, done, err);
            TransferError {
                error: pci_error(err),
                transferred: done,
            }
        })?;
        done += width;
    }
    Ok(done)
}

fn whole(err: PciError) -> TransferError {
    TransferError::new(pci_error(err))
}

/// 配置空间
pub struct ConfigSpace<'a> {
    backend: &'a dyn PciAccess,
    lock: &'a RwLock<()>,
    addr: PciAddress,
}

impl Resource for ConfigSpace<'_> {
    fn size(&self) -> u64 {
        FILE_CONFIG_SIZE
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize, TransferError> {
        let len = clip(offset, buf.len(), FILE_CONFIG_SIZE)?;
        let _guard = self.lock.read();
        split_transfer(len, |pos, width| {
            let reg = (offset as usize + pos) as u16;
            self.backend
                .config_read(self.addr, reg, &mut buf[pos..pos + width])
        })
    }

    fn write(&self, offset: u64, buf: &[u8]) -> Result<usize, TransferError> {
        let len = clip(offset, buf.len(), FILE_CONFIG_SIZE)?;
        let _guard = self.lock.write();
        split_transfer(len, |pos, width| {
            let reg = (offset as usize + pos) as u16;
            self.backend
                .config_write(self.addr, reg, &buf[pos..pos + width])
        })
    }
}

/// BAR 区域
pub struct RegionResource<'a> {
    backend: &'a dyn PciAccess,
    slot: &'a DeviceSlot,
    entry: &'a Entry,
    index: usize,
}

impl RegionResource<'_> {
    /// 重新探测区域几何；调用方必须持有该区域的锁
    fn refresh(&self) -> Result<PciRegion, TransferError> {
        let addr = self.slot.addr();
        let fresh = self
            .backend
            .refresh(addr, Some(self.index), false)
            .map_err(whole)?;
        let region = fresh.regions[self.index];
        let mut stat = self.entry.stat.lock();
        if stat.size != region.size {
            log::debug!(
                "pcifs: {} region{} resized from {:#x} to {:#x}",
                addr,
                self.index,
                stat.size,
                region.size
            );
            stat.size = region.size;
        }
        drop(stat);
        self.slot.update(fresh);
        Ok(region)
    }
}

impl Resource for RegionResource<'_> {
    fn size(&self) -> u64 {
        self.slot.record().regions[self.index].size
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize, TransferError> {
        let _guard = self.slot.regions[self.index].lock();
        let region = self.refresh()?;
        let len = clip(offset, buf.len(), region.size)?;

        if region.is_io() {
            let port = region.base_addr + offset;
            return split_transfer(len, |pos, width| {
                self.backend
                    .port_read(port + pos as u64, &mut buf[pos..pos + width])
            });
        }

        self.backend
            .region_read(self.slot.addr(), self.index, offset, &mut buf[..len])
            .map_err(whole)?;
        Ok(len)
    }

    fn write(&self, offset: u64, buf: &[u8]) -> Result<usize, TransferError> {
        let _guard = self.slot.regions[self.index].lock();
        let region = self.refresh()?;
        let len = clip(offset, buf.len(), region.size)?;

        if region.is_io() {
            let port = region.base_addr + offset;
            return split_transfer(len, |pos, width| {
                self.backend
                    .port_write(port + pos as u64, &buf[pos..pos + width])
            });
        }

        self.backend
            .region_write(self.slot.addr(), self.index, offset, &buf[..len])
            .map_err(whole)?;
        Ok(len)
    }
}

/// 扩展 ROM
pub struct RomResource<'a> {
    backend: &'a dyn PciAccess,
    slot: &'a DeviceSlot,
    entry: &'a Entry,
}

impl RomResource<'_> {
    fn refresh(&self) -> Result<PciRom, TransferError> {
        let fresh = self
            .backend
            .refresh(self.slot.addr(), None, true)
            .map_err(whole)?;
        let rom = fresh.rom;
        self.entry.stat.lock().size = rom.size;
        self.slot.update(fresh);
        Ok(rom)
    }
}

impl Resource for RomResource<'_> {
    fn size(&self) -> u64 {
        self.slot.record().rom.size
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize, TransferError> {
        let _guard = self.slot.rom.lock();
        let rom = self.refresh()?;
        let len = clip(offset, buf.len(), rom.size)?;
        self.backend
            .rom_read(self.slot.addr(), offset, &mut buf[..len])
            .map_err(whole)?;
        Ok(len)
    }

    fn write(&self, _offset: u64, _buf: &[u8]) -> Result<usize, TransferError> {
        Err(TransferError::new(FsError::NotSupported))
    }
}

/// 资源访问仲裁器
///
/// 配置锁跨越重新扫描存在，因此由文件系统持有并借给仲裁器。
pub struct Arbiter<'a> {
    backend: &'a dyn PciAccess,
    conf_lock: &'a RwLock<()>,
}

impl<'a> Arbiter<'a> {
    /// 创建仲裁器
    pub fn new(backend: &'a dyn PciAccess, conf_lock: &'a RwLock<()>) -> Self {
        Self { backend, conf_lock }
    }

    /// 某个功能的配置空间
    pub fn config(&self, addr: PciAddress) -> ConfigSpace<'a> {
        ConfigSpace {
            backend: self.backend,
            lock: self.conf_lock,
            addr,
        }
    }

    /// 目录项对应的资源
    pub fn resource<'b>(
        &'b self,
        store: &'b EntryStore,
        entry: &'b Entry,
    ) -> Result<Box<dyn Resource + 'b>, FsError> {
        match entry.kind() {
            EntryKind::Directory => Err(FsError::IsDirectory),
            EntryKind::Config => {
                let addr = entry.addr().to_pci().ok_or(FsError::InvalidArgument)?;
                Ok(Box::new(self.config(addr)))
            }
            EntryKind::Region(index) => {
                let slot = store.device_of(entry.id()).ok_or(FsError::NoDevice)?;
                Ok(Box::new(RegionResource {
                    backend: self.backend,
                    slot,
                    entry,
                    index: index as usize,
                }))
            }
            EntryKind::Rom => {
                let slot = store.device_of(entry.id()).ok_or(FsError::NoDevice)?;
                Ok(Box::new(RomResource {
                    backend: self.backend,
                    slot,
                    entry,
                }))
            }
        }
    }

    /// 读目录项对应的资源，成功后更新 atime
    pub fn read(
        &self,
        store: &EntryStore,
        entry: &Entry,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<usize, TransferError> {
        let n = self.resource(store, entry)?.read(offset, buf)?;
        entry.touch(TouchFlags::ATIME, vfs_ops().timespec_now());
        Ok(n)
    }

    /// 写目录项对应的资源，成功后更新 mtime 与 ctime
    pub fn write(
        &self,
        store: &EntryStore,
        entry: &Entry,
        offset: u64,
        buf: &[u8],
    ) -> Result<usize, TransferError> {
        let n = self.resource(store, entry)?.write(offset, buf)?;
        entry.touch(
            TouchFlags::MTIME | TouchFlags::CTIME,
            vfs_ops().timespec_now(),
        );
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn test_clip() {
        assert_eq!(clip(254, 4, 256), Ok(2));
        assert_eq!(clip(256, 4, 256), Ok(0));
        assert_eq!(clip(257, 4, 256), Err(FsError::InvalidArgument));
        assert_eq!(clip(0, 8, 256), Ok(8));
    }

    #[test]
    fn test_split_chunks() {
        let seven: Vec<_> = split_chunks(7).collect();
        assert_eq!(seven, [(0, 4), (4, 2), (6, 1)]);
        let nine: Vec<_> = split_chunks(9).collect();
        assert_eq!(nine, [(0, 4), (4, 4), (8, 1)]);
        assert_eq!(split_chunks(0).count(), 0);
        assert_eq!(split_chunks(2).collect::<Vec<_>>(), [(0, 2)]);
    }

    #[test]
    fn test_split_transfer_reports_progress() {
        let mut calls = 0;
        let res = split_transfer(7, |_, _| {
            calls += 1;
            if calls == 2 {
                Err(PciError::Io)
            } else {
                Ok(())
            }
        });
        assert_eq!(
            res,
            Err(TransferError {
                error: FsError::IoError,
                transferred: 4
            })
        );
    }
}
