//! 打开的句柄
//!
//! [`OpenFile`] 对应一次成功的打开，持有节点的一个引用，析构时归还给节点缓存。
//! 所有请求先做身份检查再接触硬件：
//!
//! 1. 按打开标志和当前属性检查调用方的权限
//! 2. 直接配置访问携带的 `(bus, dev, func)` 必须与句柄所指的功能一致
//!
//! 拆分传输中途失败时，已经传输过字节的请求返回较短的计数，否则返回错误。

use alloc::sync::Arc;
use alloc::vec::Vec;

use device::PciAddress;
use uapi::cred::Credentials;
use uapi::fcntl::OpenFlags;
use vfs::{Access, DirEntry, FsError, Stat, check_access};

use crate::arbiter::Resource;
use crate::entry::{Entry, EntryId};
use crate::error::TransferError;
use crate::node::Node;
use crate::pcifs::PciFs;
use crate::store::EntryStore;

/// 打开的句柄
pub struct OpenFile<'fs> {
    fs: &'fs PciFs,
    node: Arc<Node>,
    cred: Credentials,
    flags: OpenFlags,
}

impl<'fs> OpenFile<'fs> {
    pub(crate) fn new(
        fs: &'fs PciFs,
        node: Arc<Node>,
        cred: Credentials,
        flags: OpenFlags,
    ) -> Self {
        Self {
            fs,
            node,
            cred,
            flags,
        }
    }

    /// 对应的目录项
    pub fn entry(&self) -> EntryId {
        self.node.entry()
    }

    /// 打开标志
    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    /// 打开者身份
    pub fn credentials(&self) -> &Credentials {
        &self.cred
    }

    /// 持有的节点
    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    /// 在结构锁内取得句柄的目录项；目录树已重建时返回 `StaleHandle`
    fn with_entry<R>(
        &self,
        f: impl FnOnce(&EntryStore, &Entry) -> Result<R, FsError>,
    ) -> Result<R, FsError> {
        let guard = self.fs.store();
        let store: &EntryStore = &guard;
        if self.node.generation() != store.generation() {
            return Err(FsError::StaleHandle);
        }
        let entry = store.get(self.node.entry())?;
        f(store, entry)
    }

    /// 当前属性
    pub fn getattr(&self) -> Result<Stat, FsError> {
        self.with_entry(|_, entry| {
            self.node.sync(entry);
            Ok(self.node.stat())
        })
    }

    /// 在本目录中查找并以同一身份打开子项
    pub fn lookup(&self, name: &str, flags: OpenFlags) -> Result<OpenFile<'fs>, FsError> {
        let fs = self.fs;
        let store = fs.store();
        if self.node.generation() != store.generation() {
            return Err(FsError::StaleHandle);
        }
        let dir = store.get(self.node.entry())?;
        if !dir.kind().is_dir() {
            return Err(FsError::NotDirectory);
        }
        check_access(&dir.stat(), &self.cred, Access::Exec)?;
        let child = store.lookup(dir.id(), name)?;
        fs.open_in(&store, &self.cred, child, flags)
    }

    /// 列出本目录
    pub fn readdir(&self) -> Result<Vec<DirEntry>, FsError> {
        self.with_entry(|store, entry| {
            if !entry.kind().is_dir() {
                return Err(FsError::NotDirectory);
            }
            check_access(&entry.stat(), &self.cred, Access::Read)?;
            store.list(entry.id())
        })
    }

    /// 从 `offset` 读取
    pub fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize, FsError> {
        self.require(OpenFlags::O_READ)?;
        self.with_entry(|store, entry| {
            check_access(&entry.stat(), &self.cred, Access::Read)?;
            short_count(self.fs.arbiter().read(store, entry, offset, buf))
        })
    }

    /// 向 `offset` 写入
    pub fn write(&self, offset: u64, buf: &[u8]) -> Result<usize, FsError> {
        self.require(OpenFlags::O_WRITE)?;
        self.with_entry(|store, entry| {
            check_access(&entry.stat(), &self.cred, Access::Write)?;
            short_count(self.fs.arbiter().write(store, entry, offset, buf))
        })
    }

    /// 直接读取配置寄存器
    ///
    /// `(bus, dev, func)` 必须与句柄所指的功能一致，否则无论权限位如何都拒绝。
    pub fn conf_read(
        &self,
        bus: u8,
        dev: u8,
        func: u8,
        reg: u16,
        buf: &mut [u8],
    ) -> Result<usize, FsError> {
        self.require(OpenFlags::O_READ)?;
        self.with_entry(|_, entry| {
            check_access(&entry.stat(), &self.cred, Access::Read)?;
            let addr = bind(entry, bus, dev, func)?;
            short_count(self.fs.arbiter().config(addr).read(reg as u64, buf))
        })
    }

    /// 直接写入配置寄存器，绑定规则同 [`conf_read`](Self::conf_read)
    pub fn conf_write(
        &self,
        bus: u8,
        dev: u8,
        func: u8,
        reg: u16,
        buf: &[u8],
    ) -> Result<usize, FsError> {
        self.require(OpenFlags::O_WRITE)?;
        self.with_entry(|_, entry| {
            check_access(&entry.stat(), &self.cred, Access::Write)?;
            let addr = bind(entry, bus, dev, func)?;
            short_count(self.fs.arbiter().config(addr).write(reg as u64, buf))
        })
    }

    fn require(&self, flag: OpenFlags) -> Result<(), FsError> {
        if self.flags.contains(flag) {
            Ok(())
        } else {
            Err(FsError::PermissionDenied)
        }
    }
}

impl Drop for OpenFile<'_> {
    fn drop(&mut self) {
        self.fs.cache().release(&self.node);
    }
}

/// 请求地址必须等于句柄所指功能的地址
fn bind(entry: &Entry, bus: u8, dev: u8, func: u8) -> Result<PciAddress, FsError> {
    match entry.addr().to_pci() {
        Some(addr) if addr.matches_bdf(bus, dev, func) => Ok(addr),
        _ => {
            log::warn!(
                "pcifs: rejected config access to {:02x}:{:02x}.{} through entry '{}'",
                bus,
                dev,
                func,
                entry.name()
            );
            Err(FsError::PermissionDenied)
        }
    }
}

fn short_count(res: Result<usize, TransferError>) -> Result<usize, FsError> {
    match res {
        Ok(n) => Ok(n),
        Err(err) if err.transferred > 0 => Ok(err.transferred),
        Err(err) => Err(err.error),
    }
}
