//! PCI 命名空间
//!
//! [`PciFs`] 把目录项存储、节点缓存、权限规则和仲裁器组合成一个文件系统实例。
//! 所有状态都在实例内部，同一进程中可以并存多个实例。
//!
//! # 锁顺序
//!
//! 结构锁 `store` → 选项锁 `options` → 节点缓存锁 → 目录项锁。
//! 重新扫描独占结构锁，其余操作在结构锁的共享模式下进行。

use alloc::sync::Arc;
use alloc::vec::Vec;

use device::PciAccess;
use sync::{RwLock, RwLockReadGuard, SpinLock};
use uapi::cred::Credentials;
use uapi::fcntl::OpenFlags;
use uapi::time::TimeSpec;
use vfs::{DirEntry, FileMode, FsError, InodeType, Stat, check_open_permissions, vfs_ops};

use crate::arbiter::Arbiter;
use crate::builder;
use crate::entry::EntryId;
use crate::ncache::NodeCache;
use crate::netfs::OpenFile;
use crate::options::Options;
use crate::perms::{self, PermissionRule};
use crate::store::EntryStore;

/// PCI 命名空间实例
pub struct PciFs {
    backend: Arc<dyn PciAccess>,
    store: RwLock<EntryStore>,
    cache: NodeCache,
    /// 全局配置空间锁：读共享，写独占
    ///
    /// 与区域锁一样在持锁期间访问硬件，见 [`DeviceSlot`](crate::store::DeviceSlot)。
    conf_lock: RwLock<()>,
    options: SpinLock<Options>,
    root_stat: Stat,
}

impl PciFs {
    /// 枚举设备并建立命名空间
    ///
    /// `underlying` 是挂载点原有节点的属性，根目录由它派生。
    /// 枚举失败、分配失败或规则非法时返回错误，此时不应继续启动。
    pub fn new(
        backend: Arc<dyn PciAccess>,
        underlying: &Stat,
        options: Options,
    ) -> Result<Self, FsError> {
        let now = vfs_ops().timespec_now();
        let root_stat = derive_root_stat(underlying, now);

        for rule in options.rules() {
            rule.validate()?;
        }

        let store = builder::build(backend.as_ref(), &root_stat, now, 0)?;
        perms::apply(options.rules(), &store, now);

        Ok(Self {
            backend,
            store: RwLock::new(store),
            cache: NodeCache::new(options.node_cache_max()),
            conf_lock: RwLock::new(()),
            options: SpinLock::new(options),
            root_stat,
        })
    }

    /// 根目录
    pub fn root(&self) -> EntryId {
        EntryId::ROOT
    }

    /// 在目录中按名称查找
    pub fn lookup(&self, dir: EntryId, name: &str) -> Result<EntryId, FsError> {
        self.store.read().lookup(dir, name)
    }

    /// 从根目录按路径查找
    pub fn lookup_path(&self, path: &str) -> Result<EntryId, FsError> {
        self.store.read().lookup_path(path)
    }

    /// 列出目录内容
    pub fn readdir(&self, dir: EntryId) -> Result<Vec<DirEntry>, FsError> {
        self.store.read().list(dir)
    }

    /// 目录项属性
    pub fn getattr(&self, id: EntryId) -> Result<Stat, FsError> {
        Ok(self.store.read().get(id)?.stat())
    }

    /// 以 `cred` 的身份打开目录项
    pub fn open(
        &self,
        cred: &Credentials,
        id: EntryId,
        flags: OpenFlags,
    ) -> Result<OpenFile<'_>, FsError> {
        let store = self.store.read();
        self.open_in(&store, cred, id, flags)
    }

    /// 在已持有结构锁的情况下打开目录项
    pub(crate) fn open_in(
        &self,
        store: &EntryStore,
        cred: &Credentials,
        id: EntryId,
        flags: OpenFlags,
    ) -> Result<OpenFile<'_>, FsError> {
        let entry = store.get(id)?;
        check_open_permissions(&entry.stat(), cred, flags)?;
        let node = self.cache.acquire(store, id)?;
        Ok(OpenFile::new(self, node, cred.clone(), flags))
    }

    /// 替换权限规则并立即生效
    pub fn set_permissions(&self, rules: Vec<PermissionRule>) -> Result<(), FsError> {
        let store = self.store.read();
        let mut current = self.options.lock();
        let options = Options::new(rules, current.node_cache_max())?;
        self.install(&store, &mut current, options);
        Ok(())
    }

    /// 整体替换运行时选项
    ///
    /// 规则逐条校验，任何一条非法都不会改变现有状态。
    pub fn reconfigure(&self, options: Options) -> Result<(), FsError> {
        for rule in options.rules() {
            rule.validate()?;
        }

        let store = self.store.read();
        let mut current = self.options.lock();
        self.install(&store, &mut current, options);
        Ok(())
    }

    /// 应用并保存新选项
    ///
    /// 调用方同时持有结构锁与选项锁，并发的重新配置因此整体串行，
    /// 目录项属主、缓存容量与保存的选项始终出自同一份选项。
    fn install(&self, store: &EntryStore, current: &mut Options, options: Options) {
        let now = vfs_ops().timespec_now();
        let changed = perms::apply(options.rules(), store, now);
        self.cache.sync_all(store);
        self.cache.set_capacity(options.node_cache_max());
        *current = options;

        log::info!("pcifs: options updated, {} entries changed owner", changed);
    }

    /// 调整节点缓存容量
    pub fn set_node_cache_max(&self, len: usize) {
        let mut current = self.options.lock();
        current.set_node_cache_max(len);
        self.cache.set_capacity(len);
    }

    /// 当前选项
    pub fn options(&self) -> Options {
        self.options.lock().clone()
    }

    /// 重新枚举设备并重建命名空间
    ///
    /// 独占结构锁完成重建；重建失败时保留旧的命名空间。
    /// 成功后缓存节点全部作废，已打开的句柄返回 [`FsError::StaleHandle`]。
    pub fn rescan(&self) -> Result<(), FsError> {
        let mut store = self.store.write();
        let now = vfs_ops().timespec_now();
        let generation = store.generation() + 1;

        let fresh = builder::build(self.backend.as_ref(), &self.root_stat, now, generation)
            .inspect_err(|err| log::error!("pcifs: rescan failed, keeping old tree: {}", err))?;
        perms::apply(self.options.lock().rules(), &fresh, now);

        self.cache.invalidate_all();
        let old = core::mem::replace(&mut *store, fresh);
        log::info!(
            "pcifs: rescanned, generation {} with {} entries (was {})",
            generation,
            store.len(),
            old.len()
        );
        Ok(())
    }

    /// 当前目录树代数
    pub fn generation(&self) -> u64 {
        self.store.read().generation()
    }

    /// 以共享模式借出目录项存储
    pub fn store(&self) -> RwLockReadGuard<'_, EntryStore> {
        self.store.read()
    }

    /// 节点缓存
    pub fn cache(&self) -> &NodeCache {
        &self.cache
    }

    pub(crate) fn arbiter(&self) -> Arbiter<'_> {
        Arbiter::new(self.backend.as_ref(), &self.conf_lock)
    }
}

/// 由挂载点原有节点派生根目录属性
///
/// 强制为目录；原节点不是目录时为每个读位补上执行位；去掉"其他用户"的全部权限。
pub fn derive_root_stat(underlying: &Stat, now: TimeSpec) -> Stat {
    let mut perm = underlying.mode.permissions();
    if !underlying.is_dir() {
        perm = perm.with_exec_for_read();
    }
    perm -= FileMode::OTHER_ALL;

    let mut stat = Stat::new(
        InodeType::Directory,
        perm,
        underlying.uid,
        underlying.gid,
        now,
    );
    stat.nlinks = 2;
    stat
}
