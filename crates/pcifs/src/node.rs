//! 活动节点
//!
//! 节点在目录项第一次被访问时创建，由 [`NodeCache`](crate::NodeCache) 持有并参与 LRU 排序。
//! 目录项只保留指向节点的弱引用，节点释放后弱引用自然失效。

use core::sync::atomic::{AtomicUsize, Ordering};

use sync::SpinLock;
use vfs::Stat;

use crate::entry::{Entry, EntryId};

/// 活动节点
#[derive(Debug)]
pub struct Node {
    entry: EntryId,
    generation: u64,
    stat: SpinLock<Stat>,
    pins: AtomicUsize,
}

impl Node {
    pub(crate) fn new(entry: &Entry, generation: u64) -> Self {
        Self {
            entry: entry.id(),
            generation,
            stat: SpinLock::new(entry.stat()),
            pins: AtomicUsize::new(0),
        }
    }

    /// 对应的目录项
    pub fn entry(&self) -> EntryId {
        self.entry
    }

    /// 创建时的目录树代数
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 属性快照
    pub fn stat(&self) -> Stat {
        self.stat.lock().clone()
    }

    /// 从目录项刷新属性快照
    pub(crate) fn sync(&self, entry: &Entry) {
        *self.stat.lock() = entry.stat();
    }

    /// 当前引用数，非零时不会被淘汰
    pub fn pins(&self) -> usize {
        self.pins.load(Ordering::Acquire)
    }

    pub(crate) fn pin(&self) {
        self.pins.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn unpin(&self) {
        let prev = self.pins.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "unbalanced node release");
    }
}
