//! 节点缓存
//!
//! 有界 LRU 缓存，队首为最近使用。只淘汰未被引用的节点；
//! 全部节点都被引用时允许暂时超出容量，等引用释放后再收缩。

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;

use sync::SpinLock;
use vfs::FsError;

use crate::config::NCACHE_DEFAULT_LEN;
use crate::entry::EntryId;
use crate::node::Node;
use crate::store::EntryStore;

struct CacheInner {
    lru: VecDeque<Arc<Node>>,
    capacity: usize,
}

impl CacheInner {
    fn trim(&mut self) {
        while self.lru.len() > self.capacity {
            let Some(victim) = self.lru.iter().rposition(|node| node.pins() == 0) else {
                log::debug!(
                    "pcifs: node cache over capacity ({} > {}), all nodes in use",
                    self.lru.len(),
                    self.capacity
                );
                break;
            };
            if let Some(node) = self.lru.remove(victim) {
                log::trace!("pcifs: evicting node for entry {}", node.entry().index());
            }
        }
    }
}

/// 节点缓存
pub struct NodeCache {
    inner: SpinLock<CacheInner>,
}

impl Default for NodeCache {
    fn default() -> Self {
        Self::new(NCACHE_DEFAULT_LEN)
    }
}

impl NodeCache {
    /// 创建指定容量的缓存
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: SpinLock::new(CacheInner {
                lru: VecDeque::new(),
                capacity,
            }),
        }
    }

    /// 取得目录项的节点并增加引用
    ///
    /// 已有存活节点时复用并移到队首，否则新建。同一目录项同一时刻至多一个存活节点。
    /// 缓存空间分配失败时照常返回节点，只是不进入缓存。
    pub fn acquire(&self, store: &EntryStore, id: EntryId) -> Result<Arc<Node>, FsError> {
        let entry = store.get(id)?;
        let mut inner = self.inner.lock();

        let node = {
            let mut slot = entry.node.lock();
            match slot.upgrade() {
                Some(node) if node.generation() == store.generation() => node,
                _ => {
                    let node = Arc::new(Node::new(entry, store.generation()));
                    *slot = Arc::downgrade(&node);
                    node
                }
            }
        };
        node.pin();
        node.sync(entry);

        if let Some(pos) = inner.lru.iter().position(|n| Arc::ptr_eq(n, &node)) {
            if let Some(hit) = inner.lru.remove(pos) {
                inner.lru.push_front(hit);
            }
        } else if inner.lru.try_reserve(1).is_ok() {
            inner.lru.push_front(node.clone());
        } else {
            log::warn!(
                "pcifs: node cache allocation failed, serving entry {} uncached",
                id.index()
            );
        }

        inner.trim();
        Ok(node)
    }

    /// 释放一次引用，引用归零的节点成为可淘汰对象
    pub fn release(&self, node: &Arc<Node>) {
        let mut inner = self.inner.lock();
        node.unpin();
        inner.trim();
    }

    /// 调整容量，立即收缩
    pub fn set_capacity(&self, capacity: usize) {
        let mut inner = self.inner.lock();
        inner.capacity = capacity;
        inner.trim();
    }

    /// 容量
    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    /// 当前缓存的节点数
    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.inner.lock().lru.is_empty()
    }

    /// 目录项的节点是否在缓存中
    pub fn contains(&self, id: EntryId) -> bool {
        self.inner.lock().lru.iter().any(|n| n.entry() == id)
    }

    /// 按最近使用顺序列出缓存中的目录项
    pub fn entries(&self) -> Vec<EntryId> {
        self.inner.lock().lru.iter().map(|n| n.entry()).collect()
    }

    /// 用目录项的当前属性刷新全部缓存节点
    pub fn sync_all(&self, store: &EntryStore) {
        let inner = self.inner.lock();
        for node in inner.lru.iter() {
            if node.generation() != store.generation() {
                continue;
            }
            if let Ok(entry) = store.get(node.entry()) {
                node.sync(entry);
            }
        }
    }

    /// 丢弃全部缓存节点（重新扫描前调用）
    ///
    /// 仍被引用的节点由持有者继续持有，但其代数已过期，后续访问会被拒绝。
    pub fn invalidate_all(&self) {
        let mut inner = self.inner.lock();
        let dropped = inner.lru.len();
        inner.lru.clear();
        log::debug!("pcifs: node cache invalidated, {} nodes dropped", dropped);
    }
}
