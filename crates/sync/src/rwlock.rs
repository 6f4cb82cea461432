//! 读写自旋锁
//!
//! 允许多个读者或单个写者。写者到达后阻止新读者进入，避免写者饥饿。

use core::{
    hint,
    sync::atomic::{AtomicUsize, Ordering},
};

/// 写者持有标志
const WRITER: usize = 1;
/// 写者等待标志
const UPGRADED: usize = 1 << 1;
/// 每个读者的计数单位
const READER: usize = 1 << 2;

/// 原始读写自旋锁
///
/// 状态字布局：bit0 为写者持有，bit1 为写者等待，其余位为读者计数。
#[derive(Debug)]
pub struct RawRwSpinLock {
    state: AtomicUsize,
}

impl RawRwSpinLock {
    /// 创建未加锁的读写锁
    pub const fn new() -> Self {
        Self {
            state: AtomicUsize::new(0),
        }
    }

    /// 当前读者数量 (仅用于调试/测试)
    pub fn reader_count(&self) -> usize {
        self.state.load(Ordering::Relaxed) / READER
    }

    /// 是否被写者持有 (仅用于调试/测试)
    pub fn is_write_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) & WRITER != 0
    }
}

impl Default for RawRwSpinLock {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: 写者以 compare_exchange(0 -> WRITER) 独占获取，读者只在无写者且无等待写者时
// 增加计数；所有获取使用 Acquire，所有释放使用 Release。
unsafe impl lock_api::RawRwLock for RawRwSpinLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self::new();

    type GuardMarker = lock_api::GuardSend;

    fn lock_shared(&self) {
        while !self.try_lock_shared() {
            hint::spin_loop();
        }
    }

    fn try_lock_shared(&self) -> bool {
        let state = self.state.load(Ordering::Relaxed);
        if state & (WRITER | UPGRADED) != 0 {
            return false;
        }
        self.state
            .compare_exchange_weak(state, state + READER, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    unsafe fn unlock_shared(&self) {
        self.state.fetch_sub(READER, Ordering::Release);
    }

    fn lock_exclusive(&self) {
        loop {
            let state = self.state.load(Ordering::Relaxed);
            if state & !UPGRADED == 0 {
                if self
                    .state
                    .compare_exchange_weak(state, WRITER, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
                {
                    return;
                }
            } else if state & UPGRADED == 0 {
                self.state.fetch_or(UPGRADED, Ordering::Relaxed);
            }
            hint::spin_loop();
        }
    }

    fn try_lock_exclusive(&self) -> bool {
        self.state
            .compare_exchange(0, WRITER, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    unsafe fn unlock_exclusive(&self) {
        self.state.fetch_and(!WRITER, Ordering::Release);
    }

    fn is_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) & !UPGRADED != 0
    }

    fn is_locked_exclusive(&self) -> bool {
        self.is_write_locked()
    }
}

/// 读写锁
///
/// ```
/// let lock = sync::RwLock::new(5);
/// {
///     let r1 = lock.read();
///     let r2 = lock.read();
///     assert_eq!(*r1 + *r2, 10);
/// }
/// *lock.write() += 1;
/// assert_eq!(*lock.read(), 6);
/// ```
pub type RwLock<T> = lock_api::RwLock<RawRwSpinLock, T>;

/// 读守卫
pub type RwLockReadGuard<'a, T> = lock_api::RwLockReadGuard<'a, RawRwSpinLock, T>;

/// 写守卫
pub type RwLockWriteGuard<'a, T> = lock_api::RwLockWriteGuard<'a, RawRwSpinLock, T>;
