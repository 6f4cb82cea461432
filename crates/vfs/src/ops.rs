//! VFS 运行时操作 trait 定义和注册
//!
//! 此模块定义了合成文件系统需要的外部依赖接口，通过 trait 抽象与宿主服务解耦。

use core::sync::atomic::{AtomicUsize, Ordering};
use uapi::time::TimeSpec;

/// VFS 运行时操作
///
/// 宿主服务需要实现此 trait 并在启动时注册。
pub trait VfsOps: Send + Sync {
    /// 获取当前时间
    fn timespec_now(&self) -> TimeSpec;
}

// ========== VfsOps 注册 ==========

static VFS_OPS_DATA: AtomicUsize = AtomicUsize::new(0);
static VFS_OPS_VTABLE: AtomicUsize = AtomicUsize::new(0);

/// 注册 VFS 操作实现
///
/// # Safety
/// 必须在单线程环境下调用，且只能调用一次
pub unsafe fn register_vfs_ops(ops: &'static dyn VfsOps) {
    let ptr = ops as *const dyn VfsOps;
    // SAFETY: 将 fat pointer 拆分为 data 和 vtable 两部分存储
    let (data, vtable) =
        unsafe { core::mem::transmute::<*const dyn VfsOps, (usize, usize)>(ptr) };
    VFS_OPS_DATA.store(data, Ordering::Release);
    VFS_OPS_VTABLE.store(vtable, Ordering::Release);
}

/// 获取已注册的 VFS 操作实现
///
/// # Panics
/// 如果尚未调用 [`register_vfs_ops`] 注册实现，则 panic
#[inline]
pub fn vfs_ops() -> &'static dyn VfsOps {
    let data = VFS_OPS_DATA.load(Ordering::Acquire);
    let vtable = VFS_OPS_VTABLE.load(Ordering::Acquire);
    if data == 0 {
        #[cfg(test)]
        {
            extern crate test_support;
            return &test_support::mock::vfs::MOCK_VFS_OPS;
        }
        #[cfg(not(test))]
        panic!("vfs: VfsOps not registered");
    }
    // SAFETY: 重组 fat pointer
    unsafe { &*core::mem::transmute::<(usize, usize), *const dyn VfsOps>((data, vtable)) }
}

#[cfg(test)]
mod test_mock {
    extern crate test_support;

    use super::VfsOps;
    use uapi::time::TimeSpec;

    impl VfsOps for test_support::mock::vfs::MockVfsOps {
        fn timespec_now(&self) -> TimeSpec {
            TimeSpec::from_nanos(self.tick())
        }
    }

    #[test]
    fn test_vfs_ops_fallback_is_monotonic() {
        let a = super::vfs_ops().timespec_now();
        let b = super::vfs_ops().timespec_now();
        assert!(b > a);
    }
}
