//! 时间相关定义

use core::cmp::Ordering;

/// 秒 + 纳秒表示的时间戳
///
/// 对应 POSIX 的 `struct timespec`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TimeSpec {
    /// 秒
    pub tv_sec: i64,
    /// 纳秒，取值范围 [0, 1_000_000_000)
    pub tv_nsec: i64,
}

impl TimeSpec {
    /// 每秒纳秒数
    pub const NSEC_PER_SEC: i64 = 1_000_000_000;

    /// 零时间戳
    pub const fn zero() -> Self {
        Self {
            tv_sec: 0,
            tv_nsec: 0,
        }
    }

    /// 由秒和纳秒构造，纳秒溢出部分进位到秒
    pub const fn new(sec: i64, nsec: i64) -> Self {
        Self {
            tv_sec: sec + nsec.div_euclid(Self::NSEC_PER_SEC),
            tv_nsec: nsec.rem_euclid(Self::NSEC_PER_SEC),
        }
    }

    /// 由纳秒数构造
    pub const fn from_nanos(nanos: u64) -> Self {
        Self::new(0, nanos as i64)
    }

    /// 是否为零
    pub const fn is_zero(&self) -> bool {
        self.tv_sec == 0 && self.tv_nsec == 0
    }
}

impl PartialOrd for TimeSpec {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeSpec {
    fn cmp(&self, other: &Self) -> Ordering {
        self.tv_sec
            .cmp(&other.tv_sec)
            .then(self.tv_nsec.cmp(&other.tv_nsec))
    }
}
