//! 同步原语
//!
//! 向仲裁器的其它模块提供基本的锁原语，包括自旋锁和读写锁。
//!
//! 两者都以 `lock_api` 的原始锁 trait 实现，外层的数据封装与 RAII 守卫
//! 直接复用 `lock_api` 提供的泛型类型。

#![no_std]

mod raw_spin_lock;
mod rwlock;
mod spin_lock;

pub use raw_spin_lock::*;
pub use rwlock::*;
pub use spin_lock::*;
