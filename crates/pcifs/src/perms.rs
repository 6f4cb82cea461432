//! 权限作用域
//!
//! 管理员按顺序声明若干规则，每条规则按地址或按设备类别圈定一组目录项，
//! 并指定属主和/或属组。每个目录项取第一条匹配的规则，没有匹配则回到根目录的属主。

use uapi::time::TimeSpec;
use vfs::{FsError, TouchFlags};

use crate::entry::Entry;
use crate::store::EntryStore;

/// 规则圈定的范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// 按地址：domain 必填，其余字段逐级可选
    Address {
        /// 段号
        domain: u16,
        /// 总线号
        bus: Option<u8>,
        /// 设备号，需要同时指定总线号
        dev: Option<u8>,
        /// 功能号，需要同时指定设备号
        func: Option<u8>,
    },
    /// 按类别：class 必填，subclass 可选
    Class {
        /// 主类别
        class: u8,
        /// 子类别
        subclass: Option<u8>,
    },
}

/// 一条权限规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionRule {
    /// 范围
    pub scope: Scope,
    /// 属主
    pub uid: Option<u32>,
    /// 属组
    pub gid: Option<u32>,
}

impl PermissionRule {
    /// 检查规则是否合法
    ///
    /// 地址字段不能跳级（例如给出 dev 却没有 bus），且至少要指定 uid 或 gid 之一。
    pub fn validate(&self) -> Result<(), FsError> {
        if self.uid.is_none() && self.gid.is_none() {
            return Err(FsError::InvalidArgument);
        }
        if let Scope::Address { bus, dev, func, .. } = self.scope {
            if func.is_some() && dev.is_none() {
                return Err(FsError::InvalidArgument);
            }
            if dev.is_some() && bus.is_none() {
                return Err(FsError::InvalidArgument);
            }
        }
        Ok(())
    }

    /// 规则是否覆盖该目录项
    ///
    /// 只比较规则给出的字段，且要求目录项的对应字段已确定并相等。
    pub fn matches(&self, entry: &Entry) -> bool {
        match self.scope {
            Scope::Address {
                domain,
                bus,
                dev,
                func,
            } => {
                let addr = entry.addr();
                addr.domain == Some(domain)
                    && bus.is_none_or(|b| addr.bus == Some(b))
                    && dev.is_none_or(|d| addr.dev == Some(d))
                    && func.is_none_or(|f| addr.func == Some(f))
            }
            Scope::Class { class, subclass } => match entry.class() {
                Some(code) => {
                    code.class() == class && subclass.is_none_or(|s| code.subclass() == s)
                }
                None => false,
            },
        }
    }
}

/// 对所有目录项重新计算属主
///
/// 先回到根目录的属主，再取第一条匹配规则；只有属主实际改变的目录项才更新 ctime。
/// 重复调用结果相同。返回属主发生变化的目录项数。
pub fn apply(rules: &[PermissionRule], store: &EntryStore, now: TimeSpec) -> usize {
    let (root_uid, root_gid) = {
        let root = store.root().stat.lock();
        (root.uid, root.gid)
    };

    let mut changed = 0;
    for entry in store.iter() {
        let mut uid = root_uid;
        let mut gid = root_gid;
        if let Some(rule) = rules.iter().find(|rule| rule.matches(entry)) {
            uid = rule.uid.unwrap_or(uid);
            gid = rule.gid.unwrap_or(gid);
        }

        let mut stat = entry.stat.lock();
        if stat.uid != uid || stat.gid != gid {
            stat.uid = uid;
            stat.gid = gid;
            stat.touch(TouchFlags::CTIME, now);
            changed += 1;
        }
    }

    log::debug!(
        "pcifs: applied {} permission rules, {} entries changed",
        rules.len(),
        changed
    );
    changed
}
