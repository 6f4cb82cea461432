//! 调用方凭据

use alloc::vec::Vec;

/// 超级用户 UID
pub const ROOT_UID: u32 = 0;

/// 发起请求的用户身份
///
/// 由 RPC 层从客户端身份信息构造，仲裁器只读取不修改。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// 有效用户 ID
    pub uid: u32,
    /// 有效组 ID
    pub gid: u32,
    /// 附加组
    pub groups: Vec<u32>,
}

impl Credentials {
    /// 创建只有主组的凭据
    pub fn new(uid: u32, gid: u32) -> Self {
        Self {
            uid,
            gid,
            groups: Vec::new(),
        }
    }

    /// 超级用户凭据
    pub fn root() -> Self {
        Self::new(ROOT_UID, 0)
    }

    /// 追加附加组
    pub fn with_groups(mut self, groups: &[u32]) -> Self {
        self.groups.extend_from_slice(groups);
        self
    }

    /// 是否为超级用户
    pub fn is_root(&self) -> bool {
        self.uid == ROOT_UID
    }

    /// 是否属于指定组（主组或附加组）
    pub fn in_group(&self, gid: u32) -> bool {
        self.gid == gid || self.groups.contains(&gid)
    }
}
