//! 基于凭据的权限检查
//!
//! 语义与经典 Unix 相同：超级用户跳过权限位；属主只看属主位，
//! 否则属组成员只看属组位，其余调用方只看"其他用户"位。三类互不回退。

use uapi::cred::Credentials;
use uapi::fcntl::OpenFlags;

use crate::{FileMode, FsError, Stat};

/// 单项访问类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// 读
    Read,
    /// 写
    Write,
    /// 执行/搜索
    Exec,
}

impl Access {
    fn owner_bit(&self) -> FileMode {
        match self {
            Access::Read => FileMode::S_IRUSR,
            Access::Write => FileMode::S_IWUSR,
            Access::Exec => FileMode::S_IXUSR,
        }
    }
}

/// 检查 `cred` 是否拥有对 `stat` 的 `access` 权限
pub fn check_access(stat: &Stat, cred: &Credentials, access: Access) -> Result<(), FsError> {
    if cred.is_root() {
        return Ok(());
    }

    let owner_bit = access.owner_bit().bits();
    let wanted = if cred.uid == stat.uid {
        owner_bit
    } else if cred.in_group(stat.gid) {
        owner_bit >> 3
    } else {
        owner_bit >> 6
    };

    if stat.mode.bits() & wanted != 0 {
        Ok(())
    } else {
        log::debug!(
            "vfs: {:?} denied for uid {} on {:o} owned by {}:{}",
            access,
            cred.uid,
            stat.mode.permissions().bits(),
            stat.uid,
            stat.gid
        );
        Err(FsError::PermissionDenied)
    }
}

/// 按打开标志逐项检查权限
///
/// `flags` 中每个请求的访问方式都必须被允许。
pub fn check_open_permissions(
    stat: &Stat,
    cred: &Credentials,
    flags: OpenFlags,
) -> Result<(), FsError> {
    if flags.contains(OpenFlags::O_READ) {
        check_access(stat, cred, Access::Read)?;
    }
    if flags.contains(OpenFlags::O_WRITE) {
        check_access(stat, cred, Access::Write)?;
    }
    if flags.contains(OpenFlags::O_EXEC) {
        check_access(stat, cred, Access::Exec)?;
    }
    Ok(())
}

/// 调用方是否为属主（超级用户视为任何节点的属主）
pub fn is_owner(stat: &Stat, cred: &Credentials) -> bool {
    cred.is_root() || cred.uid == stat.uid
}
