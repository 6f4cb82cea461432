//! 节点属性
//!
//! 命名空间中每个目录项都携带一份 [`Stat`]，`getattr` 直接返回它的副本。

use alloc::string::String;
use uapi::time::TimeSpec;

/// 文件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeType {
    /// 普通文件
    File,
    /// 目录
    Directory,
}

impl InodeType {
    /// 对应的 `S_IFMT` 类型位
    pub fn mode_bits(&self) -> FileMode {
        match self {
            InodeType::File => FileMode::S_IFREG,
            InodeType::Directory => FileMode::S_IFDIR,
        }
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// 文件权限和类型（与 POSIX 兼容）
    pub struct FileMode: u32 {
        // 文件类型掩码
        /// 文件类型掩码
        const S_IFMT   = 0o170000;
        /// 普通文件
        const S_IFREG  = 0o100000;
        /// 目录
        const S_IFDIR  = 0o040000;

        // 用户权限
        /// 用户读
        const S_IRUSR  = 0o400;
        /// 用户写
        const S_IWUSR  = 0o200;
        /// 用户执行
        const S_IXUSR  = 0o100;

        // 组权限
        /// 组读
        const S_IRGRP  = 0o040;
        /// 组写
        const S_IWGRP  = 0o020;
        /// 组执行
        const S_IXGRP  = 0o010;

        // 其他用户权限
        /// 其他读
        const S_IROTH  = 0o004;
        /// 其他写
        const S_IWOTH  = 0o002;
        /// 其他执行
        const S_IXOTH  = 0o001;
    }
}

impl FileMode {
    /// 全部读权限位
    pub const ALL_READ: FileMode = FileMode::S_IRUSR
        .union(FileMode::S_IRGRP)
        .union(FileMode::S_IROTH);
    /// 全部写权限位
    pub const ALL_WRITE: FileMode = FileMode::S_IWUSR
        .union(FileMode::S_IWGRP)
        .union(FileMode::S_IWOTH);
    /// 全部执行权限位
    pub const ALL_EXEC: FileMode = FileMode::S_IXUSR
        .union(FileMode::S_IXGRP)
        .union(FileMode::S_IXOTH);
    /// "其他用户"的全部权限位
    pub const OTHER_ALL: FileMode = FileMode::S_IROTH
        .union(FileMode::S_IWOTH)
        .union(FileMode::S_IXOTH);

    /// 只保留 rwx 权限位
    pub fn permissions(&self) -> FileMode {
        *self & (Self::ALL_READ | Self::ALL_WRITE | Self::ALL_EXEC)
    }

    /// 类型位
    pub fn file_type(&self) -> FileMode {
        *self & FileMode::S_IFMT
    }

    /// 为每个读权限位补上对应的执行位
    pub fn with_exec_for_read(&self) -> FileMode {
        let read = self.bits() & Self::ALL_READ.bits();
        *self | FileMode::from_bits_truncate(read >> 2)
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// 可更新的时间戳
    pub struct TouchFlags: u8 {
        /// 访问时间
        const ATIME = 1 << 0;
        /// 修改时间
        const MTIME = 1 << 1;
        /// 状态改变时间
        const CTIME = 1 << 2;
    }
}

/// 节点元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    /// 节点编号
    pub ino: usize,
    /// 文件类型
    pub inode_type: InodeType,
    /// 类型位与权限位
    pub mode: FileMode,
    /// 用户 ID
    pub uid: u32,
    /// 组 ID
    pub gid: u32,
    /// 文件大小（字节）
    pub size: u64,
    /// 访问时间
    pub atime: TimeSpec,
    /// 修改时间
    pub mtime: TimeSpec,
    /// 状态改变时间
    pub ctime: TimeSpec,
    /// 硬链接数
    pub nlinks: usize,
}

impl Stat {
    /// 创建指定类型与权限的属性，三个时间戳均为 `now`
    pub fn new(inode_type: InodeType, perm: FileMode, uid: u32, gid: u32, now: TimeSpec) -> Self {
        Self {
            ino: 0,
            inode_type,
            mode: inode_type.mode_bits() | perm.permissions(),
            uid,
            gid,
            size: 0,
            atime: now,
            mtime: now,
            ctime: now,
            nlinks: 1,
        }
    }

    /// 是否为目录
    pub fn is_dir(&self) -> bool {
        self.inode_type == InodeType::Directory
    }

    /// 将 `flags` 指定的时间戳更新为 `now`
    pub fn touch(&mut self, flags: TouchFlags, now: TimeSpec) {
        if flags.contains(TouchFlags::ATIME) {
            self.atime = now;
        }
        if flags.contains(TouchFlags::MTIME) {
            self.mtime = now;
        }
        if flags.contains(TouchFlags::CTIME) {
            self.ctime = now;
        }
    }
}

/// 轻量级目录项（readdir 返回）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// 文件名
    pub name: String,
    /// 节点编号
    pub inode_no: usize,
    /// 文件类型
    pub inode_type: InodeType,
}
