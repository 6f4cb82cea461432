//! 命名空间常量

/// 目录项名称上限（含结尾空字符）
pub const NAME_SIZE: usize = 16;

/// `config` 文件大小，即传统配置空间大小
pub const FILE_CONFIG_SIZE: u64 = 256;

/// 节点缓存默认容量
pub const NCACHE_DEFAULT_LEN: usize = 16;

/// 配置空间文件名
pub const FILE_CONFIG_NAME: &str = "config";

/// BAR 区域文件名前缀，后接 BAR 下标
pub const FILE_REGION_NAME: &str = "region";

/// 扩展 ROM 文件名
pub const FILE_ROM_NAME: &str = "rom";
