//! 打开标志

bitflags::bitflags! {
    /// 打开文件时请求的访问方式
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        /// 读
        const O_READ  = 0x1;
        /// 写
        const O_WRITE = 0x2;
        /// 执行（目录为搜索）
        const O_EXEC  = 0x4;
        /// 读写
        const O_RDWR  = Self::O_READ.bits() | Self::O_WRITE.bits();
    }
}
