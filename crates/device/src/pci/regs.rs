//! 配置空间寄存器偏移与常量

/// 配置空间大小（传统 PCI）
pub const PCI_CONFIG_SIZE: usize = 256;

/// 厂商 ID (u16)
pub const PCI_VENDOR_ID: u16 = 0x00;
/// 设备 ID (u16)
pub const PCI_DEVICE_ID: u16 = 0x02;
/// 类别寄存器，高 24 位为 class/subclass/prog-if (u32)
pub const PCI_CLASS: u16 = 0x08;
/// 头类型 (u8)
pub const PCI_HDRTYPE: u16 = 0x0E;
/// 第一个 BAR
pub const PCI_BAR0: u16 = 0x10;
/// 普通设备的扩展 ROM BAR
pub const PCI_XROMBAR: u16 = 0x30;
/// 桥设备的扩展 ROM BAR
pub const PCI_XROMBAR_BRIDGE: u16 = 0x38;

/// 头类型：普通设备
pub const PCI_HDRTYPE_DEVICE: u8 = 0x00;
/// 头类型：PCI-PCI 桥
pub const PCI_HDRTYPE_BRIDGE: u8 = 0x01;
/// 头类型掩码
pub const PCI_HDRTYPE_MASK: u8 = 0x7F;
/// 多功能设备标志
pub const PCI_HDRTYPE_MULTIFUNC: u8 = 0x80;

/// 无效厂商 ID（总线上无设备）
pub const PCI_VENDOR_INVALID: u16 = 0xFFFF;

/// BAR 位 0：I/O 空间
pub const PCI_BAR_IO: u32 = 0x1;
/// BAR 位 2：64 位内存 BAR
pub const PCI_BAR_MEM64: u32 = 0x4;
/// BAR 位 3：可预取
pub const PCI_BAR_PREFETCH: u32 = 0x8;
/// I/O BAR 地址掩码
pub const PCI_BAR_IO_MASK: u32 = !0x3;
/// 内存 BAR 地址掩码
pub const PCI_BAR_MEM_MASK: u32 = !0xF;
/// 扩展 ROM 地址掩码
pub const PCI_XROM_ADDR_MASK: u32 = !0x7FF;
/// 扩展 ROM 使能位
pub const PCI_XROM_ENABLE: u32 = 0x1;

/// 总线数
pub const PCI_MAX_BUS: usize = 256;
/// 每条总线的设备槽数
pub const PCI_MAX_DEV: usize = 32;
/// 每个设备的最大功能数
pub const PCI_MAX_FUNC: usize = 8;
