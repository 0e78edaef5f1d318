//! 内存管理配置常量
//!
//! 这些值与机器布局绑定，为保持兼容必须精确复现。

/// 页大小（字节）
pub const PAGE_SIZE: usize = 4096;

/// 执行核心总数
pub const NCPU: usize = 8;

/// 内核装载基址
pub const KERNEL_BASE: usize = 0x8000_0000;

/// 物理内存顶端（基址之上 128 MiB）
pub const PHYS_TOP: usize = KERNEL_BASE + 128 * 1024 * 1024;

/// 虚拟地址上限。
///
/// Sv39 共 39 位，保留最高位避免符号扩展歧义，因此取 1 << 38。
pub const MAX_VA: usize = 1 << 38;

/// 释放页的毒化填充字节，用于暴露悬空引用
pub const FREED_POISON: u8 = 0x01;

/// 新分配页的垃圾填充字节，用于暴露未初始化读取
pub const ALLOC_JUNK: u8 = 0x05;
