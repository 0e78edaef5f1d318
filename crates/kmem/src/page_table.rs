//! 页表遍历契约
//!
//! 写时复制的故障处理只需要“按虚拟页码找到页表项”这一种能力，
//! 页表的创建、映射与 TLB 管理属于虚拟内存子系统，不在本 crate 内。
//! 这里定义供故障处理使用的最小接口和通用页表项表示。

use bitflags::bitflags;

use crate::addr::{Ppn, Vpn};

bitflags! {
    /// 通用页表项标志位
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PteFlags: usize {
        /// 映射有效
        const VALID = 1 << 0;
        /// 可读
        const READABLE = 1 << 1;
        /// 可写
        const WRITABLE = 1 << 2;
        /// 可执行
        const EXECUTABLE = 1 << 3;
        /// 用户态可访问
        const USER = 1 << 4;
        /// 写时复制标记（占用软件保留位）
        const COW = 1 << 8;
    }
}

/// 通用页表项：物理页码 + 标志位。
///
/// 各架构的硬件页表格式由虚拟内存子系统折算成本表示。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTableEntry {
    ppn: Ppn,
    flags: PteFlags,
}

impl PageTableEntry {
    /// 创建一个页表项。
    pub const fn new(ppn: Ppn, flags: PteFlags) -> Self {
        PageTableEntry { ppn, flags }
    }

    /// 映射到的物理页码。
    pub const fn ppn(&self) -> Ppn {
        self.ppn
    }

    /// 当前标志位。
    pub const fn flags(&self) -> PteFlags {
        self.flags
    }

    /// 仅更新标志位。
    pub fn set_flags(&mut self, flags: PteFlags) {
        self.flags = flags;
    }

    /// 同时更新物理页码和标志位。
    pub fn set(&mut self, ppn: Ppn, flags: PteFlags) {
        self.ppn = ppn;
        self.flags = flags;
    }

    /// 映射是否有效。
    pub fn is_valid(&self) -> bool {
        self.flags.contains(PteFlags::VALID)
    }

    /// 是否带写时复制标记。
    pub fn is_cow(&self) -> bool {
        self.flags.contains(PteFlags::COW)
    }
}

/// 页表遍历接口
///
/// 由虚拟内存子系统实现。`entry_mut` 是只读遍历：
/// 查不到（含中间级缺失）返回 None，绝不创建新的页表级。
pub trait PageTable {
    /// 查找给定虚拟页码对应的页表项。
    fn entry_mut(&mut self, vpn: Vpn) -> Option<&mut PageTableEntry>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_flag_updates() {
        let mut entry = PageTableEntry::new(
            Ppn::from_usize(5),
            PteFlags::VALID | PteFlags::READABLE | PteFlags::COW,
        );
        assert!(entry.is_valid());
        assert!(entry.is_cow());

        entry.set_flags((entry.flags() - PteFlags::COW) | PteFlags::WRITABLE);
        assert!(!entry.is_cow());
        assert!(entry.flags().contains(PteFlags::WRITABLE));
        assert_eq!(entry.ppn().as_usize(), 5);

        entry.set(Ppn::from_usize(9), entry.flags());
        assert_eq!(entry.ppn().as_usize(), 9);
    }
}
