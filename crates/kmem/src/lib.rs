//! 物理页分配子系统
//!
//! 为用户地址空间、内核栈和页表页提供整页粒度的物理内存分配。
//!
//! # 两种策略
//!
//! 同一个 [`PageAllocator`] 契约下有两个可互换的实现，
//! 在内核配置阶段二选一：
//!
//! - [`PerCpuAllocator`]：每核一条空闲链 + 工作窃取，
//!   常态下分配/释放只碰本核的锁；
//! - [`CowAllocator`]：全局空闲链 + 按页引用计数，
//!   支持 fork 后的写时复制页共享与延迟回收。
//!
//! 两者共享诊断填充行为：释放的页被 [`config::FREED_POISON`] 覆写、
//! 新分配的页被 [`config::ALLOC_JUNK`] 覆写，便于暴露悬空引用和
//! 未初始化读取。
//!
//! # 地址句柄
//!
//! 分配以 [`Ppn`]（物理页码）为单位；[`addr`] 模块提供地址与页码
//! 之间带检查的转换。本层假定物理内存恒等映射。
//!
//! # 并发
//!
//! 所有分配器状态由自旋锁保护；跨核窃取按固定升序扫描、
//! 渐进收缩持锁范围，与块缓存层的驱逐扫描采用同一套手法，
//! 从而无需全局大锁即可排除死锁。

#![no_std]

extern crate alloc;

pub mod addr;
pub mod config;
pub mod cow;
pub mod page_table;
pub mod per_cpu;

pub use addr::{Paddr, Ppn, PpnRange, Vaddr, Vpn};
pub use config::{ALLOC_JUNK, FREED_POISON, MAX_VA, NCPU, PAGE_SIZE, PHYS_TOP};
pub use cow::{CowAllocator, CowError, CowResult};
pub use page_table::{PageTable, PageTableEntry, PteFlags};
pub use per_cpu::PerCpuAllocator;

/// 物理页分配器契约
///
/// 两种策略共享的外部接口；调用方在配置阶段选定实现后，
/// 只通过该契约使用分配器。
pub trait PageAllocator: Send + Sync {
    /// 接管给定物理页范围。只能在启动阶段调用一次。
    fn init(&self, range: PpnRange);

    /// 分配一页。耗尽时返回 None；这不是致命错误，
    /// 由调用方（fork、缺页处理、栈分配）决定如何收场。
    fn alloc(&self) -> Option<Ppn>;

    /// 归还一页。
    ///
    /// # Panics
    /// 页不在受管范围内时 panic：这是调用方的契约违规。
    fn free(&self, page: Ppn);

    /// 当前空闲页总数。
    fn free_pages(&self) -> usize;
}

/// 用诊断字节覆写整页。
///
/// # Safety
/// 调用者必须独占该页（刚出链或即将入链），且该页位于
/// 恒等映射的受管物理范围内。
pub(crate) unsafe fn stamp_page(page: Ppn, byte: u8) {
    // SAFETY: 独占性由调用者保证，范围合法性由分配器在入口处校验
    unsafe {
        core::ptr::write_bytes(page.start_addr().as_mut_ptr::<u8>(), byte, config::PAGE_SIZE);
    }
}
