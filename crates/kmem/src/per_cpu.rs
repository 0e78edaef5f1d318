//! 每核空闲链分配器
//!
//! 每个执行核心持有一条自己的空闲页链和一把自己的锁。
//! 常态下分配与释放都只接触本核的链；本核耗尽时按固定升序
//! 扫描其余核心，渐进收缩到空闲页最多的那一个再窃取一页。
//!
//! 释放的页进入**执行释放的核心**的链，而不是它最初所属的核心，
//! 这让页在负载不均时自然向活跃核心迁移。

use core::sync::atomic::{AtomicUsize, Ordering};

use alloc::vec::Vec;
use sync::{IntrGuard, SpinLock, SpinLockGuard};

use crate::addr::{Ppn, PpnRange};
use crate::config::{ALLOC_JUNK, FREED_POISON, NCPU};
use crate::{PageAllocator, stamp_page};

/// 单个核心的空闲页链。
///
/// 页码栈按 LIFO 复用，刚释放的页最先被再次分配。
struct CoreList {
    pages: Vec<Ppn>,
}

/// 每核空闲链 + 工作窃取的物理页分配器。
pub struct PerCpuAllocator {
    cores: [SpinLock<CoreList>; NCPU],
    /// 受管范围 `[start, end)` 的页码，init 时写入。
    /// 0/0 表示尚未初始化，此时 free 对任何页都是契约违规。
    range_start: AtomicUsize,
    range_end: AtomicUsize,
}

impl PerCpuAllocator {
    /// 创建一个未接管任何内存的分配器。
    pub const fn new() -> Self {
        PerCpuAllocator {
            cores: [const {
                SpinLock::new(CoreList { pages: Vec::new() })
            }; NCPU],
            range_start: AtomicUsize::new(0),
            range_end: AtomicUsize::new(0),
        }
    }

    /// 受管页码范围。
    fn managed_range(&self) -> PpnRange {
        PpnRange::new(
            Ppn::from_usize(self.range_start.load(Ordering::Acquire)),
            Ppn::from_usize(self.range_end.load(Ordering::Acquire)),
        )
    }

    /// 指定核心当前的空闲页数，供统计与测试观察。
    pub fn core_free_pages(&self, core: usize) -> usize {
        self.cores[core].lock().pages.len()
    }

    /// 从其余核心窃取一页。
    ///
    /// 按固定升序访问所有远端核心，任一时刻除正在检查的核心外
    /// 只保留当前最优候选者的锁；固定顺序 + 渐进收缩排除了死锁。
    fn steal(&self, cpu: usize) -> Option<Ppn> {
        let mut best: Option<SpinLockGuard<'_, CoreList>> = None;
        for victim in 0..NCPU {
            if victim == cpu {
                continue;
            }
            let candidate = self.cores[victim].lock();
            let better = match &best {
                None => !candidate.pages.is_empty(),
                Some(current) => candidate.pages.len() > current.pages.len(),
            };
            if better {
                // 赋值的同时释放上一个最优候选者的锁
                best = Some(candidate);
            }
        }
        best.and_then(|mut winner| winner.pages.pop())
    }
}

impl Default for PerCpuAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl PageAllocator for PerCpuAllocator {
    fn init(&self, range: PpnRange) {
        self.range_start.store(range.start().as_usize(), Ordering::Release);
        self.range_end.store(range.end().as_usize(), Ordering::Release);
        // 初始页全部进入执行 init 的核心的链
        for page in range.iter() {
            self.free(page);
        }
    }

    fn alloc(&self) -> Option<Ppn> {
        // 关中断期间核心编号保持稳定
        let _intr = IntrGuard::new();
        let cpu = sync::cpu_id();
        debug_assert!(cpu < NCPU, "cpu id out of range");

        let page = {
            let mut local = self.cores[cpu].lock();
            local.pages.pop()
        };
        let page = match page {
            Some(page) => Some(page),
            None => self.steal(cpu),
        };

        if let Some(page) = page {
            // SAFETY: 页刚出链，当前调用者独占
            unsafe { stamp_page(page, ALLOC_JUNK) };
        }
        page
    }

    fn free(&self, page: Ppn) {
        if !self.managed_range().contains(page) {
            panic!(
                "kmem: free of unmanaged page {:#x}",
                page.start_addr().as_usize()
            );
        }
        // SAFETY: 页即将入链，调用者交出所有权后不再访问
        unsafe { stamp_page(page, FREED_POISON) };

        let _intr = IntrGuard::new();
        let cpu = sync::cpu_id();
        debug_assert!(cpu < NCPU, "cpu id out of range");
        self.cores[cpu].lock().pages.push(page);
    }

    fn free_pages(&self) -> usize {
        (0..NCPU).map(|core| self.core_free_pages(core)).sum()
    }
}
