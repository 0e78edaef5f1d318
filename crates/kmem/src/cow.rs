//! 引用计数 + 写时复制分配器
//!
//! 单条全局空闲链、一把全局锁，外加一个按页下标索引的引用计数表。
//! fork 把页以只读 + COW 标记映射进两个地址空间并把计数加一；
//! 对共享页的写入触发缺页，由 [`CowAllocator::resolve_cow_fault`]
//! 决定是原地升级还是复制出私有副本。页只有在计数归零时才真正回链。

use alloc::vec;
use alloc::vec::Vec;
use sync::{SpinLock, SpinLockGuard};

use crate::addr::{Paddr, Ppn, PpnRange, Vaddr, Vpn};
use crate::config::{ALLOC_JUNK, FREED_POISON, MAX_VA, PAGE_SIZE};
use crate::page_table::{PageTable, PteFlags};
use crate::{PageAllocator, stamp_page};

/// 写时复制故障处理的失败原因。
///
/// 这些都不是内核错误：调用方（通常是缺页处理）据此决定
/// 终止故障进程或回退当前操作。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CowError {
    /// 故障地址超出可寻址范围
    InvalidAddress,
    /// 地址没有有效的写时复制映射
    InvalidMapping,
    /// 没有空闲页可用于复制
    OutOfMemory,
}

/// 写时复制操作的结果类型
pub type CowResult<T> = Result<T, CowError>;

/// 全局锁之下的分配器状态。
struct CowInner {
    /// 受管范围，init 时写入
    range: Option<PpnRange>,
    /// 空闲页栈
    free: Vec<Ppn>,
    /// 按页下标的引用计数；空闲页计数为 0
    refcounts: Vec<i32>,
}

impl CowInner {
    /// 受管范围内页的下标。
    ///
    /// # Panics
    /// 页不在受管范围内时 panic。
    fn offset_of(&self, page: Ppn) -> usize {
        self.range
            .and_then(|range| range.offset_of(page))
            .unwrap_or_else(|| {
                panic!(
                    "kmem: unmanaged page {:#x}",
                    page.start_addr().as_usize()
                )
            })
    }
}

/// 引用计数 + 写时复制的物理页分配器。
pub struct CowAllocator {
    inner: SpinLock<CowInner>,
}

impl CowAllocator {
    /// 创建一个未接管任何内存的分配器。
    pub const fn new() -> Self {
        CowAllocator {
            inner: SpinLock::new(CowInner {
                range: None,
                free: Vec::new(),
                refcounts: Vec::new(),
            }),
        }
    }

    /// 页当前的引用计数。
    pub fn refcount(&self, page: Ppn) -> i32 {
        let inner = self.inner.lock();
        let idx = inner.offset_of(page);
        inner.refcounts[idx]
    }

    /// 把页的引用计数加一，不分配。
    ///
    /// 在页被新的映射共享时调用（例如 fork 把页以 COW 方式
    /// 映射进子进程的地址空间）。
    ///
    /// # Panics
    /// 地址未页对齐或不在受管范围内时 panic。
    pub fn incref(&self, addr: Paddr) {
        let page = Ppn::from_addr_aligned(addr);
        let mut inner = self.inner.lock();
        let idx = inner.offset_of(page);
        inner.refcounts[idx] += 1;
    }

    /// 处理对写时复制页的写入故障。
    ///
    /// - 地址超出可寻址范围 ⇒ [`CowError::InvalidAddress`]；
    /// - 无有效的 COW 映射 ⇒ [`CowError::InvalidMapping`]；
    /// - 页已不再共享（计数为 1）⇒ 原地清除 COW 标记、置可写位，无复制；
    /// - 仍在共享 ⇒ 分配新页（失败则 [`CowError::OutOfMemory`]）、
    ///   整页复制、重写页表项指向新页并开写权限，旧页计数减一
    ///   （可能触发回收）。
    pub fn resolve_cow_fault<PT>(&self, table: &mut PT, addr: Vaddr) -> CowResult<()>
    where
        PT: PageTable + ?Sized,
    {
        if addr.as_usize() >= MAX_VA {
            return Err(CowError::InvalidAddress);
        }
        let vpn = Vpn::from_addr_floor(addr);

        let entry = table.entry_mut(vpn).ok_or(CowError::InvalidMapping)?;
        if !entry.is_valid() || !entry.is_cow() {
            return Err(CowError::InvalidMapping);
        }

        let old = entry.ppn();
        let writable = (entry.flags() - PteFlags::COW) | PteFlags::WRITABLE;

        if self.refcount(old) == 1 {
            // 其余共享者都已放手，原地升级即可
            entry.set_flags(writable);
            return Ok(());
        }

        let Some(new) = self.alloc() else {
            log::warn!(
                "copy-on-write fault at {:#x}: out of physical pages",
                addr.as_usize()
            );
            return Err(CowError::OutOfMemory);
        };
        // SAFETY: old 仍被当前映射引用、new 刚分配且未共享，
        // 二者都在恒等映射的受管范围内
        unsafe {
            core::ptr::copy_nonoverlapping(
                old.start_addr().as_ptr::<u8>(),
                new.start_addr().as_mut_ptr::<u8>(),
                PAGE_SIZE,
            );
        }
        entry.set(new, writable);
        self.free(old);
        Ok(())
    }

    /// 释放一页：计数减一，归零时毒化并回链。
    fn release_page(inner: &mut SpinLockGuard<'_, CowInner>, page: Ppn) {
        let idx = inner.offset_of(page);
        debug_assert!(
            inner.refcounts[idx] > 0,
            "kmem: free of page with zero refcount"
        );
        inner.refcounts[idx] -= 1;
        if inner.refcounts[idx] <= 0 {
            inner.refcounts[idx] = 0;
            // SAFETY: 计数归零，不再有映射引用该页
            unsafe { stamp_page(page, FREED_POISON) };
            inner.free.push(page);
        }
    }
}

impl Default for CowAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl PageAllocator for CowAllocator {
    fn init(&self, range: PpnRange) {
        let mut inner = self.inner.lock();
        inner.range = Some(range);
        inner.refcounts = vec![1; range.len()];
        inner.free = Vec::with_capacity(range.len());
        // 每页从计数 1 起步并立即释放：归零、毒化、入链
        for page in range.iter() {
            Self::release_page(&mut inner, page);
        }
    }

    fn alloc(&self) -> Option<Ppn> {
        let page = {
            let mut inner = self.inner.lock();
            let page = inner.free.pop();
            if let Some(page) = page {
                let idx = inner.offset_of(page);
                inner.refcounts[idx] = 1;
            }
            page
        };
        if let Some(page) = page {
            // SAFETY: 页刚出链，当前调用者独占
            unsafe { stamp_page(page, ALLOC_JUNK) };
        }
        page
    }

    fn free(&self, page: Ppn) {
        let mut inner = self.inner.lock();
        Self::release_page(&mut inner, page);
    }

    fn free_pages(&self) -> usize {
        self.inner.lock().free.len()
    }
}
