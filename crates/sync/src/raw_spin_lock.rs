//! 自旋锁实现
//!
//! 基于原子操作实现的自旋锁，结合 IntrGuard 在持锁期间禁用本地中断。

use crate::intr_guard::IntrGuard;
use core::{
    hint,
    sync::atomic::{AtomicBool, Ordering},
};

/// 不含数据的原始自旋锁。
///
/// 不可重入：持锁期间再次 lock() 会死锁。
/// 临界区必须短且有界，持锁期间不得执行任何可能阻塞的操作。
#[derive(Debug)]
pub struct RawSpinLock {
    lock: AtomicBool,
}

impl RawSpinLock {
    /// 创建一个新的 RawSpinLock 实例。
    pub const fn new() -> Self {
        RawSpinLock {
            lock: AtomicBool::new(false),
        }
    }

    /// 获取自旋锁，返回 RAII 保护器。
    ///
    /// 获取前先在当前 CPU 禁用本地中断，释放时一并恢复。
    pub fn lock(&self) -> RawSpinLockGuard<'_> {
        let guard = IntrGuard::new();

        while self
            .lock
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            hint::spin_loop();
        }

        RawSpinLockGuard {
            lock: self,
            _intr_guard: guard,
        }
    }

    /// 尝试获取自旋锁，成功则返回 RAII 保护器，否则返回 None。
    ///
    /// 获取失败时中断状态立即恢复（IntrGuard 被 Drop）。
    pub fn try_lock(&self) -> Option<RawSpinLockGuard<'_>> {
        let guard = IntrGuard::new();

        if self
            .lock
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(RawSpinLockGuard {
                lock: self,
                _intr_guard: guard,
            })
        } else {
            None
        }
    }

    /// 仅释放锁标志。
    fn unlock(&self) {
        self.lock.store(false, Ordering::Release);
    }

    /// 检查锁是否被占用 (仅用于调试/测试)
    #[cfg(test)]
    pub fn is_locked(&self) -> bool {
        self.lock.load(Ordering::Relaxed)
    }
}

impl Default for RawSpinLock {
    fn default() -> Self {
        Self::new()
    }
}

/// 自动释放自旋锁并恢复中断状态的 RAII 结构体
pub struct RawSpinLockGuard<'a> {
    lock: &'a RawSpinLock,
    _intr_guard: IntrGuard,
}

impl Drop for RawSpinLockGuard<'_> {
    /// 退出作用域时先释放锁标志，随后 IntrGuard 被 Drop、恢复中断状态。
    fn drop(&mut self) {
        self.lock.unlock();
    }
}
