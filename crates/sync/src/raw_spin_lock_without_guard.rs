//! 不带中断保护的原始自旋锁
//!
//! 与 [`crate::RawSpinLock`] 的区别在于获取/释放不触碰中断状态，
//! 因此释放是无状态的，可以接入 `lock_api` 的通用锁框架。
//! 适用于调用方自行管理中断（例如已处于关中断路径）的场景。

use core::{
    hint,
    sync::atomic::{AtomicBool, Ordering},
};

/// 不含中断保护的原始自旋锁。
///
/// 通过实现 [`lock_api::RawMutex`]，可以用 [`SpinMutex`] 获得
/// 带数据、带 RAII 保护器的互斥锁，而无需本 crate 自己的封装。
#[derive(Debug)]
pub struct RawSpinLockWithoutGuard {
    lock: AtomicBool,
}

impl RawSpinLockWithoutGuard {
    /// 创建一个新的实例。
    pub const fn new() -> Self {
        RawSpinLockWithoutGuard {
            lock: AtomicBool::new(false),
        }
    }
}

impl Default for RawSpinLockWithoutGuard {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl lock_api::RawMutex for RawSpinLockWithoutGuard {
    const INIT: Self = RawSpinLockWithoutGuard::new();

    type GuardMarker = lock_api::GuardSend;

    fn lock(&self) {
        while self
            .lock
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            hint::spin_loop();
        }
    }

    fn try_lock(&self) -> bool {
        self.lock
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    unsafe fn unlock(&self) {
        self.lock.store(false, Ordering::Release);
    }

    fn is_locked(&self) -> bool {
        self.lock.load(Ordering::Relaxed)
    }
}

/// 基于 [`RawSpinLockWithoutGuard`] 的 lock_api 互斥锁。
pub type SpinMutex<T> = lock_api::Mutex<RawSpinLockWithoutGuard, T>;

/// [`SpinMutex`] 的保护器类型。
pub type SpinMutexGuard<'a, T> = lock_api::MutexGuard<'a, RawSpinLockWithoutGuard, T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spin_mutex_roundtrip() {
        // 不经过 IntrGuard，无需注册 ArchOps
        let m = SpinMutex::new(7);
        {
            let mut g = m.lock();
            *g *= 6;
        }
        assert_eq!(*m.lock(), 42);
        assert!(m.try_lock().is_some());
    }

    #[test]
    fn test_spin_mutex_contended_try_lock() {
        let m = SpinMutex::new(());
        let g = m.lock();
        assert!(m.try_lock().is_none());
        drop(g);
    }
}
