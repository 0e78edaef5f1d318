//! 读写自旋锁
//!
//! 允许多个读者并发访问、写者独占访问的自旋锁。
//! 与 [`crate::SpinLock`] 一样，持锁期间本地中断被禁用，
//! 适合读多写少的短临界区（例如设备驱动注册表）。

use core::cell::UnsafeCell;
use core::hint;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::intr_guard::IntrGuard;

/// 写者占用时的状态值。读者数量不可能达到该值。
const WRITER: usize = usize::MAX;

/// 读写自旋锁。
///
/// 内部状态为一个原子计数：0 表示空闲，n 表示 n 个读者，
/// `WRITER` 表示写者独占。写者不具有优先级，可能在读者
/// 持续到达时饥饿；本内核中写操作集中在初始化阶段，可以接受。
#[derive(Debug)]
pub struct RwLock<T> {
    state: AtomicUsize,
    data: UnsafeCell<T>,
}

impl<T> RwLock<T> {
    /// 创建一个新的 RwLock 实例。
    pub const fn new(data: T) -> Self {
        RwLock {
            state: AtomicUsize::new(0),
            data: UnsafeCell::new(data),
        }
    }

    /// 获取读锁，返回共享访问的 RAII 保护器。
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        let guard = IntrGuard::new();
        loop {
            let state = self.state.load(Ordering::Relaxed);
            if state != WRITER
                && self
                    .state
                    .compare_exchange_weak(state, state + 1, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
            {
                return RwLockReadGuard {
                    lock: self,
                    _intr_guard: guard,
                };
            }
            hint::spin_loop();
        }
    }

    /// 获取写锁，返回独占访问的 RAII 保护器。
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        let guard = IntrGuard::new();
        while self
            .state
            .compare_exchange_weak(0, WRITER, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            hint::spin_loop();
        }
        RwLockWriteGuard {
            lock: self,
            _intr_guard: guard,
        }
    }
}

/// RwLock 的读保护器，允许共享访问。
pub struct RwLockReadGuard<'a, T> {
    lock: &'a RwLock<T>,
    _intr_guard: IntrGuard,
}

/// RwLock 的写保护器，允许独占访问。
pub struct RwLockWriteGuard<'a, T> {
    lock: &'a RwLock<T>,
    _intr_guard: IntrGuard,
}

impl<T> Deref for RwLockReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // SAFETY: 读者计数 > 0，没有写者
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> Drop for RwLockReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.state.fetch_sub(1, Ordering::Release);
    }
}

impl<T> Deref for RwLockWriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // SAFETY: 写者独占
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for RwLockWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: 写者独占
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for RwLockWriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.state.store(0, Ordering::Release);
    }
}

// Safety: 状态机保证读共享/写独占，可在线程间共享。
unsafe impl<T: Send> Send for RwLock<T> {}
unsafe impl<T: Send + Sync> Sync for RwLock<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rwlock_multiple_readers() {
        crate::test_mock::init_mock_runtime();
        let lock = RwLock::new(5);
        let r1 = lock.read();
        let r2 = lock.read();
        assert_eq!(*r1, 5);
        assert_eq!(*r2, 5);
    }

    #[test]
    fn test_rwlock_write_then_read() {
        crate::test_mock::init_mock_runtime();
        let lock = RwLock::new(0);
        {
            let mut w = lock.write();
            *w = 9;
        }
        assert_eq!(*lock.read(), 9);
    }
}
