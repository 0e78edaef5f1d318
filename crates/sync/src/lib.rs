//! 同步原语
//!
//! 向其它内核模块提供基本的锁和同步原语：
//! 自旋锁（短临界区，关中断）、睡眠锁（长临界区，挂起执行流）、
//! 读写锁、中断保护等。
//!
//! # 锁的选择
//!
//! - 保护簿记字段（引用计数、链表、计数器）用 [`SpinLock`]：
//!   有界自旋，临界区内本地中断被禁用，绝不能在持锁期间做 I/O。
//! - 保护可能伴随慢速 I/O 的数据（如块缓冲的载荷）用 [`SleepLock`]：
//!   获取失败时挂起当前执行流而不是忙等。
//!
//! # 架构依赖
//!
//! 此 crate 通过两个 trait 与外部环境解耦：
//!
//! - [`ArchOps`]：中断控制与 CPU 信息，由内核启动代码实现并注册；
//! - [`SleepOps`]：在等待通道上挂起/唤醒执行流，由调度器实现并注册。
//!
//! 使用前必须分别调用 [`register_arch_ops`] 和 [`register_sleep_ops`]。

#![no_std]

mod intr_guard;
mod raw_spin_lock;
mod raw_spin_lock_without_guard;
mod rwlock;
mod sleep_lock;
mod spin_lock;

pub use intr_guard::*;
pub use raw_spin_lock::*;
pub use raw_spin_lock_without_guard::*;
pub use rwlock::*;
pub use sleep_lock::*;
pub use spin_lock::*;

use core::sync::atomic::{AtomicUsize, Ordering};

/// 架构相关操作的 trait
///
/// 由内核启动代码实现并注册，提供中断控制和 CPU 信息
pub trait ArchOps: Send + Sync {
    /// 读取并禁用中断，返回之前的状态
    ///
    /// # Safety
    /// 调用者必须确保在适当的上下文中调用
    unsafe fn read_and_disable_interrupts(&self) -> usize;

    /// 恢复中断状态
    ///
    /// # Safety
    /// flags 必须是之前 read_and_disable_interrupts 返回的值
    unsafe fn restore_interrupts(&self, flags: usize);

    /// 获取中断使能位掩码
    fn intr_enable_bit(&self) -> usize;

    /// 获取当前 CPU ID
    fn cpu_id(&self) -> usize;

    /// 获取最大 CPU 数量
    fn max_cpu_count(&self) -> usize;
}

/// 挂起/唤醒操作的 trait
///
/// 由调度器实现并注册。通道是一个不透明的 usize（习惯上取等待对象的地址）。
///
/// 唤醒允许是虚假的：`sleep` 返回并不保证条件已经满足，
/// 调用方必须在循环中重新检查后再决定是否继续等待。
pub trait SleepOps: Send + Sync {
    /// 在给定通道上挂起当前执行流
    fn sleep(&self, channel: usize);

    /// 唤醒在给定通道上挂起的所有执行流
    fn wake(&self, channel: usize);
}

/// 全局架构操作实例（存储 fat pointer 的两个部分）
static ARCH_OPS_DATA: AtomicUsize = AtomicUsize::new(0);
static ARCH_OPS_VTABLE: AtomicUsize = AtomicUsize::new(0);

/// 全局挂起/唤醒操作实例
static SLEEP_OPS_DATA: AtomicUsize = AtomicUsize::new(0);
static SLEEP_OPS_VTABLE: AtomicUsize = AtomicUsize::new(0);

/// 注册架构操作实现
///
/// # Safety
/// 必须在单线程环境下调用，且只能调用一次
pub unsafe fn register_arch_ops(ops: &'static dyn ArchOps) {
    let ptr = ops as *const dyn ArchOps;
    // SAFETY: transmute 在这里是安全的，因为 fat pointer 的布局是 (data, vtable)
    let (data, vtable) = unsafe { core::mem::transmute::<*const dyn ArchOps, (usize, usize)>(ptr) };
    ARCH_OPS_DATA.store(data, Ordering::Release);
    ARCH_OPS_VTABLE.store(vtable, Ordering::Release);
}

/// 注册挂起/唤醒操作实现
///
/// # Safety
/// 必须在单线程环境下调用，且只能调用一次
pub unsafe fn register_sleep_ops(ops: &'static dyn SleepOps) {
    let ptr = ops as *const dyn SleepOps;
    // SAFETY: 同 register_arch_ops，按 (data, vtable) 拆分存储
    let (data, vtable) =
        unsafe { core::mem::transmute::<*const dyn SleepOps, (usize, usize)>(ptr) };
    SLEEP_OPS_DATA.store(data, Ordering::Release);
    SLEEP_OPS_VTABLE.store(vtable, Ordering::Release);
}

/// 获取架构操作实例
#[inline]
pub(crate) fn arch_ops() -> &'static dyn ArchOps {
    let data = ARCH_OPS_DATA.load(Ordering::Acquire);
    let vtable = ARCH_OPS_VTABLE.load(Ordering::Acquire);
    if data == 0 {
        panic!("sync: ArchOps not registered, call register_arch_ops first");
    }
    // SAFETY: data 和 vtable 是通过 register_arch_ops 设置的有效指针
    unsafe { &*core::mem::transmute::<(usize, usize), *const dyn ArchOps>((data, vtable)) }
}

/// 获取挂起/唤醒操作实例
#[inline]
pub(crate) fn sleep_ops() -> &'static dyn SleepOps {
    let data = SLEEP_OPS_DATA.load(Ordering::Acquire);
    let vtable = SLEEP_OPS_VTABLE.load(Ordering::Acquire);
    if data == 0 {
        panic!("sync: SleepOps not registered, call register_sleep_ops first");
    }
    // SAFETY: data 和 vtable 是通过 register_sleep_ops 设置的有效指针
    unsafe { &*core::mem::transmute::<(usize, usize), *const dyn SleepOps>((data, vtable)) }
}

/// 当前 CPU 编号（经由已注册的 [`ArchOps`]）
#[inline]
pub fn cpu_id() -> usize {
    arch_ops().cpu_id()
}

/// 最大 CPU 数量（经由已注册的 [`ArchOps`]）
#[inline]
pub fn max_cpu_count() -> usize {
    arch_ops().max_cpu_count()
}

#[cfg(test)]
mod test_mock {
    //! 本 crate 自身单元测试用的 Mock 运行时。
    //!
    //! `cargo test -p sync` 会把 sync 连同 `cfg(test)` 重新编译进测试
    //! 二进制，其全局 static 与 `test-support` 所链接的 sync 实例互相
    //! 独立；因此 sync 自己的测试必须在同一个实例内注册 Mock，
    //! 不能经由 `test-support`（那会写进另一份 static）。
    //!
    //! 行为与 `test-support` 的 Mock 完全一致。
    use super::{ArchOps, SleepOps, register_arch_ops, register_sleep_ops};
    use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct MockArchOps {
        interrupt_state: AtomicBool,
        cpu_id: AtomicUsize,
        max_cpus: AtomicUsize,
    }

    impl ArchOps for MockArchOps {
        unsafe fn read_and_disable_interrupts(&self) -> usize {
            if self.interrupt_state.swap(false, Ordering::SeqCst) {
                0x2
            } else {
                0
            }
        }

        unsafe fn restore_interrupts(&self, flags: usize) {
            self.interrupt_state.store(flags != 0, Ordering::SeqCst);
        }

        fn intr_enable_bit(&self) -> usize {
            0x2
        }

        fn cpu_id(&self) -> usize {
            self.cpu_id.load(Ordering::SeqCst)
        }

        fn max_cpu_count(&self) -> usize {
            self.max_cpus.load(Ordering::SeqCst)
        }
    }

    static MOCK_ARCH_OPS: MockArchOps = MockArchOps {
        interrupt_state: AtomicBool::new(true),
        cpu_id: AtomicUsize::new(0),
        max_cpus: AtomicUsize::new(8),
    };

    struct MockSleepOps;

    impl SleepOps for MockSleepOps {
        fn sleep(&self, _channel: usize) {
            core::hint::spin_loop();
        }

        fn wake(&self, _channel: usize) {}
    }

    static MOCK_SLEEP_OPS: MockSleepOps = MockSleepOps;

    // 0 = uninit, 1 = initializing, 2 = ready
    static MOCK_INIT: AtomicUsize = AtomicUsize::new(0);

    /// 注册 Mock 的 ArchOps 与 SleepOps（幂等，可从并发测试中调用）。
    pub(crate) fn init_mock_runtime() {
        match MOCK_INIT.compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => {
                // Safety: tests share one set of static mock implementations.
                unsafe {
                    register_arch_ops(&MOCK_ARCH_OPS);
                    register_sleep_ops(&MOCK_SLEEP_OPS);
                }
                MOCK_INIT.store(2, Ordering::Release);
            }
            Err(_) => {
                while MOCK_INIT.load(Ordering::Acquire) != 2 {
                    core::hint::spin_loop();
                }
            }
        }
    }
}
