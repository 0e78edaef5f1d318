//! Mock 实现模块
//!
//! 提供架构与调度契约的 Mock 实现，用于宿主机测试。

pub mod arch;
pub mod sched;

use core::sync::atomic::{AtomicUsize, Ordering};

use arch::MOCK_ARCH_OPS;
use sched::MOCK_SLEEP_OPS;

// 0 = uninit, 1 = initializing, 2 = ready
static MOCK_INIT: AtomicUsize = AtomicUsize::new(0);

/// 注册 Mock 的 ArchOps 与 SleepOps（幂等，可从并发测试中调用）。
pub fn init_mock_runtime() {
    match MOCK_INIT.compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => {
            // Safety: tests share one set of static mock implementations.
            unsafe {
                sync::register_arch_ops(&MOCK_ARCH_OPS);
                sync::register_sleep_ops(&MOCK_SLEEP_OPS);
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

/// 设置 Mock 返回的当前 CPU 编号。
///
/// 作用于进程内所有线程；只应在单线程的测试场景中切换。
pub fn set_mock_cpu(cpu: usize) {
    MOCK_ARCH_OPS.cpu_id.store(cpu, Ordering::SeqCst);
}
