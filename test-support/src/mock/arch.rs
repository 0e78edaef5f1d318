//! 架构相关操作的 Mock 实现

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use sync::ArchOps;

/// Mock 架构操作
///
/// 中断状态仅是一个进程级布尔量；宿主机测试里真正的互斥
/// 由被测的锁本身提供，这里只需要让 IntrGuard 的保存/恢复闭合。
pub struct MockArchOps {
    /// 模拟的中断开关状态
    pub interrupt_state: AtomicBool,
    /// 模拟的当前 CPU 编号
    pub cpu_id: AtomicUsize,
    /// 模拟的 CPU 总数
    pub max_cpus: AtomicUsize,
}

impl MockArchOps {
    /// 创建一个 Mock 实例（单 CPU、中断开启）。
    pub const fn new() -> Self {
        Self {
            interrupt_state: AtomicBool::new(true),
            cpu_id: AtomicUsize::new(0),
            max_cpus: AtomicUsize::new(8),
        }
    }
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
        0x2 // SIE bit
    }

    fn cpu_id(&self) -> usize {
        self.cpu_id.load(Ordering::SeqCst)
    }

    fn max_cpu_count(&self) -> usize {
        self.max_cpus.load(Ordering::SeqCst)
    }
}

/// 全局 Mock 实例
pub static MOCK_ARCH_OPS: MockArchOps = MockArchOps::new();
