//! 中断保护器
//!
//! 基于 RAII 实现中断保护：创建时禁用本地中断，销毁时恢复之前的状态。
//!
//! 注意：禁用中断只能阻止**本地 CPU** 上“任务 vs 本地中断”的并发，
//! 并不能阻止其它 CPU 的并行访问；多核共享数据仍需配合自旋锁等原语。

use crate::arch_ops;
use core::ops::Drop;

/// 中断保护器。
///
/// 创建时原子地禁用本地中断并保存之前的状态，
/// 销毁时自动恢复。支持嵌套：内层保护器保存到的是“已禁用”状态，
/// 只有最外层的恢复才真正重新打开中断。
///
/// # 示例
/// ```ignore
/// {
///     let _guard = IntrGuard::new(); // 禁用中断
///     // 临界区代码
/// } // 离开作用域，恢复中断状态
/// ```
pub struct IntrGuard {
    flags: usize,
}

impl IntrGuard {
    /// 原子地禁用中断并返回一个 IntrGuard 实例。
    pub fn new() -> Self {
        // SAFETY: 读取-禁用是通过已注册的 ArchOps 完成的原子操作，
        // 返回的 flags 仅由本保护器的 Drop 消费。
        let flags = unsafe { arch_ops().read_and_disable_interrupts() };
        IntrGuard { flags }
    }

    /// 检查进入临界区前中断是否处于启用状态。
    #[allow(dead_code)]
    pub fn was_enabled(&self) -> bool {
        self.flags & arch_ops().intr_enable_bit() != 0
    }
}

impl Default for IntrGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IntrGuard {
    /// 当 IntrGuard 离开作用域时，自动恢复中断状态。
    fn drop(&mut self) {
        // SAFETY: flags 是创建本保护器时保存的值
        unsafe { arch_ops().restore_interrupts(self.flags) };
    }
}
