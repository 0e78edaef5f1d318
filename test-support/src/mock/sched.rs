//! 挂起/唤醒契约的 Mock 实现

use sync::SleepOps;

/// Mock 挂起/唤醒操作
///
/// 宿主机上没有内核调度器，`sleep` 退化为一次自旋提示后返回
/// （即永远是“虚假唤醒”）；SleepLock 的重查循环保证正确性，
/// 代价只是等待方忙等。`wake` 因此无事可做。
pub struct MockSleepOps;

impl SleepOps for MockSleepOps {
    fn sleep(&self, _channel: usize) {
        core::hint::spin_loop();
    }

    fn wake(&self, _channel: usize) {}
}

/// 全局 Mock 实例
pub static MOCK_SLEEP_OPS: MockSleepOps = MockSleepOps;
