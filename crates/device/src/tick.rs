//! 系统滴答计数服务
//!
//! 由定时器中断路径推进的单调计数器，自身持有一把自旋锁。
//! 缓存层用它为“引用计数归零”时刻打 LRU 时间戳。

use sync::SpinLock;

/// 单调滴答源。
///
/// 读取必须是单调不减的；实现自行保证内部同步。
pub trait TickSource: Send + Sync {
    /// 当前滴答值
    fn current_tick(&self) -> u64;
}

/// 系统滴答计数器。
///
/// 每次定时器中断调用一次 [`Ticks::advance`]；计数只增不减。
pub struct Ticks {
    ticks: SpinLock<u64>,
}

impl Ticks {
    /// 创建一个从 0 开始的计数器。
    pub const fn new() -> Self {
        Ticks {
            ticks: SpinLock::new(0),
        }
    }

    /// 推进一个滴答，返回推进后的值。
    pub fn advance(&self) -> u64 {
        let mut ticks = self.ticks.lock();
        *ticks += 1;
        *ticks
    }
}

impl Default for Ticks {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for Ticks {
    fn current_tick(&self) -> u64 {
        *self.ticks.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_monotonic() {
        test_support::init_mock_runtime();
        let ticks = Ticks::new();
        assert_eq!(ticks.current_tick(), 0);
        assert_eq!(ticks.advance(), 1);
        assert_eq!(ticks.advance(), 2);
        assert_eq!(ticks.current_tick(), 2);
    }
}
