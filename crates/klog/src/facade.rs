//! `log` facade 桥接
//!
//! 库 crate（mm、设备、缓存层等）按生态惯例使用 `log::warn!` 等宏；
//! 本模块把这些调用转发进内核日志的环形缓冲区与控制台输出，
//! 使两套入口共享同一条管线。

use crate::{LogLevel, is_level_enabled, log_impl};

/// 把 `log` 记录转发给全局 LogCore 的桥接器。
struct KernelLogBridge;

impl log::Log for KernelLogBridge {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        is_level_enabled(LogLevel::from(metadata.level()))
    }

    fn log(&self, record: &log::Record<'_>) {
        if self.enabled(record.metadata()) {
            log_impl(LogLevel::from(record.level()), *record.args());
        }
    }

    fn flush(&self) {}
}

static BRIDGE: KernelLogBridge = KernelLogBridge;

/// 安装 `log` facade 桥接器。
///
/// 幂等：重复调用（或已有其它 logger）时静默返回。
/// 级别过滤完全交给 LogCore，facade 侧放行所有记录。
pub fn init_facade() {
    if log::set_logger(&BRIDGE).is_ok() {
        log::set_max_level(log::LevelFilter::Trace);
    }
}
