//! 日志级别定义
//!
//! 采用 Linux 内核风格的八个级别，数值越小越紧急。

/// 日志级别（从 Emergency 到 Debug，数值越小越紧急）
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// 系统不可用
    Emergency = 0,
    /// 必须立即采取行动
    Alert = 1,
    /// 临界状态
    Critical = 2,
    /// 错误
    Error = 3,
    /// 警告
    Warning = 4,
    /// 正常但值得注意
    Notice = 5,
    /// 一般信息
    Info = 6,
    /// 调试信息
    Debug = 7,
}

impl LogLevel {
    /// 从原始 u8 恢复级别，越界值按 Debug 处理。
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => LogLevel::Emergency,
            1 => LogLevel::Alert,
            2 => LogLevel::Critical,
            3 => LogLevel::Error,
            4 => LogLevel::Warning,
            5 => LogLevel::Notice,
            6 => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    }

    /// 级别的固定宽度标签，用于格式化输出。
    pub fn label(self) -> &'static str {
        match self {
            LogLevel::Emergency => "EMERG",
            LogLevel::Alert => "ALERT",
            LogLevel::Critical => "CRIT",
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARN",
            LogLevel::Notice => "NOTICE",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }
}

impl From<log::Level> for LogLevel {
    /// `log` facade 五级到内核八级的映射。
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => LogLevel::Error,
            log::Level::Warn => LogLevel::Warning,
            log::Level::Info => LogLevel::Info,
            log::Level::Debug => LogLevel::Debug,
            log::Level::Trace => LogLevel::Debug,
        }
    }
}
