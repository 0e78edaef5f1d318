//! 面向使用者的日志宏
//!
//! 级别检查在格式化之前发生，被过滤的日志不支付格式化开销。

/// 以 **EMERGENCY (紧急)** 级别记录消息
#[macro_export]
macro_rules! pr_emerg {
    ($($arg:tt)*) => {
        if $crate::is_level_enabled($crate::LogLevel::Emergency) {
            $crate::log_impl($crate::LogLevel::Emergency, format_args!($($arg)*));
        }
    };
}

/// 以 **ALERT (警报)** 级别记录消息
#[macro_export]
macro_rules! pr_alert {
    ($($arg:tt)*) => {
        if $crate::is_level_enabled($crate::LogLevel::Alert) {
            $crate::log_impl($crate::LogLevel::Alert, format_args!($($arg)*));
        }
    };
}

/// 以 **CRITICAL (关键)** 级别记录消息
#[macro_export]
macro_rules! pr_crit {
    ($($arg:tt)*) => {
        if $crate::is_level_enabled($crate::LogLevel::Critical) {
            $crate::log_impl($crate::LogLevel::Critical, format_args!($($arg)*));
        }
    };
}

/// 以 **ERROR (错误)** 级别记录消息
#[macro_export]
macro_rules! pr_err {
    ($($arg:tt)*) => {
        if $crate::is_level_enabled($crate::LogLevel::Error) {
            $crate::log_impl($crate::LogLevel::Error, format_args!($($arg)*));
        }
    };
}

/// 以 **WARNING (警告)** 级别记录消息
#[macro_export]
macro_rules! pr_warn {
    ($($arg:tt)*) => {
        if $crate::is_level_enabled($crate::LogLevel::Warning) {
            $crate::log_impl($crate::LogLevel::Warning, format_args!($($arg)*));
        }
    };
}

/// 以 **NOTICE (注意)** 级别记录消息
#[macro_export]
macro_rules! pr_notice {
    ($($arg:tt)*) => {
        if $crate::is_level_enabled($crate::LogLevel::Notice) {
            $crate::log_impl($crate::LogLevel::Notice, format_args!($($arg)*));
        }
    };
}

/// 以 **INFO (信息)** 级别记录消息
#[macro_export]
macro_rules! pr_info {
    ($($arg:tt)*) => {
        if $crate::is_level_enabled($crate::LogLevel::Info) {
            $crate::log_impl($crate::LogLevel::Info, format_args!($($arg)*));
        }
    };
}

/// 以 **DEBUG (调试)** 级别记录消息
#[macro_export]
macro_rules! pr_debug {
    ($($arg:tt)*) => {
        if $crate::is_level_enabled($crate::LogLevel::Debug) {
            $crate::log_impl($crate::LogLevel::Debug, format_args!($($arg)*));
        }
    };
}
