//! 内核日志子系统
//!
//! 提供 Linux 内核风格的分级日志：
//!
//! - [`LogCore`] - 核心实现：定长记录环形缓冲区 + 级别阈值
//! - [`LogLevel`] - 八个级别（Emergency 到 Debug）
//! - [`macros`] - 面向使用者的日志宏（`pr_info!`、`pr_err!` 等）
//! - [`init_facade`] - `log` facade 桥接，让库 crate 里的
//!   `log::warn!` 等调用落入同一个环形缓冲区
//!
//! # 双输出策略
//!
//! 1. **即时控制台输出**：达到控制台级别阈值（默认 Warning 及以上）的
//!    日志通过已注册的 [`LogOutput`] 直接打印。
//! 2. **环形缓冲区存储**：达到全局级别阈值（默认 Info 及以上）的日志
//!    写入缓冲区，供异步消费或事后分析；写满时覆盖最旧的记录。
//!
//! # 环境解耦
//!
//! 通过 trait 抽象与内核其它部分解耦：
//!
//! - [`LogContextProvider`]：提供 CPU 编号与时间戳
//! - [`LogOutput`]：提供控制台输出能力
//!
//! 两者都在启动时注册；未注册时控制台输出被跳过、上下文取零值，
//! 因此极早期启动阶段也可以安全记录日志。

#![no_std]

mod facade;
mod level;
mod log_core;
pub mod macros;

pub use facade::init_facade;
pub use level::LogLevel;
pub use log_core::{
    LOG_RING_CAPACITY, LogCore, LogEntry, MAX_LOG_MESSAGE_LENGTH, format_log_entry,
};

use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

/// 默认的缓冲级别阈值
pub const DEFAULT_LOG_LEVEL: LogLevel = LogLevel::Info;
/// 默认的控制台级别阈值
pub const DEFAULT_CONSOLE_LEVEL: LogLevel = LogLevel::Warning;

/// 日志上下文提供者 trait
///
/// 提供记录时附加的 CPU 编号与时间戳。由内核在启动时通过
/// [`register_context_provider`] 注册。
pub trait LogContextProvider: Send + Sync {
    /// 获取当前 CPU 编号
    fn cpu_id(&self) -> usize;
    /// 获取当前时间戳
    fn timestamp(&self) -> usize;
}

/// 日志输出 trait
///
/// 提供控制台输出能力。由内核在启动时通过 [`register_log_output`] 注册。
pub trait LogOutput: Send + Sync {
    /// 输出字符串到控制台
    fn write_str(&self, s: &str);
}

/// 全局日志单例
static LOG_CORE: LogCore = LogCore::new(DEFAULT_LOG_LEVEL, DEFAULT_CONSOLE_LEVEL);

// ========== 全局注册机制 ==========

static CONTEXT_DATA: AtomicUsize = AtomicUsize::new(0);
static CONTEXT_VTABLE: AtomicUsize = AtomicUsize::new(0);
static OUTPUT_DATA: AtomicUsize = AtomicUsize::new(0);
static OUTPUT_VTABLE: AtomicUsize = AtomicUsize::new(0);

/// 注册日志上下文提供者
///
/// # Safety
/// 必须在单线程环境下调用，且只能调用一次
pub unsafe fn register_context_provider(provider: &'static dyn LogContextProvider) {
    let ptr = provider as *const dyn LogContextProvider;
    // SAFETY: fat pointer 的布局是 (data, vtable)
    let (data, vtable) =
        unsafe { core::mem::transmute::<*const dyn LogContextProvider, (usize, usize)>(ptr) };
    CONTEXT_DATA.store(data, Ordering::Release);
    CONTEXT_VTABLE.store(vtable, Ordering::Release);
}

/// 注册日志输出
///
/// # Safety
/// 必须在单线程环境下调用，且只能调用一次
pub unsafe fn register_log_output(output: &'static dyn LogOutput) {
    let ptr = output as *const dyn LogOutput;
    // SAFETY: fat pointer 的布局是 (data, vtable)
    let (data, vtable) =
        unsafe { core::mem::transmute::<*const dyn LogOutput, (usize, usize)>(ptr) };
    OUTPUT_DATA.store(data, Ordering::Release);
    OUTPUT_VTABLE.store(vtable, Ordering::Release);
}

/// 获取上下文提供者（未注册时返回 None）
#[inline]
fn context_provider() -> Option<&'static dyn LogContextProvider> {
    let data = CONTEXT_DATA.load(Ordering::Acquire);
    let vtable = CONTEXT_VTABLE.load(Ordering::Acquire);
    if data == 0 {
        return None;
    }
    // SAFETY: data 和 vtable 来自 register_context_provider
    Some(unsafe {
        &*core::mem::transmute::<(usize, usize), *const dyn LogContextProvider>((data, vtable))
    })
}

/// 获取日志输出（未注册时返回 None）
#[inline]
fn log_output() -> Option<&'static dyn LogOutput> {
    let data = OUTPUT_DATA.load(Ordering::Acquire);
    let vtable = OUTPUT_VTABLE.load(Ordering::Acquire);
    if data == 0 {
        return None;
    }
    // SAFETY: data 和 vtable 来自 register_log_output
    Some(unsafe { &*core::mem::transmute::<(usize, usize), *const dyn LogOutput>((data, vtable)) })
}

// ========== 全局单例入口 ==========

/// 检查给定级别是否会被全局单例缓冲。供日志宏在格式化前过滤。
pub fn is_level_enabled(level: LogLevel) -> bool {
    LOG_CORE.enabled(level)
}

/// 日志宏的公共后端：采集上下文、写入缓冲区、按需输出到控制台。
pub fn log_impl(level: LogLevel, args: fmt::Arguments<'_>) {
    let (cpu, timestamp) = match context_provider() {
        Some(ctx) => (ctx.cpu_id(), ctx.timestamp()),
        None => (0, 0),
    };

    LOG_CORE.record(level, cpu, timestamp, args);

    if LOG_CORE.console_enabled(level) {
        if let Some(output) = log_output() {
            let mut line = ConsoleLine::new(output);
            let _ = fmt::write(
                &mut line,
                format_args!("[{:6}] cpu{} t={} {}\n", level.label(), cpu, timestamp, args),
            );
        }
    }
}

/// 取出最旧的一条缓冲记录。
pub fn read_log() -> Option<LogEntry> {
    LOG_CORE.pop()
}

/// 缓冲区中未读记录的条数。
pub fn log_len() -> usize {
    LOG_CORE.len()
}

/// 因写满被丢弃的记录总数。
pub fn log_dropped_count() -> usize {
    LOG_CORE.dropped_count()
}

/// 设置全局缓冲级别阈值。
pub fn set_global_level(level: LogLevel) {
    LOG_CORE.set_global_level(level);
}

/// 设置控制台级别阈值。
pub fn set_console_level(level: LogLevel) {
    LOG_CORE.set_console_level(level);
}

/// 当前全局缓冲级别阈值。
pub fn get_global_level() -> LogLevel {
    LOG_CORE.global_level()
}

/// 当前控制台级别阈值。
pub fn get_console_level() -> LogLevel {
    LOG_CORE.console_level()
}

/// 把 `fmt::Write` 转接到已注册 LogOutput 的适配器。
struct ConsoleLine {
    output: &'static dyn LogOutput,
}

impl ConsoleLine {
    fn new(output: &'static dyn LogOutput) -> Self {
        ConsoleLine { output }
    }
}

impl fmt::Write for ConsoleLine {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.output.write_str(s);
        Ok(())
    }
}
