//! 日志系统核心实现
//!
//! 将日志状态封装到独立的 `LogCore` 结构体中，既可作为全局单例，
//! 也可在测试中独立实例化。
//!
//! 环形缓冲区由一把自旋锁保护，持锁期间只做一次定长记录的拷贝；
//! 级别阈值是原子量，过滤检查无需加锁。

use core::fmt::{self, Write};
use core::sync::atomic::{AtomicU8, Ordering};

use sync::SpinLock;

use crate::level::LogLevel;

/// 单条日志消息的最大字节数，超出部分被静默截断。
pub const MAX_LOG_MESSAGE_LENGTH: usize = 192;

/// 环形缓冲区可容纳的记录条数。写满后丢弃最旧的记录。
pub const LOG_RING_CAPACITY: usize = 64;

/// 一条已记录的日志。
#[derive(Clone, Copy)]
pub struct LogEntry {
    /// 日志级别
    pub level: LogLevel,
    /// 记录时所在的 CPU
    pub cpu: usize,
    /// 记录时的时间戳（由上下文提供者定义的单位）
    pub timestamp: usize,
    len: usize,
    bytes: [u8; MAX_LOG_MESSAGE_LENGTH],
}

impl LogEntry {
    const EMPTY: LogEntry = LogEntry {
        level: LogLevel::Debug,
        cpu: 0,
        timestamp: 0,
        len: 0,
        bytes: [0; MAX_LOG_MESSAGE_LENGTH],
    };

    /// 消息文本。
    pub fn message(&self) -> &str {
        // 写入侧只存放合法的 UTF-8 前缀
        core::str::from_utf8(&self.bytes[..self.len]).unwrap_or("")
    }
}

/// 按 `[LEVEL] cpu# timestamp message` 的固定格式输出一条记录。
pub fn format_log_entry(entry: &LogEntry, out: &mut dyn fmt::Write) -> fmt::Result {
    writeln!(
        out,
        "[{:6}] cpu{} t={} {}",
        entry.level.label(),
        entry.cpu,
        entry.timestamp,
        entry.message()
    )
}

/// 向定长字节缓冲区写入并截断的 fmt 适配器。
struct FixedWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl Write for FixedWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let remaining = self.buf.len() - self.len;
        if remaining == 0 {
            return Ok(());
        }
        let mut take = s.len().min(remaining);
        // 只在字符边界截断，保持缓冲区始终是合法 UTF-8
        while take > 0 && !s.is_char_boundary(take) {
            take -= 1;
        }
        self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        Ok(())
    }
}

/// 环形缓冲区本体。head 指向最旧的记录。
struct Ring {
    entries: [LogEntry; LOG_RING_CAPACITY],
    head: usize,
    len: usize,
    dropped: usize,
}

/// 核心日志系统。
///
/// 封装环形缓冲区与级别阈值。所有方法通过 `&self` 调用，
/// 可在线程/CPU 间直接共享。
pub struct LogCore {
    ring: SpinLock<Ring>,
    global_level: AtomicU8,
    console_level: AtomicU8,
}

impl LogCore {
    /// 使用给定的级别阈值创建 LogCore。
    ///
    /// - `global_level`：低于（不紧急于）此级别的日志不进入缓冲区
    /// - `console_level`：达到此级别的日志立即输出到控制台
    pub const fn new(global_level: LogLevel, console_level: LogLevel) -> Self {
        LogCore {
            ring: SpinLock::new(Ring {
                entries: [LogEntry::EMPTY; LOG_RING_CAPACITY],
                head: 0,
                len: 0,
                dropped: 0,
            }),
            global_level: AtomicU8::new(global_level as u8),
            console_level: AtomicU8::new(console_level as u8),
        }
    }

    /// 检查给定级别是否会被缓冲。
    pub fn enabled(&self, level: LogLevel) -> bool {
        level as u8 <= self.global_level.load(Ordering::Relaxed)
    }

    /// 检查给定级别是否会立即输出到控制台。
    pub fn console_enabled(&self, level: LogLevel) -> bool {
        level as u8 <= self.console_level.load(Ordering::Relaxed)
    }

    /// 设置缓冲级别阈值。
    pub fn set_global_level(&self, level: LogLevel) {
        self.global_level.store(level as u8, Ordering::Relaxed);
    }

    /// 设置控制台级别阈值。
    pub fn set_console_level(&self, level: LogLevel) {
        self.console_level.store(level as u8, Ordering::Relaxed);
    }

    /// 当前缓冲级别阈值。
    pub fn global_level(&self) -> LogLevel {
        LogLevel::from_u8(self.global_level.load(Ordering::Relaxed))
    }

    /// 当前控制台级别阈值。
    pub fn console_level(&self) -> LogLevel {
        LogLevel::from_u8(self.console_level.load(Ordering::Relaxed))
    }

    /// 格式化一条记录并写入环形缓冲区。
    ///
    /// 缓冲区已满时覆盖最旧的记录并累计丢弃计数。
    /// 格式化发生在持锁之前的栈上缓冲区中。
    pub fn record(&self, level: LogLevel, cpu: usize, timestamp: usize, args: fmt::Arguments<'_>) {
        if !self.enabled(level) {
            return;
        }

        let mut entry = LogEntry::EMPTY;
        entry.level = level;
        entry.cpu = cpu;
        entry.timestamp = timestamp;
        let mut writer = FixedWriter {
            buf: &mut entry.bytes,
            len: 0,
        };
        let _ = writer.write_fmt(args);
        entry.len = writer.len;

        let mut ring = self.ring.lock();
        if ring.len == LOG_RING_CAPACITY {
            ring.head = (ring.head + 1) % LOG_RING_CAPACITY;
            ring.len -= 1;
            ring.dropped += 1;
        }
        let tail = (ring.head + ring.len) % LOG_RING_CAPACITY;
        ring.entries[tail] = entry;
        ring.len += 1;
    }

    /// 取出最旧的一条记录，缓冲区为空时返回 None。
    pub fn pop(&self) -> Option<LogEntry> {
        let mut ring = self.ring.lock();
        if ring.len == 0 {
            return None;
        }
        let entry = ring.entries[ring.head];
        ring.head = (ring.head + 1) % LOG_RING_CAPACITY;
        ring.len -= 1;
        Some(entry)
    }

    /// 缓冲区中未读记录的条数。
    pub fn len(&self) -> usize {
        self.ring.lock().len
    }

    /// 缓冲区是否为空。
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 因缓冲区写满而被丢弃的记录总数。
    pub fn dropped_count(&self) -> usize {
        self.ring.lock().dropped
    }
}
