//! 内核设备驱动框架
//!
//! 此 crate 提供块设备抽象和与之配套的基础服务：
//!
//! - [`Driver`] trait - 设备驱动基础接口
//! - [`BlockDriver`] trait - 块设备驱动接口（同步、无部分结果）
//! - [`RamDisk`] - 内存模拟块设备，用于测试和开发
//! - [`Ticks`] / [`TickSource`] - 系统滴答计数服务，
//!   为缓存层的 LRU 时间戳提供单调时钟

#![no_std]

extern crate alloc;

pub mod block;
pub mod driver;
pub mod tick;

pub use block::{BLK_DRIVERS, BlockDriver, RamDisk, register_block_driver};
pub use driver::{DeviceType, Driver};
pub use tick::{TickSource, Ticks};
