//! 测试支持 crate
//!
//! 提供 Mock 实现和测试工具，供各 crate 的宿主机测试使用。

#![no_std]

pub mod mock;

pub use mock::{init_mock_runtime, set_mock_cpu};
