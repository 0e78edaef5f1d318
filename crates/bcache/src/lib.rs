//! 块缓冲区缓存
//!
//! 在内存中缓存磁盘块内容，减少重复的设备读，并为多个执行流
//! 使用同一磁盘块提供同步点。
//!
//! # 使用方式
//!
//! - 要访问某个磁盘块，调用 [`BufferCache::read`] 取得已锁定的
//!   [`BufGuard`]；
//! - 修改数据后调用 [`BufGuard::write`] 落盘；
//! - 句柄离开作用域即释放缓冲，不要长期持有；
//! - 需要跨操作保持缓冲驻留时用 [`BufGuard::pin`] /
//!   [`BufferCache::unpin`] 成对操作。
//!
//! # 并发结构
//!
//! 槽位池固定为 [`config::NBUF`] 个，按 [`config::BUCKET_COUNT`]
//! 个哈希桶组织。命中路径只碰一把桶锁；未命中的驱逐由全局驱逐锁
//! 串行化，沿固定桶序做渐进收缩持锁范围的 LRU 扫描。近期度
//! 完全由时间戳刻画，链上位置不承载任何次序信息。

#![no_std]

extern crate alloc;

mod cache;
pub mod config;

pub use cache::{BufGuard, BufferCache};
pub use config::{BSIZE, BUCKET_COUNT, NBUF, bucket_index};
